use criterion::{criterion_group, criterion_main, Criterion};
use lensforge::blocks::{expand, Block, BlockType};
use lensforge::merit::{EvalInput, MeritEngine, Operand};
use lensforge::system::{Configuration, ObjectRow, SourceRow, SystemConfigurations};
use std::hint::black_box;

fn setup_systems() -> SystemConfigurations {
    let blocks = vec![
        Block::new("OBJ", BlockType::ObjectPlane),
        Block::new("STO", BlockType::Stop).with_param("semiDiameter", 6.0),
        Block::new("G0", BlockType::Gap).with_param("thickness", 2.0),
        Block::new("D1", BlockType::Doublet)
            .with_param("radius1", 61.0)
            .with_param("radius2", -44.0)
            .with_param("radius3", -128.0)
            .with_param("thickness1", 6.0)
            .with_param("material1", "N-BK7")
            .with_param("thickness2", 2.5)
            .with_param("material2", "F2"),
        Block::new("G1", BlockType::Gap).with_param("thickness", 95.0),
        Block::new("IMG", BlockType::ImagePlane),
    ];

    let mut config = Configuration::new("A");
    config.blocks = blocks;
    config.source = [0.4861, 0.5876, 0.6563].map(SourceRow::new).to_vec();
    config.object = vec![ObjectRow::angle(0.0, 0.0), ObjectRow::angle(0.0, 3.0)];
    for (i, row) in config.object.iter_mut().enumerate() {
        row.id = i + 1;
    }

    SystemConfigurations {
        active_config_id: "A".into(),
        configurations: vec![config],
    }
}

fn paraxial_operands() -> Vec<Operand> {
    vec![
        Operand::new("EFL").with_target(100.0),
        Operand::new("BFL"),
        Operand::new("FNO_IMG").with_target(8.0),
        Operand::new("TOT3_SPH").with_weight(10.0),
        Operand::new("TOT3_COMA").with_param(2, 2.0),
        Operand::new("TOT_LCA"),
    ]
}

fn criterion_benchmark(c: &mut Criterion) {
    let systems = setup_systems();
    let engine = MeritEngine::default();
    let input = EvalInput::new(&systems);

    c.bench_function("expand_doublet", |b| {
        b.iter(|| expand(black_box(&systems.configurations[0].blocks)))
    });

    let paraxial = paraxial_operands();
    c.bench_function("merit_paraxial_batch", |b| {
        b.iter(|| engine.calculate_merit_value_only(black_box(&input), black_box(&paraxial)))
    });

    let spot = vec![Operand::new("SPOT_SIZE_ANNULAR").with_param(3, 2.0)];
    c.bench_function("merit_spot_annular", |b| {
        b.iter(|| engine.calculate_merit_value_only(black_box(&input), black_box(&spot)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
