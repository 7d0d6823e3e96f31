#![allow(dead_code)]

use lensforge::blocks::{Block, BlockType, VariableScope};
use lensforge::consts::{C_LINE_UM, D_LINE_UM, F_LINE_UM};
use lensforge::surface::OptimizeMode;
use lensforge::system::{Configuration, ObjectRow, SourceRow, SystemConfigurations};

// --- BLOCK SEQUENCES ---

/// Stop in front of two air-spaced singlets, object at infinity.
///
/// Rows: 1 OBJ, 2 STO, 3 L1 front, 4 L1 back, 5 L2 front, 6 L2 back, 7 IMG.
pub fn two_singlets() -> Vec<Block> {
    vec![
        Block::new("OBJ", BlockType::ObjectPlane),
        Block::new("STO", BlockType::Stop).with_param("semiDiameter", 5.0),
        Block::new("G0", BlockType::Gap).with_param("thickness", 5.0),
        Block::new("L1", BlockType::Lens)
            .with_param("frontRadius", 60.0)
            .with_param("backRadius", -60.0)
            .with_param("centerThickness", 4.0)
            .with_param("material", "N-BK7")
            .with_aperture("front", 12.0)
            .with_aperture("back", 12.0),
        Block::new("G1", BlockType::Gap).with_param("thickness", 10.0),
        Block::new("L2", BlockType::Lens)
            .with_param("frontRadius", 80.0)
            .with_param("backRadius", "INF")
            .with_param("centerThickness", 3.0)
            .with_param("material", "N-BK7"),
        Block::new("G2", BlockType::Gap).with_param("thickness", 40.0),
        Block::new("IMG", BlockType::ImagePlane),
    ]
}

/// Cemented achromat behind a stop.
///
/// Rows: 1 OBJ, 2 STO, 3 D1 s1, 4 D1 s2, 5 D1 s3, 6 IMG.
pub fn achromat() -> Vec<Block> {
    vec![
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
    ]
}

/// A lens with no Stop block and nothing after it but the image.
pub fn stopless_singlet() -> Vec<Block> {
    vec![
        Block::new("OBJ", BlockType::ObjectPlane),
        Block::new("L1", BlockType::Lens)
            .with_param("frontRadius", 50.0)
            .with_param("backRadius", -50.0)
            .with_param("centerThickness", 5.0)
            .with_param("material", "N-BK7")
            .with_aperture("front", 10.0),
        Block::new("G1", BlockType::Gap).with_param("thickness", 48.0),
        Block::new("IMG", BlockType::ImagePlane),
    ]
}

/// `two_singlets` with the inter-lens gap and L2 front radius marked V.
pub fn two_singlets_with_variables(radius_scope: VariableScope) -> Vec<Block> {
    let mut blocks = two_singlets();
    blocks[4] = blocks[4]
        .clone()
        .with_variable("thickness", OptimizeMode::V, VariableScope::PerConfig);
    blocks[5] = blocks[5]
        .clone()
        .with_variable("frontRadius", OptimizeMode::V, radius_scope);
    blocks
}

// --- TABLES ---

/// F, d (primary), C.
pub fn visible_source() -> Vec<SourceRow> {
    let mut rows = vec![
        SourceRow::new(F_LINE_UM),
        SourceRow::new(D_LINE_UM),
        SourceRow::new(C_LINE_UM),
    ];
    rows[1].primary = Some("Primary".to_string());
    rows
}

pub fn angle_fields() -> Vec<ObjectRow> {
    let mut rows = vec![ObjectRow::angle(0.0, 0.0), ObjectRow::angle(0.0, 5.0)];
    for (i, row) in rows.iter_mut().enumerate() {
        row.id = i + 1;
    }
    rows
}

// --- SNAPSHOTS ---

pub fn configuration(id: &str, blocks: Vec<Block>) -> Configuration {
    let mut config = Configuration::new(id);
    config.blocks = blocks;
    config.source = visible_source();
    config.object = angle_fields();
    config
}

/// The first configuration is the active one.
pub fn snapshot(configs: Vec<Configuration>) -> SystemConfigurations {
    SystemConfigurations {
        active_config_id: configs.first().map(|c| c.id.clone()).unwrap_or_default(),
        configurations: configs,
    }
}

pub fn single(blocks: Vec<Block>) -> SystemConfigurations {
    snapshot(vec![configuration("A", blocks)])
}

pub fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {expected}, got {actual} (tolerance {tol})"
    );
}
