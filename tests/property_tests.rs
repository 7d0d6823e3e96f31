mod common;

use common::{single, two_singlets};
use lensforge::blocks::{expand, Block};
use lensforge::merit::{EvalInput, MeritEngine, Operand};
use lensforge::value::Value;
use proptest::prelude::*;

// --- STRATEGIES ---

/// A radius that is either flat or comfortably away from zero.
fn arb_radius() -> impl Strategy<Value = Value> {
    prop_oneof![
        1 => Just(Value::Inf),
        4 => (20.0..400.0f64, any::<bool>())
            .prop_map(|(r, neg)| Value::Number(if neg { -r } else { r })),
    ]
}

prop_compose! {
    fn arb_blocks()(
        r1 in arb_radius(),
        r2 in arb_radius(),
        r3 in arb_radius(),
        ct1 in 1.0..10.0f64,
        air in 0.5..30.0f64,
        back in 5.0..200.0f64,
        stop in 1.0..8.0f64,
    ) -> Vec<Block> {
        let mut blocks = two_singlets();
        blocks[1].set_param("semiDiameter", Value::Number(stop));
        blocks[3].set_param("frontRadius", r1);
        blocks[3].set_param("backRadius", r2);
        blocks[3].set_param("centerThickness", Value::Number(ct1));
        blocks[4].set_param("thickness", Value::Number(air));
        blocks[5].set_param("frontRadius", r3);
        blocks[6].set_param("thickness", Value::Number(back));
        blocks
    }
}

fn all_operands() -> Vec<Operand> {
    [
        "EFL", "BFL", "IMD", "TSL", "ENPD", "EXPP", "FNO_IMG", "NA_IMG", "TOT3_SPH", "TOT3_COMA",
        "TOT_LCA", "TOT_TCA", "LA_RMS_UM", "SPOT_SIZE_ANNULAR", "CLRH",
    ]
    .iter()
    .map(|id| Operand::new(id))
    .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_merit_is_always_finite(blocks in arb_blocks()) {
        let systems = single(blocks);
        let engine = MeritEngine::default();
        let ops = all_operands();
        let breakdown = engine.calculate_merit_breakdown_only(&EvalInput::new(&systems), &ops);
        prop_assert_eq!(breakdown.terms.len(), ops.len());
        for term in &breakdown.terms {
            prop_assert!(term.value.is_finite(), "{} = {}", term.operand, term.value);
        }
        prop_assert!(breakdown.total.is_finite());
        prop_assert!(breakdown.total >= 0.0);
    }

    #[test]
    fn test_total_is_linear_in_weight(blocks in arb_blocks(), w in 0.1..50.0f64) {
        let systems = single(blocks);
        let engine = MeritEngine::default();
        let input = EvalInput::new(&systems);
        let base = engine.calculate_merit_value_only(&input, &[Operand::new("TOT3_SPH")]);
        let scaled = engine.calculate_merit_value_only(&input, &[Operand::new("TOT3_SPH").with_weight(w)]);
        prop_assert!((scaled - w * base).abs() <= 1e-9 * scaled.abs().max(1.0));
    }

    #[test]
    fn test_expansion_is_pure(blocks in arb_blocks()) {
        let first = expand(&blocks);
        let second = expand(&blocks);
        prop_assert!(!first.has_fatal());
        prop_assert_eq!(first.rows.len(), 7);
        prop_assert_eq!(first, second);
    }
}
