mod common;

use common::{assert_close, configuration, single, snapshot, two_singlets_with_variables};
use lensforge::api::Workbench;
use lensforge::blocks::VariableScope;
use lensforge::config::Config;
use lensforge::merit::{EvalInput, MeritEngine, Operand};
use lensforge::objective::DesignObjective;
use lensforge::value::Value;
use lensforge::variables::{apply_values, list_variables, DesignVariable};

fn operands() -> Vec<Operand> {
    vec![
        Operand::new("EFL").with_target(100.0),
        Operand::new("TOT3_SPH").with_weight(10.0),
    ]
}

fn labels(vars: &[DesignVariable]) -> Vec<String> {
    vars.iter().map(DesignVariable::label).collect()
}

// --- VARIABLES ---

#[test]
fn test_variables_in_block_order() {
    let systems = single(two_singlets_with_variables(VariableScope::PerConfig));
    let vars = list_variables(&systems);
    assert_eq!(labels(&vars), vec!["A:G1.thickness", "A:L2.frontRadius"]);
    assert_eq!(vars[0].value, 10.0);
    assert_eq!(vars[1].value, 80.0);
}

#[test]
fn test_global_variable_spans_configurations() {
    let systems = snapshot(vec![
        configuration("WIDE", two_singlets_with_variables(VariableScope::Global)),
        configuration("TELE", two_singlets_with_variables(VariableScope::Global)),
    ]);
    let mut vars = list_variables(&systems);
    assert_eq!(
        labels(&vars),
        vec!["WIDE:G1.thickness", "L2.frontRadius", "TELE:G1.thickness"]
    );

    let mut written = systems.clone();
    apply_values(&mut written, &vars, &[12.0, 70.0, 20.0]).unwrap();
    for config in &written.configurations {
        assert_eq!(config.blocks[5].param("frontRadius"), Value::Number(70.0));
        // The variable record follows the parameter.
        assert_eq!(config.blocks[5].variables["frontRadius"].value, Value::Number(70.0));
    }
    assert_eq!(written.configurations[0].blocks[4].param("thickness"), Value::Number(12.0));
    assert_eq!(written.configurations[1].blocks[4].param("thickness"), Value::Number(20.0));

    vars.truncate(2);
    assert!(apply_values(&mut written, &vars, &[1.0]).is_err());
}

#[test]
fn test_fixed_parameters_are_not_variables() {
    let systems = single(common::two_singlets());
    assert!(list_variables(&systems).is_empty());
}

// --- OBJECTIVE ---

#[test]
fn test_objective_at_start_matches_merit() {
    let systems = single(two_singlets_with_variables(VariableScope::PerConfig));
    let engine = MeritEngine::default();
    let ops = operands();
    let objective = DesignObjective::new(&engine, &systems, &ops);

    assert_eq!(objective.dimension(), 2);
    assert_eq!(objective.x0(), vec![10.0, 80.0]);

    let expected = engine.calculate_merit_value_only(&EvalInput::new(&systems), &ops);
    assert_close(objective.value(&objective.x0()).unwrap(), expected, 1e-12);
}

#[test]
fn test_residuals_square_to_value() {
    let systems = single(two_singlets_with_variables(VariableScope::PerConfig));
    let engine = MeritEngine::default();
    let ops = operands();
    let objective = DesignObjective::new(&engine, &systems, &ops);

    let x = [14.0, 70.0];
    let residuals = objective.residuals(&x).unwrap();
    assert_eq!(residuals.len(), ops.len());
    let sum: f64 = residuals.iter().map(|r| r * r).sum();
    let value = objective.value(&x).unwrap();
    assert_close(sum, value, 1e-9 * value.max(1.0));
}

#[test]
fn test_candidate_leaves_snapshot_untouched() {
    let systems = single(two_singlets_with_variables(VariableScope::PerConfig));
    let engine = MeritEngine::default();
    let ops = operands();
    let objective = DesignObjective::new(&engine, &systems, &ops);

    let candidate = objective.candidate(&[15.0, 65.0]).unwrap();
    assert_eq!(candidate.configurations[0].blocks[4].param("thickness"), Value::Number(15.0));
    assert_eq!(systems.configurations[0].blocks[4].param("thickness"), Value::Number(10.0));
    assert_ne!(
        objective.value(&[15.0, 65.0]).unwrap(),
        objective.value(&objective.x0()).unwrap()
    );
}

#[test]
fn test_objective_rejects_wrong_dimension() {
    let systems = single(two_singlets_with_variables(VariableScope::PerConfig));
    let engine = MeritEngine::default();
    let ops = operands();
    let objective = DesignObjective::new(&engine, &systems, &ops);
    assert!(objective.value(&[1.0]).is_err());
    assert!(objective.residuals(&[1.0, 2.0, 3.0]).is_err());
}

#[test]
fn test_unbuildable_candidate_is_penalized() {
    let systems = single(two_singlets_with_variables(VariableScope::PerConfig));
    let engine = MeritEngine::default();
    let ops = operands();
    let objective = DesignObjective::new(&engine, &systems, &ops);
    let bad = objective.value(&[-5.0, 80.0]).unwrap();
    assert!(bad > 1e6, "got {bad}");
    assert!(bad.is_finite());
}

#[test]
fn test_workbench_apply_variables() {
    let mut bench = Workbench::new(
        single(two_singlets_with_variables(VariableScope::PerConfig)),
        Config::default(),
    );
    let ops = operands();
    let before = bench.merit_value(&ops);
    let x = {
        let objective = bench.objective(&ops);
        objective.x0()
    };
    bench.apply_variables(&x).unwrap();
    assert_close(bench.merit_value(&ops), before, 1e-12);

    bench.apply_variables(&[12.0, 75.0]).unwrap();
    assert_eq!(bench.variables()[1].value, 75.0);
}
