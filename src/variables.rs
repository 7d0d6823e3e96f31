use crate::blocks::VariableScope;
use crate::error::{LensForgeError, LfResult};
use crate::system::SystemConfigurations;
use crate::value::Value;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// A block parameter marked `V` for the optimizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignVariable {
    /// Owning configuration; the first one seen for global variables.
    pub config_id: String,
    pub block_id: String,
    /// Parameter name, or `aperture.<role>`.
    pub name: String,
    pub scope: VariableScope,
    pub value: f64,
}

impl DesignVariable {
    pub fn label(&self) -> String {
        match self.scope {
            VariableScope::Global => format!("{}.{}", self.block_id, self.name),
            VariableScope::PerConfig => format!("{}:{}.{}", self.config_id, self.block_id, self.name),
        }
    }
}

/// Every numeric variable in `V` mode, in configuration then block order.
///
/// A global variable appears once even when several configurations carry
/// the block.
pub fn list_variables(systems: &SystemConfigurations) -> Vec<DesignVariable> {
    let mut seen_global = HashSet::new();
    let mut out = Vec::new();

    for config in &systems.configurations {
        for block in &config.blocks {
            for (name, var) in &block.variables {
                if !var.optimize.mode.is_variable() {
                    continue;
                }
                let scope = var.optimize.scope;
                if scope == VariableScope::Global
                    && !seen_global.insert((block.block_id.clone(), name.clone()))
                {
                    continue;
                }
                let Some(value) = block.value_of(name).as_number() else {
                    warn!(block = %block.block_id, variable = %name, "non-numeric variable skipped");
                    continue;
                };
                out.push(DesignVariable {
                    config_id: config.id.clone(),
                    block_id: block.block_id.clone(),
                    name: name.clone(),
                    scope,
                    value,
                });
            }
        }
    }

    debug!(count = out.len(), "design variables enumerated");
    out
}

pub fn initial_values(vars: &[DesignVariable]) -> Vec<f64> {
    vars.iter().map(|v| v.value).collect()
}

/// Writes `values` back onto the canonical block parameters.
///
/// Global variables update the block in every configuration that has it.
pub fn apply_values(
    systems: &mut SystemConfigurations,
    vars: &[DesignVariable],
    values: &[f64],
) -> LfResult<()> {
    if vars.len() != values.len() {
        return Err(LensForgeError::Config(format!(
            "expected {} variable values, got {}",
            vars.len(),
            values.len()
        )));
    }

    for (var, &x) in vars.iter().zip(values) {
        let value = Value::from_f64(x);
        let mut written = 0;
        for config in systems
            .configurations
            .iter_mut()
            .filter(|c| var.scope == VariableScope::Global || c.id == var.config_id)
        {
            for block in config.blocks.iter_mut().filter(|b| b.block_id == var.block_id) {
                block.set_value_of(&var.name, value.clone());
                written += 1;
            }
        }
        if written == 0 {
            return Err(LensForgeError::Validation(format!(
                "variable {} has no block to write to",
                var.label()
            )));
        }
    }
    Ok(())
}
