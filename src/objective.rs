use crate::error::LfResult;
use crate::merit::{EvalInput, MeritEngine, Operand};
use crate::system::SystemConfigurations;
use crate::variables::{self, DesignVariable};

/// Scalar objective and residual vector over the design variables, for an
/// external optimizer.
///
/// Each call re-expands the blocks with the candidate values; live host
/// tables are not consulted.
pub struct DesignObjective<'a> {
    engine: &'a MeritEngine,
    systems: &'a SystemConfigurations,
    operands: &'a [Operand],
    variables: Vec<DesignVariable>,
}

impl<'a> DesignObjective<'a> {
    pub fn new(
        engine: &'a MeritEngine,
        systems: &'a SystemConfigurations,
        operands: &'a [Operand],
    ) -> Self {
        Self {
            engine,
            systems,
            operands,
            variables: variables::list_variables(systems),
        }
    }

    pub fn variables(&self) -> &[DesignVariable] {
        &self.variables
    }

    pub fn dimension(&self) -> usize {
        self.variables.len()
    }

    pub fn x0(&self) -> Vec<f64> {
        variables::initial_values(&self.variables)
    }

    pub fn value(&self, x: &[f64]) -> LfResult<f64> {
        let candidate = self.candidate(x)?;
        Ok(self
            .engine
            .calculate_merit_value_only(&EvalInput::new(&candidate), self.operands))
    }

    pub fn residuals(&self, x: &[f64]) -> LfResult<Vec<f64>> {
        let candidate = self.candidate(x)?;
        Ok(self
            .engine
            .residuals(&EvalInput::new(&candidate), self.operands))
    }

    /// The snapshot with `x` written into the block parameters.
    pub fn candidate(&self, x: &[f64]) -> LfResult<SystemConfigurations> {
        let mut systems = self.systems.clone();
        variables::apply_values(&mut systems, &self.variables, x)?;
        Ok(systems)
    }
}
