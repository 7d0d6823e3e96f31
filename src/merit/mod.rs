pub mod cache;
pub mod engine;
pub mod kernels;
pub mod loader;
pub mod operand;
pub mod params;
pub mod types;

pub use self::engine::{EvalInput, MeritEngine, PsfRequest};
pub use self::kernels::zernike::ExternalZernikeFit;
pub use self::operand::OperandKind;
pub use self::types::{MeritBreakdown, MeritTerm};

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// One row of the merit function editor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operand {
    #[serde(default)]
    pub id: Value,
    pub operand: String,
    #[serde(default)]
    pub config_id: String,
    #[serde(default)]
    pub param1: Value,
    #[serde(default)]
    pub param2: Value,
    #[serde(default)]
    pub param3: Value,
    #[serde(default)]
    pub param4: Value,
    #[serde(default)]
    pub param5: Value,
    #[serde(default)]
    pub target: Value,
    #[serde(default)]
    pub weight: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Impact in percent of the total merit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contribution: Option<f64>,
}

impl Operand {
    pub fn new(operand: &str) -> Self {
        Self {
            operand: operand.to_string(),
            ..Default::default()
        }
    }

    pub fn on_config(mut self, config_id: &str) -> Self {
        self.config_id = config_id.to_string();
        self
    }

    /// `index` is 1-based, matching `param1..param5`.
    pub fn with_param(mut self, index: usize, value: impl Into<Value>) -> Self {
        let value = value.into();
        match index {
            1 => self.param1 = value,
            2 => self.param2 = value,
            3 => self.param3 = value,
            4 => self.param4 = value,
            5 => self.param5 = value,
            _ => {}
        }
        self
    }

    pub fn with_target(mut self, target: f64) -> Self {
        self.target = Value::from(target);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Value::from(weight);
        self
    }
}
