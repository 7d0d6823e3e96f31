pub mod expand;
pub mod schema;
pub mod validate;

pub use self::expand::{expand, Expansion};
pub use self::schema::BlockSpec;
pub use self::validate::{Issue, Phase, Severity};

use crate::surface::OptimizeMode;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum BlockType {
    ObjectPlane,
    Stop,
    Lens,
    Doublet,
    Triplet,
    Gap,
    ImagePlane,
}

impl BlockType {
    /// Glass elements in a cemented group; 0 for everything else.
    pub fn element_count(self) -> usize {
        match self {
            BlockType::Lens => 1,
            BlockType::Doublet => 2,
            BlockType::Triplet => 3,
            _ => 0,
        }
    }

    /// Rows emitted by expansion (a Gap may be absorbed instead).
    pub fn surface_count(self) -> usize {
        match self {
            BlockType::Lens | BlockType::Doublet | BlockType::Triplet => self.element_count() + 1,
            _ => 1,
        }
    }

    pub fn is_lens_group(self) -> bool {
        self.element_count() > 0
    }

    /// Blocks whose last row takes the thickness and medium of a following Gap.
    pub fn absorbs_following_gap(self) -> bool {
        self.is_lens_group() || self == BlockType::Stop
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariableScope {
    #[default]
    PerConfig,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OptimizeSpec {
    #[serde(default)]
    pub mode: OptimizeMode,
    #[serde(default)]
    pub scope: VariableScope,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Variable {
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub optimize: OptimizeSpec,
}

/// Design-intent unit. Parameters are kept as loose tagged values and read
/// through [`BlockSpec`] when a typed view is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub block_id: String,
    pub block_type: BlockType,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default)]
    pub variables: BTreeMap<String, Variable>,
    #[serde(default)]
    pub aperture: BTreeMap<String, Value>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Block {
    pub fn new(block_id: impl Into<String>, block_type: BlockType) -> Self {
        Self {
            block_id: block_id.into(),
            block_type,
            parameters: BTreeMap::new(),
            variables: BTreeMap::new(),
            aperture: BTreeMap::new(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set_param(name, value.into());
        self
    }

    pub fn with_aperture(mut self, role: &str, semidia: f64) -> Self {
        self.aperture.insert(role.to_string(), Value::Number(semidia));
        self
    }

    pub fn with_variable(mut self, name: &str, mode: OptimizeMode, scope: VariableScope) -> Self {
        let value = self.value_of(name);
        self.variables.insert(
            name.to_string(),
            Variable {
                value,
                optimize: OptimizeSpec { mode, scope },
            },
        );
        self
    }

    /// Parameter value, `Auto` when absent.
    pub fn param(&self, name: &str) -> Value {
        self.parameters.get(name).cloned().unwrap_or_default()
    }

    /// Writes a parameter and keeps a mirrored variable in sync.
    pub fn set_param(&mut self, name: &str, value: Value) {
        if let Some(var) = self.variables.get_mut(name) {
            var.value = value.clone();
        }
        self.parameters.insert(name.to_string(), value);
    }

    /// Resolves a variable name to its current value. Names of the form
    /// `aperture.<role>` address the aperture map.
    pub fn value_of(&self, name: &str) -> Value {
        match name.strip_prefix("aperture.") {
            Some(role) => self.aperture.get(role).cloned().unwrap_or_default(),
            None => self.param(name),
        }
    }

    pub fn set_value_of(&mut self, name: &str, value: Value) {
        match name.strip_prefix("aperture.") {
            Some(role) => {
                if let Some(var) = self.variables.get_mut(name) {
                    var.value = value.clone();
                }
                self.aperture.insert(role.to_string(), value);
            }
            None => self.set_param(name, value),
        }
    }

    pub fn optimize_mode(&self, name: &str) -> OptimizeMode {
        self.variables
            .get(name)
            .map(|v| v.optimize.mode)
            .unwrap_or_default()
    }

    pub fn set_optimize_mode(&mut self, name: &str, mode: OptimizeMode) {
        let value = self.value_of(name);
        let var = self.variables.entry(name.to_string()).or_default();
        var.optimize.mode = mode;
        if var.value.is_auto() {
            var.value = value;
        }
    }

    pub fn aperture_for(&self, role: &str) -> Value {
        self.aperture.get(role).cloned().unwrap_or_default()
    }
}
