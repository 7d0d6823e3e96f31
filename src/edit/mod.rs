pub mod apply;
pub mod mapping;

pub use self::apply::{apply_changes, apply_to_configuration};
pub use self::mapping::map_surface_edit;

use crate::blocks::{BlockType, Issue};
use crate::surface::{OptimizeMode, SurfaceField, SurfaceRole};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single cell change in the surface table.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceEdit {
    /// 1-based row id.
    pub row: usize,
    pub field: SurfaceField,
    pub old_value: Value,
    pub new_value: Value,
}

impl SurfaceEdit {
    pub fn new(row: usize, field: SurfaceField, old_value: Value, new_value: impl Into<Value>) -> Self {
        Self {
            row,
            field,
            old_value,
            new_value: new_value.into(),
        }
    }
}

/// What a surface edit does to the canonical blocks, in application order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BlockChange {
    #[serde(rename_all = "camelCase")]
    Parameter {
        block_id: String,
        variable: String,
        new_value: Value,
    },
    #[serde(rename_all = "camelCase")]
    ApertureSemidia {
        block_id: String,
        role: SurfaceRole,
        new_value: Value,
    },
    #[serde(rename_all = "camelCase")]
    OptimizeMode {
        block_id: String,
        variable: String,
        mode: OptimizeMode,
    },
    /// Inserts an air Gap right after `after_block_id`.
    #[serde(rename_all = "camelCase")]
    CreateGap {
        after_block_id: String,
        block_id: String,
    },
}

impl BlockChange {
    pub fn block_id(&self) -> &str {
        match self {
            BlockChange::Parameter { block_id, .. }
            | BlockChange::ApertureSemidia { block_id, .. }
            | BlockChange::OptimizeMode { block_id, .. }
            | BlockChange::CreateGap { block_id, .. } => block_id,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("value unchanged")]
    Unchanged,

    #[error("blank value is not accepted for {0}")]
    Blank(SurfaceField),

    #[error("INF is not accepted for {0}")]
    InfNotAllowed(SurfaceField),

    #[error("'{0}' is not an optimize flag (expected F or V)")]
    InvalidFlag(Value),

    #[error("configuration '{0}' not found")]
    ConfigNotFound(String),

    #[error("row {0} does not exist")]
    RowNotFound(usize),

    #[error("row {0} has no block provenance")]
    NoProvenance(usize),

    #[error("block '{0}' not found")]
    BlockNotFound(String),

    #[error("{field} on {block_type} {role} surface has no block parameter")]
    Unmapped {
        block_type: BlockType,
        role: SurfaceRole,
        field: SurfaceField,
    },

    #[error("edit rejected by expansion: {}", summarize(.0))]
    Rejected(Vec<Issue>),
}

fn summarize(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(|i| i.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
