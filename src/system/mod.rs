pub mod resolver;

pub use self::resolver::{LiveTables, ResolvedSystem, Resolver, SpotUiState};

use crate::blocks::Block;
use crate::consts::D_LINE_UM;
use crate::error::LfResult;
use crate::optics::raytrace::FieldPoint;
use crate::surface::{SurfaceRole, SurfaceRow};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use strum::{Display, EnumString};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfigurations {
    #[serde(default)]
    pub active_config_id: String,
    #[serde(default)]
    pub configurations: Vec<Configuration>,
}

impl SystemConfigurations {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> LfResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn active(&self) -> Option<&Configuration> {
        self.get(&self.active_config_id)
            .or_else(|| self.configurations.first())
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active().map(|c| c.id.as_str())
    }

    pub fn get(&self, id: &str) -> Option<&Configuration> {
        self.configurations.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Configuration> {
        self.configurations.iter_mut().find(|c| c.id == id)
    }
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_scenario_id: Option<String>,
    #[serde(default)]
    pub source: Vec<SourceRow>,
    #[serde(default)]
    pub object: Vec<ObjectRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optical_system: Option<Vec<SurfaceRow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_data: Option<SystemData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot_diagram: Option<SpotDiagramSettings>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Configuration {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            schema_version: default_schema_version(),
            blocks: Vec::new(),
            scenarios: Vec::new(),
            active_scenario_id: None,
            source: Vec::new(),
            object: Vec::new(),
            optical_system: None,
            system_data: None,
            spot_diagram: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn active_scenario(&self) -> Option<&Scenario> {
        let id = self.active_scenario_id.as_deref()?;
        self.scenarios.iter().find(|s| s.id == id)
    }

    /// Blocks with the active scenario's overrides applied.
    pub fn effective_blocks(&self) -> Vec<Block> {
        match self.active_scenario() {
            Some(scenario) => apply_scenario(&self.blocks, scenario),
            None => self.blocks.clone(),
        }
    }

    pub fn reference_focal_length(&self) -> Option<f64> {
        self.system_data
            .as_ref()
            .and_then(|d| d.reference_focal_length)
            .filter(|f| f.is_finite() && *f != 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub overrides: BTreeMap<String, Value>,
}

/// Clones `blocks` and writes each `<blockId>.<param>` override.
pub fn apply_scenario(blocks: &[Block], scenario: &Scenario) -> Vec<Block> {
    let mut out = blocks.to_vec();
    for (key, value) in &scenario.overrides {
        let Some((block_id, param)) = key.rsplit_once('.') else {
            warn!(scenario = %scenario.id, key = %key, "override key is not <blockId>.<param>");
            continue;
        };
        match out.iter_mut().find(|b| b.block_id == block_id) {
            Some(block) => block.set_param(param, value.clone().normalized()),
            None => warn!(scenario = %scenario.id, block = %block_id, "override targets unknown block"),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceRow {
    pub wavelength: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl SourceRow {
    pub fn new(wavelength: f64) -> Self {
        Self {
            wavelength,
            primary: None,
            weight: None,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.primary
            .as_deref()
            .map(|p| p.trim().to_ascii_lowercase().starts_with("primary"))
            .unwrap_or(false)
    }

    pub fn valid_wavelength(&self) -> Option<f64> {
        Some(self.wavelength).filter(|w| w.is_finite() && *w > 0.0)
    }
}

/// Flagged row, else the first row, else the d-line.
pub fn primary_wavelength(source: &[SourceRow]) -> f64 {
    source
        .iter()
        .find(|s| s.is_primary())
        .or_else(|| source.first())
        .and_then(SourceRow::valid_wavelength)
        .unwrap_or(D_LINE_UM)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Degrees.
    Angle,
    /// Object height in mm.
    Height,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRow {
    #[serde(default)]
    pub id: usize,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub x_height_angle: f64,
    #[serde(default)]
    pub y_height_angle: f64,
}

impl ObjectRow {
    pub fn angle(x_deg: f64, y_deg: f64) -> Self {
        Self {
            id: 0,
            position: "Angle".to_string(),
            x_height_angle: x_deg,
            y_height_angle: y_deg,
        }
    }

    pub fn height(x_mm: f64, y_mm: f64) -> Self {
        Self {
            id: 0,
            position: "Rectangle".to_string(),
            x_height_angle: x_mm,
            y_height_angle: y_mm,
        }
    }

    /// Word-wise match so that "Rectangle" is never read as "angle".
    pub fn kind(&self) -> FieldKind {
        let words: Vec<String> = self
            .position
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        if words.iter().any(|w| w == "rectangle" || w == "point" || w == "height") {
            FieldKind::Height
        } else {
            FieldKind::Angle
        }
    }

    pub fn magnitude(&self) -> f64 {
        self.x_height_angle.hypot(self.y_height_angle)
    }

    pub fn field_point(&self) -> FieldPoint {
        let (x, y) = (self.x_height_angle, self.y_height_angle);
        match self.kind() {
            FieldKind::Angle => FieldPoint::Angle { x, y },
            FieldKind::Height => FieldPoint::Height { x, y },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_focal_length: Option<f64>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SpotPattern {
    #[default]
    Annular,
    #[serde(alias = "rect", alias = "rectangular")]
    #[strum(to_string = "grid", serialize = "rect", serialize = "rectangular")]
    Grid,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotDiagramSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_id: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_block_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_role: Option<SurfaceRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<SpotPattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ray_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ring_count: Option<usize>,
}
