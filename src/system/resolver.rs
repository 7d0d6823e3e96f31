use super::{
    primary_wavelength, Configuration, ObjectRow, SourceRow, SpotDiagramSettings, SpotPattern,
    SystemConfigurations,
};
use crate::blocks::{expand, BlockType};
use crate::consts::{ACTIVE_KEY, CURRENT_CONFIG};
use crate::error::{EvalFault, EvalResult};
use crate::optics::raytrace::FieldPoint;
use crate::surface::SurfaceRow;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Spot-diagram controls as currently shown by the host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotUiState {
    #[serde(default)]
    pub pattern: Option<SpotPattern>,
    #[serde(default)]
    pub ray_count: Option<usize>,
    #[serde(default)]
    pub ring_count: Option<usize>,
    #[serde(default)]
    pub surface_id: Option<usize>,
}

/// Tables the host is currently editing for the active configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveTables {
    #[serde(default)]
    pub rows: Vec<SurfaceRow>,
    #[serde(default)]
    pub source: Vec<SourceRow>,
    #[serde(default)]
    pub object: Vec<ObjectRow>,
    #[serde(default)]
    pub spot: Option<SpotUiState>,
}

/// Everything a kernel needs about one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSystem {
    /// Cache-key segment: the config id, or `active`.
    pub key: String,
    pub config_id: String,
    pub from_live: bool,
    pub rows: Vec<SurfaceRow>,
    pub source: Vec<SourceRow>,
    pub object: Vec<ObjectRow>,
    pub wavelength_primary: f64,
    pub reference_focal_length: Option<f64>,
    pub spot_settings: Option<SpotDiagramSettings>,
    pub live_spot: Option<SpotUiState>,
}

impl ResolvedSystem {
    pub fn object_distance(&self) -> Value {
        self.rows.first().map(|r| r.thickness.clone()).unwrap_or(Value::Inf)
    }

    /// 1-based object row; an empty table still has the axis as field 1.
    pub fn field(&self, index: usize) -> EvalResult<FieldPoint> {
        match self.object.get(index.wrapping_sub(1)) {
            Some(row) => Ok(row.field_point()),
            None if self.object.is_empty() && index == 1 => Ok(FieldPoint::ON_AXIS),
            None => Err(EvalFault::unresolvable_field(format!(
                "field {index} not in object table"
            ))),
        }
    }
}

/// Turns a config reference into rows, source and object tables.
pub struct Resolver<'a> {
    systems: &'a SystemConfigurations,
    live: Option<&'a LiveTables>,
}

impl<'a> Resolver<'a> {
    pub fn new(systems: &'a SystemConfigurations, live: Option<&'a LiveTables>) -> Self {
        Self { systems, live }
    }

    pub fn is_current(config_ref: &str) -> bool {
        let r = config_ref.trim();
        r.is_empty() || r.eq_ignore_ascii_case(CURRENT_CONFIG)
    }

    /// Normalized cache segment for a reference, without resolving it.
    pub fn key_for(&self, config_ref: &str) -> String {
        if Self::is_current(config_ref) || self.systems.active_id() == Some(config_ref.trim()) {
            ACTIVE_KEY.to_string()
        } else {
            config_ref.trim().to_string()
        }
    }

    pub fn resolve(&self, config_ref: &str) -> EvalResult<ResolvedSystem> {
        let wants_current = Self::is_current(config_ref);
        let config = if wants_current {
            self.systems.active()
        } else {
            self.systems.get(config_ref.trim())
        };

        let config = match (config, self.live) {
            (Some(c), _) => c,
            (None, Some(live)) if wants_current => return self.from_live_only(live),
            _ => {
                return Err(EvalFault::config_mismatch(format!(
                    "unknown configuration '{config_ref}'"
                )))
            }
        };

        let is_active = self.systems.active_id() == Some(config.id.as_str());
        let live = self.live.filter(|l| is_active && !l.rows.is_empty());

        let (rows, from_live) = match live {
            Some(l) => (l.rows.clone(), true),
            None => (stored_rows(config)?, false),
        };
        if rows.len() < 2 {
            return Err(EvalFault::no_data(format!(
                "configuration '{}' has no surfaces",
                config.id
            )));
        }

        let live_tables = self.live.filter(|_| is_active);
        let source = live_tables
            .map(|l| l.source.clone())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| config.source.clone());
        let object = live_tables
            .map(|l| l.object.clone())
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| config.object.clone());

        debug!(config = %config.id, from_live, rows = rows.len(), "resolved configuration");

        Ok(ResolvedSystem {
            key: if is_active { ACTIVE_KEY.to_string() } else { config.id.clone() },
            config_id: config.id.clone(),
            from_live,
            wavelength_primary: primary_wavelength(&source),
            rows,
            source,
            object,
            reference_focal_length: config.reference_focal_length(),
            spot_settings: config.spot_diagram.clone(),
            live_spot: live_tables.and_then(|l| l.spot.clone()),
        })
    }

    fn from_live_only(&self, live: &LiveTables) -> EvalResult<ResolvedSystem> {
        if live.rows.len() < 2 {
            return Err(EvalFault::no_data("live surface table is empty"));
        }
        Ok(ResolvedSystem {
            key: ACTIVE_KEY.to_string(),
            config_id: CURRENT_CONFIG.to_string(),
            from_live: true,
            rows: live.rows.clone(),
            wavelength_primary: primary_wavelength(&live.source),
            source: live.source.clone(),
            object: live.object.clone(),
            reference_focal_length: None,
            spot_settings: None,
            live_spot: live.spot.clone(),
        })
    }
}

/// Rows from the stored snapshot. Blocks are canonical; the legacy surface
/// table is only a fallback.
fn stored_rows(config: &Configuration) -> EvalResult<Vec<SurfaceRow>> {
    let legacy = config.optical_system.as_deref().unwrap_or_default();
    if config.blocks.is_empty() {
        if legacy.is_empty() {
            return Err(EvalFault::no_data(format!(
                "configuration '{}' has neither blocks nor surfaces",
                config.id
            )));
        }
        return Ok(legacy.to_vec());
    }

    let blocks = config.effective_blocks();
    let expansion = expand(&blocks);
    if let Some(issue) = expansion.fatal_issues().next() {
        return Err(EvalFault::invalid_input(format!(
            "configuration '{}' does not expand: {}",
            config.id, issue.message
        )));
    }
    let mut rows = expansion.rows;

    let explicit_distance = blocks
        .iter()
        .find(|b| b.block_type == BlockType::ObjectPlane)
        .map(|b| !b.param("objectDistance").is_auto())
        .unwrap_or(false);
    if !explicit_distance {
        if let (Some(first), Some(legacy_first)) = (rows.first_mut(), legacy.first()) {
            first.thickness = legacy_first.thickness.clone();
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::Block;

    fn config_with_gap(id: &str, thickness: f64) -> Configuration {
        let mut c = Configuration::new(id);
        c.blocks = vec![
            Block::new("OBJ", BlockType::ObjectPlane),
            Block::new("S", BlockType::Stop),
            Block::new("G", BlockType::Gap).with_param("thickness", thickness),
            Block::new("IMG", BlockType::ImagePlane),
        ];
        c
    }

    #[test]
    fn test_unknown_config_is_mismatch() {
        let systems = SystemConfigurations::default();
        let err = Resolver::new(&systems, None).resolve("nope").unwrap_err();
        assert_eq!(err.kind, crate::error::FaultKind::ConfigMismatch);
    }

    #[test]
    fn test_live_tables_only_for_active() {
        let systems = SystemConfigurations {
            active_config_id: "A".into(),
            configurations: vec![config_with_gap("A", 10.0), config_with_gap("B", 20.0)],
        };
        let mut live_rows = expand(&systems.configurations[0].blocks).rows;
        live_rows[1].thickness = Value::Number(99.0);
        let live = LiveTables {
            rows: live_rows,
            ..Default::default()
        };
        let resolver = Resolver::new(&systems, Some(&live));

        let current = resolver.resolve("Current").unwrap();
        assert!(current.from_live);
        assert_eq!(current.rows[1].thickness, Value::Number(99.0));
        assert_eq!(current.key, "active");

        let other = resolver.resolve("B").unwrap();
        assert!(!other.from_live);
        assert_eq!(other.rows[1].thickness, Value::Number(20.0));
        assert_eq!(other.key, "B");
    }
}
