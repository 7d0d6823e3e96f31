use crate::blocks::{expand, Expansion};
use crate::config::Config;
use crate::edit::{self, BlockChange, EditError, SurfaceEdit};
use crate::error::{EvalResult, LensForgeError, LfResult};
use crate::merit::{EvalInput, MeritBreakdown, MeritEngine, Operand, PsfRequest};
use crate::objective::DesignObjective;
use crate::optics::psf::Psf;
use crate::surface::SurfaceField;
use crate::system::{Configuration, LiveTables, Resolver, SystemConfigurations};
use crate::value::Value;
use crate::variables::{self, DesignVariable};
use std::path::Path;
use tracing::info;

/// Design snapshot plus the engine that evaluates it.
pub struct Workbench {
    pub systems: SystemConfigurations,
    /// Tables the host is editing for the active configuration, if any.
    pub live: Option<LiveTables>,
    pub engine: MeritEngine,
}

impl Workbench {
    pub fn new(systems: SystemConfigurations, config: Config) -> Self {
        Self {
            systems,
            live: None,
            engine: MeritEngine::new(config),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P, config: Config) -> LfResult<Self> {
        let systems = SystemConfigurations::load_from_file(path)?;
        info!(
            configurations = systems.configurations.len(),
            active = systems.active_id().unwrap_or(""),
            "system loaded"
        );
        Ok(Self {
            systems,
            live: None,
            engine: MeritEngine::from_config(config)?,
        })
    }

    pub fn with_live(mut self, live: LiveTables) -> Self {
        self.live = Some(live);
        self
    }

    fn input(&self) -> EvalInput<'_> {
        EvalInput {
            systems: &self.systems,
            live: self.live.as_ref(),
        }
    }

    /// Full evaluation; fills `value` and `contribution` on each operand.
    pub fn evaluate(&self, operands: &mut [Operand]) -> MeritBreakdown {
        self.engine.calculate_merit(&self.input(), operands)
    }

    pub fn merit_value(&self, operands: &[Operand]) -> f64 {
        self.engine.calculate_merit_value_only(&self.input(), operands)
    }

    pub fn breakdown(&self, operands: &[Operand]) -> MeritBreakdown {
        self.engine.calculate_merit_breakdown_only(&self.input(), operands)
    }

    pub fn psf(&self, request: &PsfRequest) -> EvalResult<Psf> {
        self.engine.psf(&self.input(), request)
    }

    fn configuration(&self, config_ref: Option<&str>) -> Option<&Configuration> {
        match config_ref {
            Some(id) if !Resolver::is_current(id) => self.systems.get(id.trim()),
            _ => self.systems.active(),
        }
    }

    /// Expansion of a configuration's blocks with its active scenario applied.
    pub fn expand_config(&self, config_ref: Option<&str>) -> LfResult<Expansion> {
        let config = self.configuration(config_ref).ok_or_else(|| {
            LensForgeError::Config(format!(
                "unknown configuration '{}'",
                config_ref.unwrap_or("Current")
            ))
        })?;
        Ok(expand(&config.effective_blocks()))
    }

    /// Maps a surface-table edit onto the canonical blocks and commits it.
    ///
    /// Nothing changes when the edit is rejected.
    pub fn edit_surface(
        &mut self,
        config_ref: &str,
        row: usize,
        field: SurfaceField,
        new_value: Value,
    ) -> Result<Vec<BlockChange>, EditError> {
        let config_id = self
            .configuration(Some(config_ref))
            .map(|c| c.id.clone())
            .ok_or_else(|| EditError::ConfigNotFound(config_ref.to_string()))?;
        let is_active = self.systems.active_id() == Some(config_id.as_str());
        let config = self
            .systems
            .get_mut(&config_id)
            .ok_or_else(|| EditError::ConfigNotFound(config_id.clone()))?;

        let expansion = expand(&config.blocks);
        if expansion.has_fatal() {
            return Err(EditError::Rejected(expansion.fatal_issues().cloned().collect()));
        }
        let surface = expansion
            .rows
            .get(row.wrapping_sub(1))
            .ok_or(EditError::RowNotFound(row))?;
        let edit = SurfaceEdit::new(row, field, surface.get(field), new_value);
        let changes = edit::map_surface_edit(&config.blocks, surface, &edit)?;
        edit::apply_to_configuration(config, &changes)?;

        if is_active {
            let rows = expand(&config.effective_blocks()).rows;
            if let Some(live) = self.live.as_mut() {
                live.rows = rows;
            }
        }
        Ok(changes)
    }

    pub fn variables(&self) -> Vec<DesignVariable> {
        variables::list_variables(&self.systems)
    }

    pub fn apply_variables(&mut self, values: &[f64]) -> LfResult<()> {
        let vars = self.variables();
        variables::apply_values(&mut self.systems, &vars, values)
    }

    pub fn objective<'a>(&'a self, operands: &'a [Operand]) -> DesignObjective<'a> {
        DesignObjective::new(&self.engine, &self.systems, operands)
    }
}
