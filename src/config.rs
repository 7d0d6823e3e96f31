use crate::consts::{
    D_LINE_UM, DEFAULT_LA_SAMPLES, DEFAULT_MAX_NOLL, DEFAULT_SPOT_RING_COUNT,
    DEFAULT_ZERNIKE_GRID, FAILURE_PENALTY, MIN_LA_POINTS,
};
use crate::error::{LensForgeError, LfResult};
use clap::{parser::ValueSource, ArgMatches, Args};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[command(flatten)]
    #[serde(default)]
    pub eval: EvalParams,
    #[command(flatten)]
    #[serde(default)]
    pub spot: SpotParams,
    #[command(flatten)]
    #[serde(default)]
    pub abort: FastAbortParams,
    #[command(flatten)]
    #[serde(default)]
    pub zernike: ZernikeParams,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalParams {
    /// Value reported for an operand that cannot be evaluated
    #[arg(long, default_value_t = FAILURE_PENALTY)]
    pub failure_penalty: f64,
    /// Wavelength used when a λ parameter is unusable (µm)
    #[arg(long, default_value_t = D_LINE_UM)]
    pub default_wavelength_um: f64,
    /// Evaluate EFFL from the row preceding the block instead of infinity
    #[arg(long)]
    pub effl_use_object_distance: bool,
    /// Meridional rays sampled by LA_RMS_UM
    #[arg(long, default_value_t = DEFAULT_LA_SAMPLES)]
    pub la_samples: usize,
    /// Zemax AGF catalog consulted before the built-in glasses
    #[arg(long)]
    pub glass_catalog: Option<PathBuf>,
}

impl Default for EvalParams {
    fn default() -> Self {
        Self {
            failure_penalty: FAILURE_PENALTY,
            default_wavelength_um: D_LINE_UM,
            effl_use_object_distance: false,
            la_samples: DEFAULT_LA_SAMPLES,
            glass_catalog: None,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotParams {
    /// Forces the spot ray count for every spot operand without a p4
    #[arg(long)]
    pub spot_ray_count: Option<usize>,
    #[arg(long, default_value_t = DEFAULT_SPOT_RING_COUNT)]
    pub spot_ring_count: usize,
    /// Base of the bounded fast-mode spot penalty
    #[arg(long, default_value_t = 1e3)]
    pub spot_penalty_base: f64,
}

impl Default for SpotParams {
    fn default() -> Self {
        Self {
            spot_ray_count: None,
            spot_ring_count: DEFAULT_SPOT_RING_COUNT,
            spot_penalty_base: 1e3,
        }
    }
}

/// Early-abort thresholds for spot tracing in fast mode.
#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FastAbortParams {
    #[arg(long, default_value_t = 20)]
    pub abort_min_attempts: usize,
    #[arg(long, default_value_t = 0.20)]
    pub abort_min_hit_rate: f64,
    #[arg(long, default_value_t = 8)]
    pub abort_max_hits: usize,
    #[arg(long, default_value_t = 15)]
    pub abort_miss_streak: usize,
    #[arg(long, default_value_t = 10)]
    pub abort_block_streak: usize,
    #[arg(long, default_value_t = 30)]
    pub abort_cap_attempts: usize,
}

impl Default for FastAbortParams {
    fn default() -> Self {
        Self {
            abort_min_attempts: 20,
            abort_min_hit_rate: 0.20,
            abort_max_hits: 8,
            abort_miss_streak: 15,
            abort_block_streak: 10,
            abort_cap_attempts: 30,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZernikeParams {
    #[arg(long, default_value_t = DEFAULT_ZERNIKE_GRID)]
    pub zernike_grid: usize,
    #[arg(long, default_value_t = DEFAULT_MAX_NOLL)]
    pub zernike_max_noll: usize,
}

impl Default for ZernikeParams {
    fn default() -> Self {
        Self {
            zernike_grid: DEFAULT_ZERNIKE_GRID,
            zernike_max_noll: DEFAULT_MAX_NOLL,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> LfResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings no kernel can honour.
    pub fn validate(&self) -> LfResult<()> {
        let mut problems = Vec::new();
        if self.eval.la_samples < MIN_LA_POINTS {
            problems.push(format!(
                "la_samples is {}, must be at least {MIN_LA_POINTS}",
                self.eval.la_samples
            ));
        }
        if !self.eval.failure_penalty.is_finite() {
            problems.push("failure_penalty must be finite".to_string());
        }
        if !(0.0..=1.0).contains(&self.abort.abort_min_hit_rate) {
            problems.push(format!(
                "abort_min_hit_rate {} is outside [0, 1]",
                self.abort.abort_min_hit_rate
            ));
        }
        if self.zernike.zernike_grid < 2 {
            problems.push(format!(
                "zernike_grid is {}, must be at least 2",
                self.zernike.zernike_grid
            ));
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(LensForgeError::Config(problems.join("; ")))
        }
    }

    /// Overlays only the arguments the user typed; defaults never clobber the file.
    pub fn merge_from_cli(&mut self, cli: &Config, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($group:ident . $field:ident) => {
                if matches.value_source(stringify!($field)) == Some(ValueSource::CommandLine) {
                    self.$group.$field = cli.$group.$field.clone();
                }
            };
        }

        update_if_present!(eval.failure_penalty);
        update_if_present!(eval.default_wavelength_um);
        update_if_present!(eval.effl_use_object_distance);
        update_if_present!(eval.la_samples);
        update_if_present!(eval.glass_catalog);

        update_if_present!(spot.spot_ray_count);
        update_if_present!(spot.spot_ring_count);
        update_if_present!(spot.spot_penalty_base);

        update_if_present!(abort.abort_min_attempts);
        update_if_present!(abort.abort_min_hit_rate);
        update_if_present!(abort.abort_max_hits);
        update_if_present!(abort.abort_miss_streak);
        update_if_present!(abort.abort_block_streak);
        update_if_present!(abort.abort_cap_attempts);

        update_if_present!(zernike.zernike_grid);
        update_if_present!(zernike.zernike_max_noll);
    }
}
