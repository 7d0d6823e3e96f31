use strum::Display;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LensForgeError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Parsing Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Data Validation Error: {0}")]
    Validation(String),

    #[error("Evaluation Error: {0}")]
    Eval(#[from] EvalFault),
}

pub type LfResult<T> = Result<T, LensForgeError>;

/// Failure taxonomy shared by every operand kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultKind {
    InvalidInput,
    NoData,
    UnresolvableField,
    RayTraceFailed,
    PhysicalApertureBlock,
    NumericUnstable,
    ConfigMismatch,
    Cancelled,
}

/// Where a ray left the clear aperture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApertureBlock {
    pub surface: usize,
    pub hit_radius: f64,
    pub aperture_limit: f64,
}

impl ApertureBlock {
    pub fn overshoot_ratio(&self) -> f64 {
        if self.aperture_limit > 0.0 {
            self.hit_radius / self.aperture_limit
        } else {
            0.0
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct EvalFault {
    pub kind: FaultKind,
    pub message: String,
    pub aperture: Option<ApertureBlock>,
}

pub type EvalResult<T> = Result<T, EvalFault>;

impl EvalFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            aperture: None,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(FaultKind::InvalidInput, message)
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        Self::new(FaultKind::NoData, message)
    }

    pub fn unresolvable_field(message: impl Into<String>) -> Self {
        Self::new(FaultKind::UnresolvableField, message)
    }

    pub fn ray_trace_failed(message: impl Into<String>) -> Self {
        Self::new(FaultKind::RayTraceFailed, message)
    }

    pub fn numeric_unstable(message: impl Into<String>) -> Self {
        Self::new(FaultKind::NumericUnstable, message)
    }

    pub fn config_mismatch(message: impl Into<String>) -> Self {
        Self::new(FaultKind::ConfigMismatch, message)
    }

    pub fn cancelled() -> Self {
        Self::new(FaultKind::Cancelled, "operation cancelled")
    }

    pub fn aperture_block(surface: usize, hit_radius: f64, aperture_limit: f64) -> Self {
        Self {
            kind: FaultKind::PhysicalApertureBlock,
            message: format!(
                "ray at r={hit_radius:.4} exceeds semi-diameter {aperture_limit:.4} on surface {surface}"
            ),
            aperture: Some(ApertureBlock {
                surface,
                hit_radius,
                aperture_limit,
            }),
        }
    }

    /// Rejects NaN and infinities coming out of a numeric routine.
    pub fn require_finite(value: f64, what: &str) -> EvalResult<f64> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(Self::numeric_unstable(format!("{what} is not finite")))
        }
    }
}
