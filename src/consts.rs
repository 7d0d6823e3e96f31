/// Sentinel returned for any kernel failure that has no dedicated penalty.
pub const FAILURE_PENALTY: f64 = 1e9;

/// Helium d-line in µm. Fallback for every wavelength lookup.
pub const D_LINE_UM: f64 = 0.5875618;

/// Hydrogen F and C lines in µm, used when the source table has no spread.
pub const F_LINE_UM: f64 = 0.4861327;
pub const C_LINE_UM: f64 = 0.6562725;

/// Stop semi-diameter applied when the block omits it.
pub const DEFAULT_STOP_SEMIDIA: f64 = 5.0;

pub const DEFAULT_SPOT_RAY_COUNT: usize = 501;
pub const DEFAULT_SPOT_RING_COUNT: usize = 3;

pub const DEFAULT_ZERNIKE_GRID: usize = 32;
pub const DEFAULT_MAX_NOLL: usize = 37;
pub const MIN_ZERNIKE_SAMPLES: usize = 6;

pub const DEFAULT_LA_SAMPLES: usize = 20;
/// Fewest finite meridional crossings an LA RMS is computed from.
pub const MIN_LA_POINTS: usize = 2;

/// Number of aspheric polynomial coefficients carried per surface.
pub const COEF_COUNT: usize = 10;

pub const MM_TO_UM: f64 = 1000.0;

/// Operand config id meaning "whatever is active".
pub const CURRENT_CONFIG: &str = "Current";

/// Cache key segment used for the active configuration.
pub const ACTIVE_KEY: &str = "active";

pub const AIR: &str = "AIR";

/// Paraxial quantities smaller than this are treated as zero.
pub const PARAXIAL_EPS: f64 = 1e-12;
