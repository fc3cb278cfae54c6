use thiserror::Error;

/// Rejected stimulus or staircase parameters, reported once at load time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("`{field}` must be a finite positive number, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("`{field}` must be a finite non-negative number, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("`n_dot_sets` must be at least 1")]
    NoDotSets,

    #[error("dot density {density} over an aperture of {area:.3} deg² yields no dots")]
    NoDots { density: f64, area: f64 },

    #[error("fixation exclusion radius {exclusion} must be smaller than the aperture radius {aperture}")]
    ExclusionTooLarge { exclusion: f64, aperture: f64 },

    #[error("`{field}` = {value} lies outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Why a frame could not be presented.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("session aborted by participant")]
    Aborted,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub fn positive(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

pub fn non_negative(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

pub fn within(
    field: &'static str,
    value: f64,
    (min, max): (f64, f64),
) -> Result<f64, ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
