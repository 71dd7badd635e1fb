//! Error taxonomy of the propagation engine.
//!
//! Construction problems surface as [`ValidationError`] (malformed physics
//! input) or [`ConfigurationError`] (unsupported truncation), integration
//! problems as [`NumericalInstabilityError`]. None of them is recovered
//! locally.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    NumericalInstability(#[from] NumericalInstabilityError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Malformed input, detected at construction time
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{name} is not Hermitian (max |A - A^dag| = {deviation:e})")]
    NonHermitian { name: String, deviation: f64 },
    #[error("{name} has non-finite entries")]
    NonFinite { name: String },
    #[error("{name} must be {requirement}, got {value}")]
    InvalidParameter {
        name: String,
        requirement: &'static str,
        value: f64,
    },
    #[error("{name}: expected {expected}, got {actual}")]
    DimensionMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("unknown spectral density form '{0}'")]
    UnknownSpectralDensity(String),
    #[error("spectral density '{form}' takes {expected} parameters, got {actual}")]
    ParameterCount {
        form: String,
        expected: usize,
        actual: usize,
    },
    #[error("Matsubara frequency {nu} coincides with a pole of the '{form}' spectral density")]
    MatsubaraResonance { form: String, nu: f64 },
    #[error("unknown propagation method '{0}'")]
    UnknownMethod(String),
}

impl ValidationError {
    pub(crate) fn positive(name: &str, value: f64) -> Self {
        ValidationError::InvalidParameter {
            name: name.to_string(),
            requirement: "positive and finite",
            value,
        }
    }

    pub(crate) fn non_negative(name: &str, value: f64) -> Self {
        ValidationError::InvalidParameter {
            name: name.to_string(),
            requirement: "non-negative and finite",
            value,
        }
    }
}

/// Hierarchy or truncation parameters outside the supported bounds
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("hierarchy with depth L={depth} over {modes} modes has {members} members (limit {limit})")]
    HierarchyTooLarge {
        depth: usize,
        modes: usize,
        members: String,
        limit: usize,
    },
    #[error("packed hierarchy state needs {entries} entries (limit {limit})")]
    StateTooLarge { entries: usize, limit: usize },
    #[error("{name} = {value} is outside the supported range {range}")]
    Truncation {
        name: &'static str,
        value: usize,
        range: &'static str,
    },
}

/// Non-finite values appeared while integrating
#[derive(Clone, Debug, Error, PartialEq)]
#[error("numerical instability in {entity} at t = {time} (step {step})")]
pub struct NumericalInstabilityError {
    pub time: f64,
    pub step: usize,
    pub entity: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = ValidationError::NonHermitian {
            name: "coupling operator 1".to_string(),
            deviation: 0.5,
        };
        assert!(e.to_string().contains("coupling operator 1"));

        let e: Error = NumericalInstabilityError {
            time: 1.5,
            step: 30,
            entity: "hierarchy member [0, 1]".to_string(),
        }
        .into();
        let msg = e.to_string();
        assert!(msg.contains("[0, 1]"));
        assert!(msg.contains("step 30"));

        let e: Error = ValidationError::positive("temperature", -1.0).into();
        assert!(matches!(e, Error::Validation(_)));
        assert!(e.to_string().contains("temperature"));
    }
}
