use profile_math::{ConvergenceError, ShearRangeError, SingularMatrixError, TableError};
use thiserror::Error;

/// Errors produced while building, transforming or rendering profiles.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// A constructor argument is missing, non-finite or out of range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name as the caller spelled it.
        name: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The attribute is not defined for this kind of profile, or was
    /// invalidated by a transformation.
    #[error("attribute `{attribute}` is undefined for a {profile} profile")]
    UndefinedAttribute {
        attribute: &'static str,
        profile: &'static str,
    },

    /// A lookup fell outside the domain of the object asked.
    #[error("out of domain: {0}")]
    OutOfDomain(String),

    /// An iterative solve did not converge.
    #[error("numerical failure while computing {what}: {source}")]
    NumericalFailure {
        what: &'static str,
        #[source]
        source: ConvergenceError,
    },

    /// A render could not reach the configured accuracy (strict mode only).
    #[error("accuracy shortfall: {0}")]
    AccuracyShortfall(String),

    /// Two images that must share bounds do not.
    #[error("image bounds mismatch: {left} vs {right}")]
    BoundsMismatch { left: String, right: String },

    #[error(transparent)]
    SingularTransform(#[from] SingularMatrixError),

    #[error(transparent)]
    ShearRange(#[from] ShearRangeError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("configuration parse error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProfileError>;

impl ProfileError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ProfileError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn undefined(attribute: &'static str, profile: &'static str) -> Self {
        ProfileError::UndefinedAttribute { attribute, profile }
    }

    pub(crate) fn numerical(what: &'static str, source: ConvergenceError) -> Self {
        ProfileError::NumericalFailure { what, source }
    }
}

/// Require a strictly positive, finite parameter.
pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ProfileError::invalid(name, format!("must be positive and finite, got {value}")))
    }
}

/// Require a finite parameter of any sign.
pub(crate) fn require_finite(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ProfileError::invalid(name, format!("must be finite, got {value}")))
    }
}
