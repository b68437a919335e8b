//! Error types returned by the calculators.

use thiserror::Error;

/// Errors surfaced by calculator operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("invalid argument `{param}`: {reason}")]
    InvalidArgument { param: &'static str, reason: String },

    #[error("search cancelled after {evaluated} combination(s)")]
    Cancelled { evaluated: u64 },

    #[error("gem repository error: {0}")]
    Repository(String),
}

impl CalcError {
    pub fn invalid(param: &'static str, reason: impl Into<String>) -> Self {
        CalcError::InvalidArgument {
            param,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CalcError>;

/// Reject negative or non-finite values.
pub(crate) fn ensure_non_negative(param: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(CalcError::invalid(param, format!("must be finite, got {}", value)));
    }
    if value < 0.0 {
        return Err(CalcError::invalid(param, format!("must be >= 0, got {}", value)));
    }
    Ok(())
}

/// Reject zero, negative or non-finite values.
pub(crate) fn ensure_positive(param: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CalcError::invalid(param, format!("must be > 0, got {}", value)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_message_names_param() {
        let err = ensure_positive("target_max_life", 0.0).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("target_max_life"));
        assert!(msg.contains("> 0"));
    }

    #[test]
    fn non_negative_accepts_zero() {
        assert!(ensure_non_negative("damage", 0.0).is_ok());
        assert!(ensure_non_negative("damage", -1.0).is_err());
        assert!(ensure_non_negative("damage", f64::NAN).is_err());
    }
}
