//! Job validation errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Bad cron expression '{expression}': {reason}")]
    BadCronExpression { expression: String, reason: String },

    #[error("Bad script path '{}': {reason}", path.display())]
    BadScriptPath { path: PathBuf, reason: String },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_script_path_message() {
        let err = ValidationError::BadScriptPath {
            path: PathBuf::from("relative.sh"),
            reason: "not absolute".to_string(),
        };
        assert!(err.to_string().contains("relative.sh"));
        assert!(err.to_string().contains("not absolute"));
    }

    #[test]
    fn test_missing_field_message() {
        let err = ValidationError::MissingField("script_path");
        assert_eq!(err.to_string(), "Missing required field: script_path");
    }
}
