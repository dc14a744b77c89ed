//! Domain error types.

/// Top-level error type for arbot.
#[derive(Debug, thiserror::Error)]
pub enum ArbotError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for dataset {dataset}")]
    NoData { dataset: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ArbotError {
    fn from(err: serde_json::Error) -> Self {
        ArbotError::Serialization {
            reason: err.to_string(),
        }
    }
}

impl From<&ArbotError> for std::process::ExitCode {
    fn from(err: &ArbotError) -> Self {
        let code: u8 = match err {
            ArbotError::Io(_) => 1,
            ArbotError::ConfigParse { .. }
            | ArbotError::ConfigMissing { .. }
            | ArbotError::ConfigInvalid { .. } => 2,
            ArbotError::Database { .. }
            | ArbotError::DatabaseQuery { .. }
            | ArbotError::Serialization { .. } => 3,
            ArbotError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_reason() {
        let err = ArbotError::Database {
            reason: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "database error: connection refused");
    }

    #[test]
    fn config_missing_names_section_and_key() {
        let err = ArbotError::ConfigMissing {
            section: "signal".into(),
            key: "buy_threshold".into(),
        };
        assert_eq!(err.to_string(), "missing config key [signal] buy_threshold");
    }

    #[test]
    fn serde_error_converts_to_serialization() {
        let bad: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: ArbotError = bad.unwrap_err().into();
        match err {
            ArbotError::Serialization { .. } => {}
            other => panic!("expected Serialization, got: {other}"),
        }
    }
}
