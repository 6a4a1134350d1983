use std::str::FromStr;
use std::sync::Arc;

use crate::serialize::{JsonBackend, SerdeJsonBackend, StrictBackend};

/// Serializer implementations that can be selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// `serde_json` with default-coercion support.
    #[default]
    SerdeJson,
    /// Native values only; refuses coercion functions.
    Strict,
}

/// Error type returned when parsing a backend name.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BackendError {
    #[error("unknown JSON backend {0:?} (expected \"serde_json\" or \"strict\")")]
    UnknownBackend(String),
}

/// Parse a backend name. Matching ignores ASCII case and surrounding
/// whitespace; `serde-json` and `json` are accepted for `serde_json`.
pub fn parse_backend(name: &str) -> Result<BackendKind, BackendError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "serde_json" | "serde-json" | "json" => Ok(BackendKind::SerdeJson),
        "strict" => Ok(BackendKind::Strict),
        _ => Err(BackendError::UnknownBackend(name.to_string())),
    }
}

impl FromStr for BackendKind {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_backend(s)
    }
}

/// Create the serializer for `kind`.
///
/// Called once when the formatter configuration is built; the formatter
/// keeps the returned instance for its whole lifetime.
pub fn make_backend(kind: BackendKind) -> Arc<dyn JsonBackend> {
    match kind {
        BackendKind::SerdeJson => Arc::new(SerdeJsonBackend),
        BackendKind::Strict => Arc::new(StrictBackend),
    }
}
