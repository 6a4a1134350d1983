//! Environment variable names used by this crate for convenient
//! configuration of the formatter from services.
//!
//! These are purely helpers; the formatter itself never reads the
//! environment while formatting.

/// JSON backend name, `serde_json` (default) or `strict`.
pub const LOKI_JSON_BACKEND_ENV: &str = "LOKI_JSON_BACKEND";

/// Name written into the `name` field of the formatter's own error records.
pub const LOKI_JSON_FORMATTER_NAME_ENV: &str = "LOKI_JSON_FORMATTER_NAME";

/// Level filter used by [`init`](crate::init) when `RUST_LOG` is unset.
pub const LOKI_JSON_LOG_LEVEL_ENV: &str = "LOKI_JSON_LOG_LEVEL";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_when_unset() {
        assert_eq!(env_or("LOKI_JSON_SURELY_UNSET_VARIABLE", "fallback"), "fallback");
    }
}
