//! Single-line JSON formatting of log events for Loki-style aggregation.
//!
//! [`formatter::LokiFormatter`] turns a [`record::LogEvent`] into one JSON
//! object: the caller's extra fields plus `message`, `level`, `name`,
//! `filename`, `func_name`, `lineno`, `module`, `pathname` and, when an error
//! was attached, `exc_info`. Formatting never fails; broken input degrades
//! to `{}` or to a three-field error record.
//!
//! [`layer::JsonEventFormat`] plugs any formatter into `tracing_subscriber`.

pub mod value;
pub mod record;
pub mod schema;
pub mod message;
pub mod exception;
pub mod serialize;
pub mod backend;
pub mod formatter;
pub mod layer;
pub mod env;

#[cfg(feature = "init")]
pub mod init;

pub use formatter::{FormatError, FormatterConfig, JsonFormat, LokiFormatter};
pub use layer::JsonEventFormat;
pub use record::LogEvent;
pub use value::{JsonRecord, LogObject, Value};
