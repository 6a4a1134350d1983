use std::any::Any;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::backend::{make_backend, parse_backend, BackendError, BackendKind};
use crate::env::{env_or, LOKI_JSON_BACKEND_ENV, LOKI_JSON_FORMATTER_NAME_ENV};
use crate::message::RenderError;
use crate::record::LogEvent;
use crate::schema::AttributeSchema;
use crate::serialize::JsonBackend;
use crate::value::JsonRecord;

/// Name written into the formatter's own error records by default.
pub const DEFAULT_FORMATTER_NAME: &str = concat!(module_path!(), "::LokiFormatter");

/// Output of [`steps::to_json`] when a record cannot be encoded at all.
pub const EMPTY_OBJECT: &str = "{}";

/// Errors raised by the formatting steps. None of them leave
/// [`JsonFormat::format`]; they are turned into an error record.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Failure reported by an overridden step.
    #[error(transparent)]
    Step(#[from] Box<dyn Error + Send + Sync>),

    #[error("{0}")]
    Panic(String),
}

impl FormatError {
    /// Build a step failure from plain text.
    pub fn msg(text: impl Into<String>) -> Self {
        let text: String = text.into();
        FormatError::Step(text.into())
    }
}

/// Formatter configuration, resolved once and shared by every call.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Written as `name` in the formatter's own error records.
    pub name: String,
    pub backend: Arc<dyn JsonBackend>,
    /// Built-in attribute names; everything else on an event is an extra.
    pub schema: AttributeSchema,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_FORMATTER_NAME.to_string(),
            backend: make_backend(BackendKind::default()),
            schema: AttributeSchema::default(),
        }
    }
}

impl FormatterConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_backend<B: JsonBackend + 'static>(mut self, backend: B) -> Self {
        self.backend = Arc::new(backend);
        self
    }

    pub fn with_shared_backend(mut self, backend: Arc<dyn JsonBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Replace the built-in attribute set. Built-ins left out of `schema`
    /// are emitted as extras whenever the event carries a value for them.
    pub fn with_schema(mut self, schema: AttributeSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Build a configuration from `LOKI_JSON_BACKEND` and
    /// `LOKI_JSON_FORMATTER_NAME`, falling back to the defaults.
    pub fn from_env() -> Result<Self, BackendError> {
        let kind = parse_backend(&env_or(LOKI_JSON_BACKEND_ENV, "serde_json"))?;
        Ok(Self {
            name: env_or(LOKI_JSON_FORMATTER_NAME_ENV, DEFAULT_FORMATTER_NAME),
            backend: make_backend(kind),
            schema: AttributeSchema::default(),
        })
    }
}

/// Turns one [`LogEvent`] into one line of JSON.
///
/// Every step is a provided method and can be overridden on its own. The
/// stock behavior of each step is available in [`steps`], so an override can
/// run the default and extend its result:
///
/// ```
/// use tracing_loki_json::formatter::{steps, FormatterConfig, JsonFormat};
/// use tracing_loki_json::value::{JsonRecord, Value};
///
/// struct HexBytes(FormatterConfig);
///
/// impl JsonFormat for HexBytes {
///     fn config(&self) -> &FormatterConfig {
///         &self.0
///     }
///
///     fn mutate_json_record(&self, record: JsonRecord) -> JsonRecord {
///         let mut record = steps::isoformat_timestamps(record);
///         for value in record.values_mut() {
///             if let Value::Bytes(b) = value {
///                 *value = Value::Str(b.iter().map(|x| format!("{:02x}", x)).collect());
///             }
///         }
///         record
///     }
/// }
/// ```
pub trait JsonFormat: Send + Sync {
    fn config(&self) -> &FormatterConfig;

    /// Step A: render the message text from the template and its arguments.
    fn message(&self, event: &LogEvent) -> Result<String, FormatError> {
        Ok(steps::message(event)?)
    }

    /// Step B: collect the attributes that are not part of the schema.
    fn extra_from_event(&self, event: &LogEvent) -> JsonRecord {
        steps::extra_from_event(&self.config().schema, event)
    }

    /// Step C: add the fixed fields to the extras.
    fn json_record(
        &self,
        message: String,
        extra: JsonRecord,
        event: &LogEvent,
    ) -> Result<JsonRecord, FormatError> {
        Ok(steps::json_record(message, extra, event))
    }

    /// Step D: coerce field values before encoding. Always returns the
    /// record to encode, whether it was changed in place or rebuilt.
    fn mutate_json_record(&self, record: JsonRecord) -> JsonRecord {
        steps::isoformat_timestamps(record)
    }

    /// Step E: encode the record.
    fn to_json(&self, record: &JsonRecord) -> String {
        steps::to_json(self.config().backend.as_ref(), record)
    }

    /// Run steps A to E. Any error or panic in a step is returned as an
    /// error record instead.
    ///
    /// Panics are only contained when the binary unwinds; with
    /// `panic = "abort"` a panicking step still aborts the process.
    fn format(&self, event: &LogEvent) -> String {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<String, FormatError> {
            let message = self.message(event)?;
            let extra = self.extra_from_event(event);
            let record = self.json_record(message, extra, event)?;
            let record = self.mutate_json_record(record);
            Ok(self.to_json(&record))
        }));

        let err = match outcome {
            Ok(Ok(line)) => return line,
            Ok(Err(err)) => err,
            Err(payload) => FormatError::Panic(panic_message(payload.as_ref())),
        };
        steps::error_record(self.config(), &err)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "formatter panicked".to_string()
    }
}

/// The stock formatter: every step uses its default.
#[derive(Debug, Clone, Default)]
pub struct LokiFormatter {
    config: FormatterConfig,
}

impl LokiFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    /// Formatter configured from the environment; see
    /// [`FormatterConfig::from_env`].
    pub fn from_env() -> Result<Self, BackendError> {
        Ok(Self::new(FormatterConfig::from_env()?))
    }
}

impl JsonFormat for LokiFormatter {
    fn config(&self) -> &FormatterConfig {
        &self.config
    }
}

/// Default implementation of each formatting step.
pub mod steps {
    use super::{FormatError, FormatterConfig, EMPTY_OBJECT};
    use crate::message::{render, RenderError};
    use crate::record::LogEvent;
    use crate::schema::AttributeSchema;
    use crate::serialize::{json_serializable, JsonBackend};
    use crate::value::{iso8601, JsonRecord, Value};
    use std::panic::{self, AssertUnwindSafe};

    pub fn message(event: &LogEvent) -> Result<String, RenderError> {
        render(&event.msg, &event.args)
    }

    /// Fresh mapping of every event attribute whose name is not in `schema`.
    pub fn extra_from_event(schema: &AttributeSchema, event: &LogEvent) -> JsonRecord {
        event
            .attributes()
            .into_iter()
            .filter(|(name, _)| !schema.contains(name))
            .collect()
    }

    /// Fixed fields are written after the extras and replace any extra of
    /// the same name.
    pub fn json_record(message: String, mut extra: JsonRecord, event: &LogEvent) -> JsonRecord {
        extra.insert("message".into(), Value::Str(message));
        extra.insert("level".into(), Value::from(event.level_name()));
        extra.insert("name".into(), Value::from(event.name.as_str()));

        if let Some(exc) = &event.exc_info {
            extra.insert("exc_info".into(), Value::Str(exc.format_exception()));
        }

        extra.insert("filename".into(), Value::from(event.filename.as_str()));
        extra.insert("func_name".into(), Value::from(event.func_name.as_str()));
        extra.insert("lineno".into(), Value::from(event.lineno));
        extra.insert("module".into(), Value::from(event.module.as_str()));
        extra.insert("pathname".into(), Value::from(event.pathname.as_str()));
        extra
    }

    /// Replace every top-level timestamp with its ISO-8601 text.
    pub fn isoformat_timestamps(mut record: JsonRecord) -> JsonRecord {
        for value in record.values_mut() {
            if let Value::Timestamp(ts) = value {
                *value = Value::Str(iso8601(ts));
            }
        }
        record
    }

    /// Encode with the default coercion, then without it, then give up with
    /// an empty object.
    pub fn to_json(backend: &dyn JsonBackend, record: &JsonRecord) -> String {
        backend
            .dumps(record, Some(&json_serializable))
            .or_else(|_| backend.dumps(record, None))
            .unwrap_or_else(|_| EMPTY_OBJECT.to_string())
    }

    /// Three-field error record describing `err`.
    ///
    /// Encoded through the configured backend so the error text is escaped;
    /// if that backend fails or panics, `serde_json` encodes it directly.
    pub fn error_record(config: &FormatterConfig, err: &FormatError) -> String {
        let mut record = JsonRecord::new();
        record.insert("level".into(), Value::from("ERROR"));
        record.insert("name".into(), Value::from(config.name.as_str()));
        record.insert("message".into(), Value::Str(err.to_string()));

        let encoded = panic::catch_unwind(AssertUnwindSafe(|| config.backend.dumps(&record, None)));
        match encoded {
            Ok(Ok(line)) => line,
            _ => serde_json::json!({
                "level": "ERROR",
                "name": config.name,
                "message": err.to_string(),
            })
            .to_string(),
        }
    }
}
