use crate::exception::ExceptionInfo;
use crate::value::{JsonRecord, Value};
use chrono::{DateTime, Timelike, Utc};
use std::path::Path;
use tracing::Level;

/// Function name used when the call site does not expose one.
pub const UNKNOWN_FUNCTION: &str = "(unknown function)";

/// One captured log call, as handed over by the host logging framework.
///
/// Built-in attributes are plain fields; everything the caller attached at
/// call time lives in [`extra`](LogEvent::extra).
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub level: Level,
    /// Logger name (the `tracing` target).
    pub name: String,
    /// Raw message template.
    pub msg: String,
    /// Positional arguments interpolated into `msg`.
    pub args: Vec<Value>,
    pub created: DateTime<Utc>,
    /// Milliseconds since logging started, as reported by the host.
    pub relative_created: f64,
    pub filename: String,
    pub pathname: String,
    pub module: String,
    pub func_name: String,
    pub lineno: u32,
    pub thread: Option<u64>,
    pub thread_name: Option<String>,
    pub process: Option<u32>,
    pub process_name: Option<String>,
    pub stack_info: Option<String>,
    pub exc_info: Option<ExceptionInfo>,
    pub extra: JsonRecord,
}

/// Numeric severity of a level; higher is more severe.
pub fn level_no(level: &Level) -> u8 {
    match *level {
        Level::ERROR => 40,
        Level::WARN => 30,
        Level::INFO => 20,
        Level::DEBUG => 10,
        Level::TRACE => 5,
    }
}

impl LogEvent {
    /// Create an event stamped with the current time and no call site.
    pub fn new(level: Level, name: impl Into<String>, msg: impl Into<String>) -> Self {
        LogEvent {
            level,
            name: name.into(),
            msg: msg.into(),
            args: Vec::new(),
            created: Utc::now(),
            relative_created: 0.0,
            filename: String::new(),
            pathname: String::new(),
            module: String::new(),
            func_name: UNKNOWN_FUNCTION.to_string(),
            lineno: 0,
            thread: None,
            thread_name: None,
            process: None,
            process_name: None,
            stack_info: None,
            exc_info: None,
            extra: JsonRecord::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn args<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Attach a caller-supplied extra field. A repeated key replaces the
    /// earlier value.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Set the call site from a source path and line.
    ///
    /// `filename` becomes the last path component and `module` its stem.
    pub fn location(mut self, pathname: impl Into<String>, lineno: u32) -> Self {
        let pathname = pathname.into();
        let path = Path::new(&pathname);
        self.filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| pathname.clone());
        self.module = path
            .file_stem()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.filename.clone());
        self.pathname = pathname;
        self.lineno = lineno;
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn func_name(mut self, func_name: impl Into<String>) -> Self {
        self.func_name = func_name.into();
        self
    }

    pub fn created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    pub fn relative_created(mut self, millis: f64) -> Self {
        self.relative_created = millis;
        self
    }

    pub fn thread(mut self, id: u64, name: Option<String>) -> Self {
        self.thread = Some(id);
        self.thread_name = name;
        self
    }

    pub fn process(mut self, id: u32, name: Option<String>) -> Self {
        self.process = Some(id);
        self.process_name = name;
        self
    }

    pub fn stack_info(mut self, stack: impl Into<String>) -> Self {
        self.stack_info = Some(stack.into());
        self
    }

    pub fn exc_info(mut self, info: ExceptionInfo) -> Self {
        self.exc_info = Some(info);
        self
    }

    pub fn level_name(&self) -> &'static str {
        self.level.as_str()
    }

    /// Millisecond part of the creation time.
    pub fn msecs(&self) -> f64 {
        f64::from(self.created.nanosecond() % 1_000_000_000) / 1_000_000.0
    }

    /// Full attribute set of the event: built-in attributes under their
    /// schema names, followed by the extras.
    ///
    /// Optional built-ins the event does not carry (no exception, no thread
    /// or process info, no stack info) are left out rather than reported as
    /// null, so a schema that omits them never surfaces an empty key.
    pub fn attributes(&self) -> Vec<(String, Value)> {
        let mut attrs: Vec<(String, Value)> = vec![
            ("args".into(), Value::List(self.args.clone())),
            ("created".into(), Value::from(self.created)),
            ("filename".into(), Value::from(self.filename.as_str())),
            ("funcName".into(), Value::from(self.func_name.as_str())),
            ("levelname".into(), Value::from(self.level_name())),
            ("levelno".into(), Value::from(level_no(&self.level))),
            ("lineno".into(), Value::from(self.lineno)),
            ("module".into(), Value::from(self.module.as_str())),
            ("msecs".into(), Value::from(self.msecs())),
            ("msg".into(), Value::from(self.msg.as_str())),
            ("name".into(), Value::from(self.name.as_str())),
            ("pathname".into(), Value::from(self.pathname.as_str())),
            ("relativeCreated".into(), Value::from(self.relative_created)),
        ];

        let optional = [
            ("exc_info", self.exc_info.as_ref().map(|e| Value::Str(e.format_exception()))),
            ("process", self.process.map(Value::from)),
            ("processName", self.process_name.clone().map(Value::Str)),
            ("stack_info", self.stack_info.clone().map(Value::Str)),
            ("thread", self.thread.map(Value::from)),
            ("threadName", self.thread_name.clone().map(Value::Str)),
        ];
        attrs.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| Some((name.to_string(), value?))),
        );
        attrs.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        attrs
    }
}
