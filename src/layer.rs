use crate::exception::ExceptionInfo;
use crate::formatter::{JsonFormat, LokiFormatter};
use crate::record::LogEvent;
use crate::value::{JsonRecord, Value};
use chrono::Utc;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` event format that writes every event as one line
/// of JSON produced by a [`JsonFormat`].
///
/// The `tracing` event is first converted into a [`LogEvent`]: the
/// `message` field becomes the template, every other field becomes an
/// extra, and the first `&dyn Error` field becomes the exception info.
/// The innermost span name stands in for the function name.
pub struct JsonEventFormat<F = LokiFormatter> {
    formatter: F,
    started: Instant,
    process_name: Option<String>,
}

impl<F: JsonFormat> JsonEventFormat<F> {
    pub fn new(formatter: F) -> Self {
        let process_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()));
        Self {
            formatter,
            started: Instant::now(),
            process_name,
        }
    }

    pub fn formatter(&self) -> &F {
        &self.formatter
    }

    /// Capture a `tracing` event as a [`LogEvent`].
    pub fn to_log_event(&self, event: &Event<'_>, span_name: Option<&str>) -> LogEvent {
        let mut fields = JsonRecord::new();
        let mut message: Option<String> = None;
        let mut exc_info: Option<ExceptionInfo> = None;

        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
            exc_info: &mut exc_info,
        };
        event.record(&mut visitor);

        let meta = event.metadata();
        let mut log_event = LogEvent::new(*meta.level(), meta.target(), message.unwrap_or_default())
            .created(Utc::now())
            .relative_created(self.started.elapsed().as_secs_f64() * 1000.0)
            .process(std::process::id(), self.process_name.clone());

        if let Some(file) = meta.file() {
            log_event = log_event.location(file, meta.line().unwrap_or(0));
        }
        if let Some(module) = meta.module_path() {
            log_event = log_event.module(module);
        }
        if let Some(name) = span_name {
            log_event = log_event.func_name(name);
        }

        let thread = std::thread::current();
        log_event = log_event.thread(thread_number(), thread.name().map(str::to_string));

        log_event.exc_info = exc_info;
        log_event.extra = fields;
        log_event
    }
}

impl Default for JsonEventFormat<LokiFormatter> {
    fn default() -> Self {
        Self::new(LokiFormatter::default())
    }
}

impl<F> fmt::Debug for JsonEventFormat<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonEventFormat")
            .field("formatter", &std::any::type_name::<F>())
            .field("process_name", &self.process_name)
            .finish()
    }
}

static NEXT_THREAD: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_NUMBER: u64 = NEXT_THREAD.fetch_add(1, Ordering::Relaxed);
}

/// Process-unique number of the calling thread, assigned on its first event.
fn thread_number() -> u64 {
    THREAD_NUMBER.with(|n| *n)
}

impl<S, N, F> FormatEvent<S, N> for JsonEventFormat<F>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    F: JsonFormat,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let span_name = ctx
            .event_scope()
            .and_then(|mut scope| scope.next())
            .map(|span| span.name());
        let log_event = self.to_log_event(event, span_name);
        writeln!(writer, "{}", self.formatter.format(&log_event))
    }
}

/// Collects the fields of a `tracing` event.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut JsonRecord,
    pub message: &'a mut Option<String>,
    pub exc_info: &'a mut Option<ExceptionInfo>,
}

impl<'a> FieldVisitor<'a> {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.exc_info.is_none() {
            *self.exc_info = Some(ExceptionInfo::from_dyn_error(value));
        } else {
            self.insert(field, Value::from(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.insert(field, Value::Str(format!("{:?}", value)));
        }
    }
}
