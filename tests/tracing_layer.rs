use std::error::Error;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex};

use serde_json::Value as Json;
use tracing::{error, info, info_span, warn};
use tracing_loki_json::formatter::FormatterConfig;
use tracing_loki_json::{JsonEventFormat, LokiFormatter};

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Captured {
    fn lines(&self) -> Vec<serde_json::Map<String, Json>> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| match serde_json::from_str(line).unwrap() {
                Json::Object(map) => map,
                other => panic!("not an object: {other}"),
            })
            .collect()
    }
}

fn capture(formatter: LokiFormatter, emit: impl FnOnce()) -> Vec<serde_json::Map<String, Json>> {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .event_format(JsonEventFormat::new(formatter))
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, emit);
    captured.lines()
}

#[derive(Debug)]
struct Refused;

impl fmt::Display for Refused {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("connection refused")
    }
}

impl Error for Refused {}

#[test]
fn event_fields_become_extras() {
    let lines = capture(LokiFormatter::default(), || {
        info!(request_id = "abc123", attempt = 2u64, cached = false, "user {} logged in", "alice");
    });
    assert_eq!(lines.len(), 1);

    let out = &lines[0];
    assert_eq!(out["message"], "user alice logged in");
    assert_eq!(out["level"], "INFO");
    assert_eq!(out["name"], module_path!());
    assert_eq!(out["request_id"], "abc123");
    assert_eq!(out["attempt"], 2);
    assert_eq!(out["cached"], false);
    assert_eq!(out["filename"], "tracing_layer.rs");
    assert_eq!(out["module"], module_path!());
    assert!(out["lineno"].as_u64().unwrap() > 0);
    assert_eq!(out["func_name"], "(unknown function)");
    assert!(!out.contains_key("exc_info"));
}

#[test]
fn span_name_is_used_as_function_name() {
    let lines = capture(LokiFormatter::default(), || {
        let span = info_span!("handle_request");
        let _guard = span.enter();
        warn!("slow upstream");
    });
    assert_eq!(lines[0]["func_name"], "handle_request");
    assert_eq!(lines[0]["level"], "WARN");
}

#[test]
fn error_fields_become_exc_info() {
    let lines = capture(LokiFormatter::default(), || {
        let err = Refused;
        error!(error = &err as &(dyn Error + 'static), "request failed");
    });
    let out = &lines[0];
    assert_eq!(out["message"], "request failed");
    assert!(out["exc_info"].as_str().unwrap().contains("connection refused"));
    assert!(!out.contains_key("error"));
}

#[test]
fn percent_signs_in_tracing_messages_are_literal() {
    let lines = capture(LokiFormatter::default(), || {
        info!("disk at {}%", 93);
    });
    assert_eq!(lines[0]["message"], "disk at 93%");
}

#[test]
fn one_line_per_event() {
    let formatter = LokiFormatter::new(FormatterConfig::default().with_name("svc::Formatter"));
    let lines = capture(formatter, || {
        info!(note = "first\nsecond", "a");
        info!("b");
    });
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["note"], "first\nsecond");
}
