use std::fmt;

use chrono::Utc;
use tracing::Level;
use tracing_loki_json::formatter::{steps, FormatterConfig, JsonFormat};
use tracing_loki_json::{JsonRecord, LogEvent, LogObject, Value};

/// Formatter that hex-encodes binary fields and tags every line with the
/// deployment environment.
struct ServiceFormatter {
    config: FormatterConfig,
    environment: String,
}

impl JsonFormat for ServiceFormatter {
    fn config(&self) -> &FormatterConfig {
        &self.config
    }

    fn mutate_json_record(&self, record: JsonRecord) -> JsonRecord {
        let mut record = steps::isoformat_timestamps(record);
        for value in record.values_mut() {
            if let Value::Bytes(bytes) = value {
                *value = Value::Str(bytes.iter().map(|b| format!("{:02x}", b)).collect());
            }
        }
        record.insert("env".into(), Value::from(self.environment.as_str()));
        record
    }
}

#[derive(Debug)]
struct Account {
    id: u64,
    plan: &'static str,
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Account#{}", self.id)
    }
}

impl LogObject for Account {
    fn fields(&self) -> Option<JsonRecord> {
        let mut map = JsonRecord::new();
        map.insert("id".into(), Value::from(self.id));
        map.insert("plan".into(), Value::from(self.plan));
        Some(map)
    }
}

fn main() {
    let formatter = ServiceFormatter {
        config: FormatterConfig::default().with_name("billing::ServiceFormatter"),
        environment: "staging".to_string(),
    };

    let event = LogEvent::new(Level::INFO, "billing.invoices", "invoice %s issued for %.2f")
        .args(vec![Value::from("INV-0042"), Value::from(129.5)])
        .location(file!(), line!())
        .func_name("main")
        .extra("account", Value::object(Account { id: 7, plan: "pro" }))
        .extra("signature", Value::bytes(vec![0xde, 0xad, 0xbe, 0xef]))
        .extra("due", Utc::now());
    println!("{}", formatter.format(&event));

    // Argument mismatch: the formatter answers with its own error record.
    let broken = LogEvent::new(Level::WARN, "billing.invoices", "total %d").arg("n/a");
    println!("{}", formatter.format(&broken));
}
