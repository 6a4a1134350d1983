use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Flat field mapping built for every formatted event.
///
/// Keys are unique; a later insert with the same key replaces the earlier
/// value. Iteration order is the sorted key order.
pub type JsonRecord = BTreeMap<String, Value>;

/// Caller-defined value object attached to an event.
///
/// Objects are not JSON-encodable by themselves. The default coercion turns
/// them into their [`fields`](LogObject::fields) mapping when one is
/// available, or into their `Display` string otherwise.
pub trait LogObject: fmt::Display + fmt::Debug + Send + Sync {
    /// Human-readable type name, used in serialization errors.
    fn type_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Field mapping exposed by the object, if it has one.
    fn fields(&self) -> Option<JsonRecord> {
        None
    }
}

/// A single attribute value carried by a [`LogEvent`](crate::record::LogEvent)
/// or a [`JsonRecord`].
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(JsonRecord),
    /// Needs the mutation hook or the default coercion before encoding.
    Timestamp(DateTime<FixedOffset>),
    /// Needs the default coercion before encoding.
    Bytes(Vec<u8>),
    /// Needs the default coercion before encoding.
    Object(Arc<dyn LogObject>),
}

impl Value {
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(bytes.into())
    }

    pub fn object<T: LogObject + 'static>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Short type label used in error messages.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::UInt(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Timestamp(_) => "timestamp",
            Value::Bytes(_) => "bytes",
            Value::Object(obj) => obj.type_name(),
        }
    }

    /// Whether JSON can represent the value without any coercion.
    ///
    /// Only the top-level variant is inspected; containers may still hold
    /// non-native members.
    pub fn is_native(&self) -> bool {
        !matches!(self, Value::Timestamp(_) | Value::Bytes(_) | Value::Object(_))
    }

    pub fn is_timestamp(&self) -> bool {
        matches!(self, Value::Timestamp(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&JsonRecord> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Numeric view used by the `%d`/`%f` family of conversions.
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Integer view used by `%d`, `%x`, `%o` and `%c`. Floats truncate.
    pub(crate) fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Int(i) => Some(*i as i128),
            Value::UInt(u) => Some(*u as i128),
            Value::Float(f) if f.is_finite() => Some(f.trunc() as i128),
            Value::Bool(b) => Some(*b as i128),
            _ => None,
        }
    }

    /// Quoted representation: strings and bytes are quoted, containers use
    /// the quoted form for their members.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("{:?}", s),
            Value::Bytes(b) => format!("b\"{}\"", b.escape_ascii()),
            Value::Timestamp(ts) => format!("Timestamp({})", iso8601(ts)),
            Value::Object(obj) => format!("{:?}", obj),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Map(map) => {
                let inner: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{:?}: {}", k, v.repr()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            other => other.to_string(),
        }
    }
}

/// ISO-8601 text for a timestamp, e.g. `2024-05-01T12:30:00.250+00:00`.
pub fn iso8601(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

fn fmt_float(f: f64, out: &mut fmt::Formatter<'_>) -> fmt::Result {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        write!(out, "{:.1}", f)
    } else {
        write!(out, "{}", f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(x) => fmt_float(*x, f),
            Value::Str(s) => f.write_str(s),
            Value::Timestamp(ts) => f.write_str(&iso8601(ts)),
            Value::Bytes(b) => write!(f, "{}", b.escape_ascii()),
            Value::Object(obj) => write!(f, "{}", obj),
            Value::List(_) | Value::Map(_) => f.write_str(&self.repr()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! from_signed {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i64)
            }
        }
    )*};
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::UInt(v as u64)
            }
        }
    )*};
}

from_signed!(i8, i16, i32, i64, isize);
from_unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(ts: DateTime<Tz>) -> Self {
        Value::Timestamp(ts.fixed_offset())
    }
}

/// Naive datetimes are taken as UTC.
impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(Utc.from_utc_datetime(&ts).fixed_offset())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<JsonRecord> for Value {
    fn from(map: JsonRecord) -> Self {
        Value::Map(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Point;

    impl fmt::Display for Point {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("Point(1, 2)")
        }
    }

    impl LogObject for Point {}

    #[test]
    fn display_uses_plain_forms() {
        assert_eq!(Value::from("abc").to_string(), "abc");
        assert_eq!(Value::from(3.0).to_string(), "3.0");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::bytes(b"a\n".to_vec()).to_string(), "a\\n");
        assert_eq!(Value::object(Point).to_string(), "Point(1, 2)");
    }

    #[test]
    fn repr_quotes_strings_inside_containers() {
        let v = Value::from(vec!["a", "b"]);
        assert_eq!(v.repr(), "[\"a\", \"b\"]");
        assert_eq!(v.to_string(), "[\"a\", \"b\"]");
    }

    #[test]
    fn timestamps_render_as_iso8601() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(Value::from(ts).to_string(), "2024-05-01T12:30:00+00:00");
    }

    #[test]
    fn native_classification() {
        assert!(Value::Null.is_native());
        assert!(Value::from(vec![1, 2]).is_native());
        assert!(!Value::bytes(vec![0u8]).is_native());
        assert!(!Value::object(Point).is_native());
        assert!(!Value::from(Utc::now()).is_native());
    }

    #[test]
    fn object_type_name_defaults_to_rust_type() {
        assert!(Value::object(Point).type_name().ends_with("Point"));
    }
}
