use crate::value::{JsonRecord, Value};
use std::fmt;
use std::sync::Arc;

/// Maximum container nesting accepted by the encoder.
pub const MAX_DEPTH: usize = 128;

/// Coercion applied to values JSON cannot represent natively.
///
/// The returned value is encoded again, so it may itself contain values that
/// need coercion.
pub type CoerceFn = dyn Fn(&Value) -> Value + Send + Sync;

/// Errors raised while encoding a [`JsonRecord`].
#[derive(thiserror::Error, Debug)]
pub enum SerializeError {
    #[error("object of type {0} is not JSON serializable")]
    Unserializable(String),

    #[error("circular reference detected")]
    CircularReference,

    #[error("nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("{0} backend does not accept a default coercion function")]
    DefaultUnsupported(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Pluggable JSON encoder used by the formatter.
///
/// Implementations turn a record into a single-line JSON object. A backend
/// that cannot apply a coercion function must reject it with
/// [`SerializeError::DefaultUnsupported`] instead of silently ignoring it.
pub trait JsonBackend: Send + Sync + fmt::Debug {
    /// Name used in configuration and diagnostics.
    fn name(&self) -> &str;

    /// Encode `record`, applying `default` to non-native values when given.
    fn dumps(&self, record: &JsonRecord, default: Option<&CoerceFn>) -> Result<String, SerializeError>;
}

/// `serde_json` encoder with full support for default coercion.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJsonBackend;

impl JsonBackend for SerdeJsonBackend {
    fn name(&self) -> &str {
        "serde_json"
    }

    fn dumps(&self, record: &JsonRecord, default: Option<&CoerceFn>) -> Result<String, SerializeError> {
        let value = encode_record(record, default)?;
        Ok(serde_json::to_string(&value)?)
    }
}

/// Encoder that only accepts natively representable values and refuses any
/// coercion function.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictBackend;

impl JsonBackend for StrictBackend {
    fn name(&self) -> &str {
        "strict"
    }

    fn dumps(&self, record: &JsonRecord, default: Option<&CoerceFn>) -> Result<String, SerializeError> {
        if default.is_some() {
            return Err(SerializeError::DefaultUnsupported(self.name().to_string()));
        }
        let value = encode_record(record, None)?;
        Ok(serde_json::to_string(&value)?)
    }
}

/// Default coercion: an object's field mapping when it exposes one, the
/// value's string representation otherwise.
pub fn json_serializable(value: &Value) -> Value {
    match value {
        Value::Object(obj) => match obj.fields() {
            Some(fields) => Value::Map(fields),
            None => Value::Str(obj.to_string()),
        },
        other if other.is_native() => other.clone(),
        other => Value::Str(other.to_string()),
    }
}

/// Encode a whole record into a JSON object value.
pub fn encode_record(
    record: &JsonRecord,
    default: Option<&CoerceFn>,
) -> Result<serde_json::Value, SerializeError> {
    let mut encoder = Encoder {
        default,
        objects: Vec::new(),
    };
    let mut out = serde_json::Map::with_capacity(record.len());
    for (key, value) in record {
        out.insert(key.clone(), encoder.encode(value, 1)?);
    }
    Ok(serde_json::Value::Object(out))
}

struct Encoder<'a> {
    default: Option<&'a CoerceFn>,
    /// Addresses of the objects currently being expanded.
    objects: Vec<usize>,
}

impl<'a> Encoder<'a> {
    fn encode(&mut self, value: &Value, depth: usize) -> Result<serde_json::Value, SerializeError> {
        if depth > MAX_DEPTH {
            return Err(SerializeError::TooDeep(MAX_DEPTH));
        }

        Ok(match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::UInt(u) => serde_json::Value::from(*u),
            // NaN and infinities have no JSON form.
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| self.encode(item, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key.clone(), self.encode(item, depth + 1)?);
                }
                serde_json::Value::Object(out)
            }
            Value::Object(obj) => {
                let default = self.coercion(value)?;
                let addr = Arc::as_ptr(obj) as *const () as usize;
                if self.objects.contains(&addr) {
                    return Err(SerializeError::CircularReference);
                }
                self.objects.push(addr);
                let result = self.encode(&default(value), depth + 1);
                self.objects.pop();
                result?
            }
            Value::Timestamp(_) | Value::Bytes(_) => {
                let default = self.coercion(value)?;
                self.encode(&default(value), depth + 1)?
            }
        })
    }

    fn coercion(&self, value: &Value) -> Result<&'a CoerceFn, SerializeError> {
        self.default
            .ok_or_else(|| SerializeError::Unserializable(value.type_name().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::LogObject;
    use chrono::{TimeZone, Utc};
    use std::sync::{Mutex, Weak};

    #[derive(Debug)]
    struct Point {
        x: i64,
        y: i64,
    }

    impl fmt::Display for Point {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Point({}, {})", self.x, self.y)
        }
    }

    impl LogObject for Point {
        fn fields(&self) -> Option<JsonRecord> {
            let mut map = JsonRecord::new();
            map.insert("x".into(), self.x.into());
            map.insert("y".into(), self.y.into());
            Some(map)
        }
    }

    #[derive(Debug)]
    struct Opaque;

    impl fmt::Display for Opaque {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("<opaque>")
        }
    }

    impl LogObject for Opaque {}

    #[derive(Debug)]
    struct Node {
        me: Mutex<Weak<Node>>,
    }

    impl fmt::Display for Node {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("Node")
        }
    }

    impl LogObject for Node {
        fn fields(&self) -> Option<JsonRecord> {
            let mut map = JsonRecord::new();
            if let Some(me) = self.me.lock().unwrap().upgrade() {
                map.insert("me".into(), Value::Object(me));
            }
            Some(map)
        }
    }

    fn cyclic() -> Value {
        let node = Arc::new(Node {
            me: Mutex::new(Weak::new()),
        });
        *node.me.lock().unwrap() = Arc::downgrade(&node);
        Value::Object(node)
    }

    fn record(key: &str, value: Value) -> JsonRecord {
        let mut map = JsonRecord::new();
        map.insert(key.to_string(), value);
        map
    }

    #[test]
    fn native_values_encode_without_coercion() {
        let mut rec = record("a", 1.into());
        rec.insert("b".into(), Value::from(vec!["x", "y"]));
        rec.insert("c".into(), Value::Null);
        let json = SerdeJsonBackend.dumps(&rec, None).unwrap();
        assert_eq!(json, r#"{"a":1,"b":["x","y"],"c":null}"#);
    }

    #[test]
    fn object_with_fields_coerces_to_map() {
        let rec = record("point", Value::object(Point { x: 1, y: 2 }));
        let json = SerdeJsonBackend.dumps(&rec, Some(&json_serializable)).unwrap();
        assert_eq!(json, r#"{"point":{"x":1,"y":2}}"#);
    }

    #[test]
    fn object_without_fields_coerces_to_string() {
        let rec = record("thing", Value::object(Opaque));
        let json = SerdeJsonBackend.dumps(&rec, Some(&json_serializable)).unwrap();
        assert_eq!(json, r#"{"thing":"<opaque>"}"#);
    }

    #[test]
    fn timestamps_and_bytes_use_string_form() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let mut rec = record("at", ts.into());
        rec.insert("raw".into(), Value::bytes(b"ab".to_vec()));
        let json = SerdeJsonBackend.dumps(&rec, Some(&json_serializable)).unwrap();
        assert_eq!(json, r#"{"at":"2024-01-02T03:04:05+00:00","raw":"ab"}"#);
    }

    #[test]
    fn missing_coercion_is_a_type_error() {
        let rec = record("raw", Value::bytes(vec![1u8]));
        let err = SerdeJsonBackend.dumps(&rec, None).unwrap_err();
        assert!(matches!(err, SerializeError::Unserializable(ref t) if t == "bytes"));
    }

    #[test]
    fn self_reference_is_detected() {
        let rec = record("node", cyclic());
        let err = SerdeJsonBackend.dumps(&rec, Some(&json_serializable)).unwrap_err();
        assert!(matches!(err, SerializeError::CircularReference));
    }

    #[test]
    fn shared_objects_are_not_cycles() {
        let shared = Value::object(Point { x: 0, y: 0 });
        let rec = record("pair", Value::List(vec![shared.clone(), shared]));
        let json = SerdeJsonBackend.dumps(&rec, Some(&json_serializable)).unwrap();
        assert_eq!(json, r#"{"pair":[{"x":0,"y":0},{"x":0,"y":0}]}"#);
    }

    #[test]
    fn non_finite_floats_encode_as_null() {
        let mut rec = record("ratio", f64::NAN.into());
        rec.insert("ceiling".into(), Value::List(vec![f64::INFINITY.into(), 1.5.into()]));
        let json = SerdeJsonBackend.dumps(&rec, Some(&json_serializable)).unwrap();
        assert_eq!(json, r#"{"ceiling":[null,1.5],"ratio":null}"#);

        let json = StrictBackend.dumps(&record("low", f64::NEG_INFINITY.into()), None).unwrap();
        assert_eq!(json, r#"{"low":null}"#);
    }

    #[test]
    fn coercion_that_never_converges_hits_depth_limit() {
        let identity = |v: &Value| v.clone();
        let rec = record("raw", Value::bytes(vec![1u8]));
        let err = SerdeJsonBackend.dumps(&rec, Some(&identity)).unwrap_err();
        assert!(matches!(err, SerializeError::TooDeep(MAX_DEPTH)));
    }

    #[test]
    fn strict_backend_refuses_coercion() {
        let rec = record("a", 1.into());
        let err = StrictBackend.dumps(&rec, Some(&json_serializable)).unwrap_err();
        assert!(matches!(err, SerializeError::DefaultUnsupported(_)));
        assert_eq!(StrictBackend.dumps(&rec, None).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn escapes_control_characters_on_one_line() {
        let rec = record("msg", "line one\nline \"two\"".into());
        let json = SerdeJsonBackend.dumps(&rec, None).unwrap();
        assert!(!json.contains('\n'));
        assert_eq!(json, r#"{"msg":"line one\nline \"two\""}"#);
    }
}
