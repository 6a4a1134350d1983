use std::collections::BTreeSet;

/// Attribute names that make up the built-in event schema.
///
/// Anything on an event that is not listed here is an extra field supplied
/// by the caller.
pub const BUILTIN_ATTRS: &[&str] = &[
    "args",
    "asctime",
    "created",
    "exc_info",
    "exc_text",
    "filename",
    "funcName",
    "levelname",
    "levelno",
    "lineno",
    "module",
    "msecs",
    "message",
    "msg",
    "name",
    "pathname",
    "process",
    "processName",
    "relativeCreated",
    "stack_info",
    "thread",
    "threadName",
];

/// Closed set of built-in attribute names used to tell extras apart from
/// schema fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSchema {
    names: BTreeSet<String>,
}

impl AttributeSchema {
    /// Build a schema from an explicit list of names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttributeSchema {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a name for hosts whose native schema carries more attributes.
    pub fn with_attr(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Default for AttributeSchema {
    fn default() -> Self {
        AttributeSchema::new(BUILTIN_ATTRS.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schema_is_the_builtin_list() {
        let schema = AttributeSchema::default();
        assert_eq!(schema.len(), BUILTIN_ATTRS.len());
        for name in BUILTIN_ATTRS {
            assert!(schema.contains(name), "{name} missing");
        }
        assert!(!schema.contains("request_id"));
        assert!(!schema.contains("level"));
    }

    #[test]
    fn with_attr_extends_the_set() {
        let schema = AttributeSchema::default().with_attr("taskName");
        assert!(schema.contains("taskName"));
        assert_eq!(schema.len(), BUILTIN_ATTRS.len() + 1);
    }
}
