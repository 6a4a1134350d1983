use std::error::Error;
use std::fmt::Write;

/// One frame of a captured stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub func_name: String,
    pub filename: String,
    pub lineno: u32,
}

impl Frame {
    pub fn new(func_name: impl Into<String>, filename: impl Into<String>, lineno: u32) -> Self {
        Frame {
            func_name: func_name.into(),
            filename: filename.into(),
            lineno,
        }
    }
}

/// Error captured alongside a log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    /// Concrete error type, when it is known at capture time.
    pub type_name: Option<String>,
    /// `Display` text of the error itself.
    pub value: String,
    /// `Display` text of every `source()` in the chain, outermost first.
    pub causes: Vec<String>,
    /// Innermost frame last.
    pub frames: Vec<Frame>,
}

impl ExceptionInfo {
    pub fn new(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        ExceptionInfo {
            type_name: Some(type_name.into()),
            value: value.into(),
            causes: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Capture a typed error and its source chain.
    pub fn from_error<E: Error + 'static>(err: &E) -> Self {
        let mut info = Self::from_dyn_error(err);
        info.type_name = Some(std::any::type_name::<E>().to_string());
        info
    }

    /// Capture a type-erased error and its source chain.
    pub fn from_dyn_error(err: &(dyn Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        ExceptionInfo {
            type_name: None,
            value: err.to_string(),
            causes,
            frames: Vec::new(),
        }
    }

    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Multi-line text rendering of the error, its causes and frames.
    ///
    /// Never empty: an error with an empty message still renders its type
    /// name or a placeholder.
    pub fn format_exception(&self) -> String {
        let mut out = String::new();
        match (&self.type_name, self.value.is_empty()) {
            (Some(ty), false) => {
                let _ = write!(out, "{}: {}", ty, self.value);
            }
            (Some(ty), true) => out.push_str(ty),
            (None, false) => out.push_str(&self.value),
            (None, true) => out.push_str("<unknown error>"),
        }

        if !self.causes.is_empty() {
            out.push_str("\n\nCaused by:");
            for (i, cause) in self.causes.iter().enumerate() {
                let _ = write!(out, "\n    {}: {}", i, cause);
            }
        }

        if !self.frames.is_empty() {
            out.push_str("\n\nStack backtrace:");
            for (i, frame) in self.frames.iter().enumerate() {
                let _ = write!(
                    out,
                    "\n  {:>2}: {}\n             at {}:{}",
                    i, frame.func_name, frame.filename, frame.lineno
                );
            }
        }
        out
    }
}
