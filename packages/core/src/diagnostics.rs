// Diagnostics
//
// Structured, user-facing errors. A failing plugin hook surfaces as a
// `Diagnostic` annotated with the plugin name and the absolute source path;
// programmer errors use the same shape but originate from the core itself.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin used for failures raised by the core rather than a plugin.
pub const CORE_ORIGIN: &str = "quarry";

/// A structured error suitable for display and for worker transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// The plugin or subsystem the failure originated from.
    pub origin: String,
    pub message: String,
    /// Absolute path of the source file being transformed, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn new(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            origin: origin.into(),
            message: message.into(),
            file_path: None,
            hint: None,
        }
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.origin, self.message)?;
        if let Some(file_path) = &self.file_path {
            write!(f, " (in {})", file_path)?;
        }
        Ok(())
    }
}

/// Error wrapper carrying a [`Diagnostic`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticError {
    pub diagnostic: Diagnostic,
}

impl DiagnosticError {
    pub fn new(origin: impl Into<String>, message: impl Into<String>) -> Self {
        DiagnosticError {
            diagnostic: Diagnostic::new(origin, message),
        }
    }

    /// Re-attribute this error to a plugin and source file. The message is
    /// preserved; origin and path always reflect the failing call site.
    pub fn attributed_to(mut self, origin: &str, file_path: &str) -> Self {
        self.diagnostic.origin = origin.to_string();
        self.diagnostic.file_path = Some(file_path.to_string());
        self
    }
}

impl From<Diagnostic> for DiagnosticError {
    fn from(diagnostic: Diagnostic) -> Self {
        DiagnosticError { diagnostic }
    }
}

impl fmt::Display for DiagnosticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.diagnostic)
    }
}

impl std::error::Error for DiagnosticError {}

#[cfg(test)]
mod tests {
    use super::*;

    mod diagnostic_tests {
        use super::*;

        #[test]
        fn should_display_origin_message_and_path() {
            let diagnostic = Diagnostic::new("my-plugin", "boom").with_file_path("/p/src/a.ts");
            assert_eq!(diagnostic.to_string(), "my-plugin: boom (in /p/src/a.ts)");
        }

        #[test]
        fn should_reattribute_errors() {
            let err = DiagnosticError::new(CORE_ORIGIN, "boom").attributed_to("t-min", "/p/a.js");
            assert_eq!(err.diagnostic.origin, "t-min");
            assert_eq!(err.diagnostic.file_path.as_deref(), Some("/p/a.js"));
            assert_eq!(err.diagnostic.message, "boom");
        }

        #[test]
        fn should_round_trip_through_serde() {
            let diagnostic = Diagnostic::new("t", "m").with_hint("h");
            let json = serde_json::to_string(&diagnostic).unwrap();
            let back: Diagnostic = serde_json::from_str(&json).unwrap();
            assert_eq!(back, diagnostic);
        }
    }
}
