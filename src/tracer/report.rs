//! Execution report types.
//!
//! Serde-deserializable from the harness JSON. Created fresh per run and
//! never mutated after the Tracer hands it back.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Terminal classification of one Tracer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    RuntimeError,
    SyntaxError,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::RuntimeError => write!(f, "runtime_error"),
            RunStatus::SyntaxError => write!(f, "syntax_error"),
        }
    }
}

/// One executed statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based line number of the statement about to execute.
    #[serde(rename = "line")]
    pub location: u32,
    /// Local name → textual snapshot at that instant.
    #[serde(rename = "variables", default)]
    pub bindings: BTreeMap<String, String>,
}

/// Result of one Tracer run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub status: RunStatus,
    /// Execution order. Always empty for `SyntaxError`.
    #[serde(default)]
    pub trace_history: Vec<StepRecord>,
    /// Formatted failure text. `None` on success.
    #[serde(default)]
    pub error_log: Option<String>,
    /// Set when the history hit the configured step cap.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl ExecutionReport {
    pub fn success(trace_history: Vec<StepRecord>) -> Self {
        Self {
            status: RunStatus::Success,
            trace_history,
            error_log: None,
            truncated: false,
        }
    }

    pub fn runtime_error(trace_history: Vec<StepRecord>, error_log: impl Into<String>) -> Self {
        Self {
            status: RunStatus::RuntimeError,
            trace_history,
            error_log: Some(error_log.into()),
            truncated: false,
        }
    }

    pub fn syntax_error(error_log: impl Into<String>) -> Self {
        Self {
            status: RunStatus::SyntaxError,
            trace_history: Vec::new(),
            error_log: Some(error_log.into()),
            truncated: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Error text, or "" when the run succeeded.
    pub fn error_text(&self) -> &str {
        self.error_log.as_deref().unwrap_or("")
    }

    /// Last non-empty line of the error log — the exception line for
    /// runtime faults, the diagnostic for syntax errors.
    pub fn error_headline(&self) -> &str {
        self.error_text()
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("")
    }

    /// Drop anything that contradicts the status. The harness is a separate
    /// process, so its output is normalized rather than trusted.
    pub(crate) fn normalized(mut self) -> Self {
        match self.status {
            RunStatus::Success => self.error_log = None,
            RunStatus::SyntaxError => self.trace_history.clear(),
            RunStatus::RuntimeError => {}
        }
        if !self.status.is_success() && self.error_text().trim().is_empty() {
            self.error_log = Some(format!("{} (no diagnostic produced)", self.status));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_deserializes_from_harness_json() {
        let json = r#"{
            "status": "runtime_error",
            "trace_history": [
                {"line": 1, "variables": {}},
                {"line": 2, "variables": {"x": "5", "name": "'bob'"}}
            ],
            "error_log": "Traceback (most recent call last):\nValueError: bad"
        }"#;

        let report: ExecutionReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.status, RunStatus::RuntimeError);
        assert_eq!(report.trace_history.len(), 2);
        assert_eq!(report.trace_history[1].location, 2);
        assert_eq!(report.trace_history[1].bindings["x"], "5");
        assert_eq!(report.error_headline(), "ValueError: bad");
        assert!(!report.truncated);
    }

    #[test]
    fn success_report_has_null_error_log() {
        let json = r#"{"status": "success", "trace_history": [], "error_log": null}"#;
        let report: ExecutionReport = serde_json::from_str(json).unwrap();
        assert!(report.is_success());
        assert!(report.error_log.is_none());
        assert_eq!(report.error_text(), "");
    }

    #[test]
    fn normalized_clears_contradictions() {
        let mut report = ExecutionReport::syntax_error("Syntax Error: bad");
        report.trace_history.push(StepRecord {
            location: 1,
            bindings: BTreeMap::new(),
        });
        let report = report.normalized();
        assert!(report.trace_history.is_empty());

        let mut ok = ExecutionReport::success(vec![]);
        ok.error_log = Some("stale".into());
        assert!(ok.normalized().error_log.is_none());
    }

    #[test]
    fn normalized_fills_missing_error_log() {
        let mut report = ExecutionReport::runtime_error(vec![], "");
        report.error_log = None;
        let report = report.normalized();
        assert!(report.error_text().contains("runtime_error"));
    }

    #[test]
    fn status_display_matches_wire_names() {
        assert_eq!(RunStatus::SyntaxError.to_string(), "syntax_error");
        let json = serde_json::to_string(&RunStatus::RuntimeError).unwrap();
        assert_eq!(json, "\"runtime_error\"");
    }

    #[test]
    fn truncated_flag_skipped_when_false() {
        let json = serde_json::to_string(&ExecutionReport::success(vec![])).unwrap();
        assert!(!json.contains("truncated"));
    }
}
