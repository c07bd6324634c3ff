// src/status.rs

//! Per-run exit status.
//!
//! A run produces exactly one immutable [`ExitReport`], swapped into a
//! single-slot holder by the run's own reaper. Readers either see no
//! report yet or a complete one; there is no field-by-field mutation to
//! observe half-way.

use std::sync::{Arc, PoisonError, RwLock};

use crate::errors::ExecError;

/// Exit code recorded when the real code could not be determined: the
/// process failed to start, or the OS reported no code (signal death).
pub const UNKNOWN_EXIT_CODE: i32 = 255;

/// How one run of the child ended.
#[derive(Debug, Clone)]
pub struct ExitReport {
    /// OS exit code; `0` on success, [`UNKNOWN_EXIT_CODE`] when unknown.
    pub code: i32,
    /// Human-readable diagnostic, empty on success.
    pub message: String,
    /// The run error, `None` on a clean exit.
    pub error: Option<ExecError>,
}

impl ExitReport {
    /// Report for a child that exited with code 0.
    pub fn clean() -> Self {
        Self {
            code: 0,
            message: String::new(),
            error: None,
        }
    }

    /// Report for a process that could not even be started.
    pub fn start_failed(error: ExecError) -> Self {
        Self {
            code: UNKNOWN_EXIT_CODE,
            message: error.to_string(),
            error: Some(error),
        }
    }

    /// Report for a child that ran and exited abnormally.
    pub fn abnormal(code: i32, message: String) -> Self {
        let error = ExecError::AbnormalExit {
            code,
            message: message.clone(),
        };
        Self {
            code,
            message,
            error: Some(error),
        }
    }
}

/// Single-slot, read-mostly holder for the current run's report.
#[derive(Debug, Default)]
pub(crate) struct StatusCell {
    slot: RwLock<Option<Arc<ExitReport>>>,
}

impl StatusCell {
    pub(crate) fn publish(&self, report: ExitReport) {
        let mut slot = self
            .slot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(report));
    }

    pub(crate) fn clear(&self) {
        let mut slot = self
            .slot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    pub(crate) fn get(&self) -> Option<Arc<ExitReport>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cell_reads_none() {
        let cell = StatusCell::default();
        assert!(cell.get().is_none());
    }

    #[test]
    fn publish_then_clear() {
        let cell = StatusCell::default();
        cell.publish(ExitReport::abnormal(7, "exit status: 7".into()));

        let report = cell.get().expect("report published");
        assert_eq!(report.code, 7);
        assert!(matches!(
            report.error,
            Some(ExecError::AbnormalExit { code: 7, .. })
        ));

        cell.clear();
        assert!(cell.get().is_none());
    }

    #[test]
    fn start_failed_report_uses_sentinel_code() {
        let report = ExitReport::start_failed(ExecError::StartFailed {
            program: "/nope".into(),
            message: "No such file or directory".into(),
        });
        assert_eq!(report.code, UNKNOWN_EXIT_CODE);
        assert!(!report.message.is_empty());
    }
}
