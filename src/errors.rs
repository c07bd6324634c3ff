// src/errors.rs

//! Run-error taxonomy for the supervisor.
//!
//! Variants carry plain strings rather than source errors so that a
//! finished run's error can live inside the immutable [`ExitReport`]
//! and be handed out to any number of status readers.
//!
//! [`ExitReport`]: crate::status::ExitReport

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// `execute` was called without a prior `build` for this run.
    #[error("supervisor has not been built")]
    NotInitialized,

    /// The OS refused to create the process (missing binary, permissions).
    #[error("failed to start '{program}': {message}")]
    StartFailed { program: String, message: String },

    /// The child ran but exited non-zero or was terminated by a signal.
    #[error("process exited abnormally: {message} (code {code})")]
    AbnormalExit { code: i32, message: String },

    /// The caller's cancellation signal fired during `execute`.
    #[error("process killed by cancellation signal")]
    KilledByCancellation,
}

pub type Result<T> = std::result::Result<T, ExecError>;
