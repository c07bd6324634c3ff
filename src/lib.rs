// src/lib.rs

//! `procwarden` — supervise a single external OS process from a
//! long-running host program.
//!
//! The [`Supervisor`] owns one command invocation at a time:
//!
//! ```no_run
//! use procwarden::{CancelToken, Supervisor};
//!
//! # async fn example() -> Result<(), procwarden::ExecError> {
//! let sup = Supervisor::new("/bin/echo").arg("hello");
//! sup.build().await;
//! sup.execute(CancelToken::never()).await?;
//! assert_eq!(sup.exit_code(), 0);
//! # Ok(())
//! # }
//! ```
//!
//! `execute` blocks until the child exits or the supplied
//! [`CancelToken`] fires, in which case the child is killed and
//! [`ExecError::KilledByCancellation`] is returned. `is_running` and
//! `kill` are safe to call from any task at any time; put the
//! supervisor behind an `Arc` to do so while `execute` is in flight.

pub mod cancel;
pub mod errors;
pub mod logging;
pub mod notify;
pub mod sink;
pub mod status;
pub mod supervisor;

pub use cancel::{CancelHandle, CancelToken};
pub use errors::ExecError;
pub use status::{ExitReport, UNKNOWN_EXIT_CODE};
pub use supervisor::{State, Supervisor};
