// src/sink.rs

//! Caller-supplied byte stream plumbing.
//!
//! The OS process API only accepts `Stdio` endpoints, so arbitrary
//! caller sinks are served by piping the child's streams and pumping
//! them across in background tasks, the same way stdout/stderr
//! consumers are spawned around each child elsewhere in the crate.
//!
//! When stderr has no sink of its own it shares the stdout sink, which
//! is why pumps write through a locked [`SharedSink`].

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::ChildStdin;
use tokio::sync::Mutex;
use tracing::debug;

/// Byte source feeding the child's stdin.
pub type ByteSource = Box<dyn AsyncRead + Send + Unpin>;

/// Byte sink receiving the child's stdout or stderr.
pub type ByteSink = Box<dyn AsyncWrite + Send + Unpin>;

pub(crate) type SharedSink = Arc<Mutex<ByteSink>>;

/// Copy a child pipe into the shared sink until EOF.
///
/// Read and write failures stop the pump quietly; the child's exit
/// status is the supervisor's concern, not the sink's health.
pub(crate) async fn pump(
    stream: &'static str,
    mut reader: impl AsyncRead + Unpin,
    sink: SharedSink,
) {
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let mut writer = sink.lock().await;
                if let Err(e) = writer.write_all(&buf[..n]).await {
                    debug!(stream, error = %e, "sink write failed; stopping pump");
                    return;
                }
            }
            Err(e) => {
                debug!(stream, error = %e, "pipe read failed; stopping pump");
                return;
            }
        }
    }

    let mut writer = sink.lock().await;
    let _ = writer.flush().await;
    debug!(stream, "pump finished");
}

/// Feed the child's stdin from the caller's source, then close the pipe.
pub(crate) async fn feed_stdin(mut source: ByteSource, mut stdin: ChildStdin) {
    if let Err(e) = tokio::io::copy(&mut source, &mut stdin).await {
        debug!(error = %e, "stdin feed ended with error");
    }
    // Dropping the handle closes the child's stdin.
}
