// crates/test-utils/src/sink.rs

//! In-memory byte sink for supervisor tests.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;

/// A cloneable sink whose writes land in a shared buffer.
///
/// Hand [`boxed`](BufferSink::boxed) to the supervisor and read the
/// captured output back through [`contents`](BufferSink::contents)
/// after the run completes.
#[derive(Clone, Default)]
pub struct BufferSink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.buf.lock().unwrap().clone()
    }

    pub fn contents_utf8(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    /// Boxed clone suitable for `Supervisor::stdout` / `stderr`.
    pub fn boxed(&self) -> procwarden::sink::ByteSink {
        Box::new(self.clone())
    }
}

impl AsyncWrite for BufferSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
