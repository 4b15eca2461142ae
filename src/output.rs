//! Buffered capture of a child process's stdout and stderr.
//!
//! Each stream is drained by its own tokio task into one shared buffer, so
//! the buffer holds both streams interleaved in arrival order. Reads return
//! whatever has been flushed so far; the process may still be writing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::debug;

/// Largest amount of output kept per process.
const MAX_CAPTURE_BYTES: usize = 256 * 1024;

/// Shared output buffer fed by background reader tasks.
#[derive(Debug)]
pub struct OutputCollector {
    buffer: Arc<Mutex<Vec<u8>>>,
    open_streams: Arc<AtomicUsize>,
    readers: Vec<JoinHandle<()>>,
}

impl OutputCollector {
    /// Create a collector with no attached streams.
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
            open_streams: Arc::new(AtomicUsize::new(0)),
            readers: Vec::new(),
        }
    }

    /// Start draining `stream` into the shared buffer.
    pub fn attach<R>(&mut self, label: &'static str, stream: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::clone(&self.buffer);
        let open = Arc::clone(&self.open_streams);
        open.fetch_add(1, Ordering::SeqCst);

        self.readers.push(tokio::spawn(async move {
            drain(label, stream, buffer).await;
            // detach() may already have zeroed the count.
            let _ = open.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        }));
    }

    /// Everything captured so far, decoded lossily as UTF-8.
    pub fn snapshot(&self) -> String {
        match self.buffer.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }

    /// True once every attached stream has reached end of file.
    pub fn is_closed(&self) -> bool {
        self.open_streams.load(Ordering::SeqCst) == 0
    }

    /// Stop the reader tasks. Already captured output stays readable and
    /// the collector reports itself closed.
    pub fn detach(&mut self) {
        for reader in self.readers.drain(..) {
            reader.abort();
        }
        self.open_streams.store(0, Ordering::SeqCst);
    }
}

impl Default for OutputCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OutputCollector {
    fn drop(&mut self) {
        self.detach();
    }
}

async fn drain<R>(label: &'static str, mut stream: R, buffer: Arc<Mutex<Vec<u8>>>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                debug!(target: "tunnelup::output", stream = label, bytes = n, "captured output");
                let mut buf = match buffer.lock() {
                    Ok(buf) => buf,
                    Err(poisoned) => poisoned.into_inner(),
                };
                let room = MAX_CAPTURE_BYTES.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) => {
                debug!(target: "tunnelup::output", stream = label, "read failed: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_closed(collector: &OutputCollector) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !collector.is_closed() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_empty_collector() {
        let collector = OutputCollector::new();
        assert_eq!(collector.snapshot(), "");
        assert!(collector.is_closed());
    }

    #[tokio::test]
    async fn test_collects_both_streams() {
        let mut collector = OutputCollector::new();
        collector.attach("stdout", &b"your url is: "[..]);
        wait_closed(&collector).await;
        collector.attach("stderr", &b"https://a.loca.lt\n"[..]);
        wait_closed(&collector).await;
        assert_eq!(collector.snapshot(), "your url is: https://a.loca.lt\n");
    }

    #[tokio::test]
    async fn test_partial_reads_visible_before_close() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut collector = OutputCollector::new();
        collector.attach("stdout", reader);

        use tokio::io::AsyncWriteExt;
        writer.write_all(b"starting...\n").await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while collector.snapshot().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(collector.snapshot(), "starting...\n");
        assert!(!collector.is_closed());

        drop(writer);
        wait_closed(&collector).await;
    }

    #[tokio::test]
    async fn test_detach_keeps_captured_output() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut collector = OutputCollector::new();
        collector.attach("stdout", reader);

        use tokio::io::AsyncWriteExt;
        writer.write_all(b"kept").await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while collector.snapshot().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert!(!collector.is_closed());
        collector.detach();
        assert_eq!(collector.snapshot(), "kept");
        assert!(collector.is_closed());

        // The writer end is still open; closing it later must not disturb
        // the count.
        drop(writer);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(collector.is_closed());
    }
}
