//! Scan sources: where barcodes come from.
//!
//! A scan source pushes decoded barcodes into a bounded channel handed to
//! it by the bridge. Hardware SDKs wrap their decode callback in a
//! [`ScanSource`]; keyboard-wedge scanners (which "type" each code and
//! press Enter) are covered by [`LineScanSource`].

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Errors a scan source can report when starting.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// `start` was called while the source was already emitting.
    #[error("scan source is already running")]
    AlreadyRunning,

    /// The scanning device could not be initialised.
    #[error("scanner unavailable: {0}")]
    Unavailable(String),
}

/// Produces barcode strings until stopped.
///
/// The sequence is lazy and unbounded; it can be stopped and started again.
/// When the source has nothing more to give (its input ended), it drops
/// the sender, which the bridge treats as the end of the run.
pub trait ScanSource: Send + 'static {
    /// Begins emitting scans into `scans`.
    ///
    /// # Errors
    /// [`ScanError::AlreadyRunning`] if already started, or
    /// [`ScanError::Unavailable`] if the device cannot be used.
    fn start(&mut self, scans: mpsc::Sender<String>) -> Result<(), ScanError>;

    /// Stops emitting. Safe to call when not running.
    fn stop(&mut self);
}

/// A scan source that reads one barcode per line from an async reader.
///
/// Lines are trimmed and blank lines skipped. Each `start` calls the
/// reader factory again, so the source is restartable.
pub struct LineScanSource<F> {
    open: F,
    task: Option<JoinHandle<()>>,
}

impl<F, R> LineScanSource<F>
where
    F: FnMut() -> R + Send + 'static,
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Creates a source that reads from whatever `open` returns.
    pub fn new(open: F) -> Self {
        Self { open, task: None }
    }

    /// Whether a reader task is currently running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl LineScanSource<fn() -> tokio::io::Stdin> {
    /// Reads scans from standard input (keyboard-wedge scanners).
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin)
    }
}

impl<F, R> ScanSource for LineScanSource<F>
where
    F: FnMut() -> R + Send + 'static,
    R: AsyncRead + Unpin + Send + 'static,
{
    fn start(&mut self, scans: mpsc::Sender<String>) -> Result<(), ScanError> {
        if self.is_running() {
            return Err(ScanError::AlreadyRunning);
        }

        let mut lines = BufReader::new((self.open)()).lines();
        self.task = Some(tokio::spawn(async move {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let code = line.trim();
                        if code.is_empty() {
                            continue;
                        }
                        tracing::debug!(%code, "barcode scanned");
                        if scans.send(code.to_owned()).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::debug!("scan input ended");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to read scan input");
                        break;
                    }
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<F> Drop for LineScanSource<F> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn cursor_source(
        input: &'static str,
    ) -> LineScanSource<impl FnMut() -> Cursor<&'static [u8]> + Send + 'static> {
        LineScanSource::new(move || Cursor::new(input.as_bytes()))
    }

    async fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut codes = Vec::new();
        while let Some(code) = rx.recv().await {
            codes.push(code);
        }
        codes
    }

    #[tokio::test]
    async fn test_line_source_emits_trimmed_non_empty_lines() {
        let mut source = cursor_source("012345678905\n\n  4006381333931 \r\nABC-1\n");
        let (tx, mut rx) = mpsc::channel(8);

        source.start(tx).unwrap();

        assert_eq!(
            drain(&mut rx).await,
            ["012345678905", "4006381333931", "ABC-1"]
        );
    }

    #[tokio::test]
    async fn test_line_source_is_restartable() {
        let mut source = cursor_source("1\n2\n");

        let (tx, mut rx) = mpsc::channel(8);
        source.start(tx).unwrap();
        assert_eq!(drain(&mut rx).await, ["1", "2"]);
        source.stop();

        let (tx, mut rx) = mpsc::channel(8);
        source.start(tx).unwrap();
        assert_eq!(drain(&mut rx).await, ["1", "2"]);
    }

    #[tokio::test]
    async fn test_line_source_rejects_double_start() {
        // A reader that never yields keeps the first task alive.
        let (_keep_open, reader) = tokio::io::duplex(64);
        let mut reader = Some(reader);
        let mut source = LineScanSource::new(move || {
            reader.take().unwrap_or_else(|| tokio::io::duplex(64).1)
        });

        let (tx, _rx) = mpsc::channel(8);
        source.start(tx.clone()).unwrap();

        assert!(matches!(source.start(tx), Err(ScanError::AlreadyRunning)));
        assert!(source.is_running());

        source.stop();
        assert!(!source.is_running());
    }
}
