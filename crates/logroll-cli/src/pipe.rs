//! Copies newline-delimited input into a sink.

use logroll::{RotatingSink, SinkError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

/// Counters for one pipe run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipeSummary {
    /// Chunks read from the input.
    pub chunks: u64,
    /// Bytes read from the input.
    pub bytes: u64,
    /// Chunks the sink failed to write.
    pub failed: u64,
}

/// Reads `input` until EOF and writes each newline-terminated chunk to `sink`.
///
/// A trailing chunk without a newline is written as is. Write failures are
/// logged and counted; the pipe stops early only if the sink is closed.
/// When `tee` is set every chunk is also copied to it.
///
/// # Errors
///
/// Returns an error if reading `input` or writing `tee` fails.
pub async fn pipe<R, W>(
    input: R,
    sink: &RotatingSink,
    mut tee: Option<W>,
) -> std::io::Result<PipeSummary>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(input);
    let mut summary = PipeSummary::default();
    let mut chunk = Vec::new();

    loop {
        let read = reader.read_until(b'\n', &mut chunk).await?;
        if read == 0 {
            break;
        }
        summary.chunks += 1;
        summary.bytes += read as u64;

        if let Some(out) = tee.as_mut() {
            out.write_all(&chunk).await?;
        }

        match sink.write(std::mem::take(&mut chunk)).await {
            Ok(()) => {}
            Err(SinkError::Closed) => {
                warn!(path = %sink.path().display(), "sink closed, stopping");
                break;
            }
            Err(e) => {
                summary.failed += 1;
                warn!(error = %e, "dropped chunk");
            }
        }
    }

    if let Some(out) = tee.as_mut() {
        out.flush().await?;
    }
    debug!(
        chunks = summary.chunks,
        bytes = summary.bytes,
        failed = summary.failed,
        "input drained"
    );
    Ok(summary)
}
