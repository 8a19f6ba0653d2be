use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::{
    progress::{ProgressFactory, ProgressReporter},
    transport::TransportError,
    ClientConfig,
};

/// Opens a reporter only when progress is enabled and the declared size
/// reaches the configured threshold.
pub(crate) fn progress_gate(
    config: &ClientConfig,
    factory: &dyn ProgressFactory,
    total: u64,
    label: &str,
) -> Option<Box<dyn ProgressReporter>> {
    if config.show_progress && total >= config.min_progress_size {
        Some(factory.create(total, label))
    } else {
        None
    }
}

/// Reads `body` to the end in pieces of at most `chunk_size` bytes.
///
/// Every non-empty piece is appended to the returned buffer and its length is
/// forwarded to `progress`, which is finished once the stream is exhausted
/// and abandoned if the stream fails. The buffer is the same whether or not a
/// reporter is attached.
pub(crate) async fn read_body<S>(
    mut body: S,
    chunk_size: usize,
    mut progress: Option<Box<dyn ProgressReporter>>,
) -> Result<Bytes, TransportError>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    let chunk_size = chunk_size.max(1);
    let mut content = Vec::new();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                if let Some(reporter) = progress {
                    reporter.abandon();
                }
                return Err(err);
            }
        };
        for piece in chunk.chunks(chunk_size) {
            if piece.is_empty() {
                continue;
            }
            content.extend_from_slice(piece);
            if let Some(reporter) = progress.as_mut() {
                reporter.advance(piece.len() as u64);
            }
        }
    }

    if let Some(reporter) = progress {
        reporter.finish();
    }

    Ok(Bytes::from(content))
}
