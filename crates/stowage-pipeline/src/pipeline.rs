//! One-pass composition of chunk stages.
//!
//! `run` drives an upload: source → stages → sink, aborting everything on
//! the first failure and removing the partial file. `StageStream` is the
//! read-side counterpart: it lifts a byte stream plus stages into a new
//! byte stream for downloads. Both consume the source exactly once.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{ready, Stream, StreamExt};

use stowage_core::StorageResult;

use crate::sink::FileSink;
use crate::stage::ChunkStage;

/// Feed `chunks` through `stages[from..]`, collecting the final outputs.
fn cascade<'o>(
    stages: &mut [&mut (dyn ChunkStage + 'o)],
    from: usize,
    chunks: Vec<Bytes>,
    out: &mut Vec<Bytes>,
) -> StorageResult<()> {
    let mut current = chunks;
    for stage in stages[from..].iter_mut() {
        let mut next = Vec::new();
        for chunk in current {
            next.extend(stage.process(chunk)?);
        }
        current = next;
        if current.is_empty() {
            return Ok(());
        }
    }
    out.extend(current);
    Ok(())
}

/// Flush every stage in order; stage i's tail output still traverses
/// stages i+1.. before reaching the caller.
fn cascade_finish<'o>(
    stages: &mut [&mut (dyn ChunkStage + 'o)],
    out: &mut Vec<Bytes>,
) -> StorageResult<()> {
    for i in 0..stages.len() {
        let tail = stages[i].finish()?;
        if !tail.is_empty() {
            cascade(stages, i + 1, tail, out)?;
        }
    }
    Ok(())
}

/// Run one composed pass over `source`, writing the final bytes to `sink`.
///
/// The first error from any point in the chain aborts the pass; the sink's
/// partial file is removed before the error is returned, even when earlier
/// stages had already forwarded bytes into it.
pub async fn run<S>(
    mut source: S,
    stages: &mut [&mut dyn ChunkStage],
    sink: FileSink,
) -> StorageResult<()>
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Unpin,
{
    let mut sink = sink;

    loop {
        let chunk = match source.next().await {
            Some(Ok(chunk)) => chunk,
            Some(Err(err)) => {
                sink.discard().await;
                return Err(err.into());
            }
            None => break,
        };

        let mut out = Vec::new();
        if let Err(err) = cascade(stages, 0, vec![chunk], &mut out) {
            sink.discard().await;
            return Err(err);
        }
        for chunk in &out {
            if let Err(err) = sink.write(chunk).await {
                sink.discard().await;
                return Err(err);
            }
        }
    }

    let mut out = Vec::new();
    if let Err(err) = cascade_finish(stages, &mut out) {
        sink.discard().await;
        return Err(err);
    }
    for chunk in &out {
        if let Err(err) = sink.write(chunk).await {
            sink.discard().await;
            return Err(err);
        }
    }

    sink.finish().await
}

/// A byte stream with chunk stages applied on the fly.
pub struct StageStream<S> {
    source: S,
    stages: Vec<Box<dyn ChunkStage>>,
    queue: VecDeque<Bytes>,
    done: bool,
}

impl<S> StageStream<S> {
    pub fn new(source: S, stages: Vec<Box<dyn ChunkStage>>) -> Self {
        Self {
            source,
            stages,
            queue: VecDeque::new(),
            done: false,
        }
    }

    fn apply(&mut self, chunk: Option<Bytes>) -> StorageResult<()> {
        // Borrowed views so the boxed stages can share the cascade helpers.
        let mut refs: Vec<&mut (dyn ChunkStage + 'static)> =
            self.stages.iter_mut().map(|s| &mut **s).collect();

        let mut out = Vec::new();
        match chunk {
            Some(chunk) => cascade(&mut refs, 0, vec![chunk], &mut out)?,
            None => cascade_finish(&mut refs, &mut out)?,
        }
        self.queue.extend(out);
        Ok(())
    }
}

impl<S> Stream for StageStream<S>
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Unpin,
{
    type Item = StorageResult<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(chunk) = this.queue.pop_front() {
                return Poll::Ready(Some(Ok(chunk)));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match ready!(this.source.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    if let Err(err) = this.apply(Some(chunk)) {
                        this.done = true;
                        return Poll::Ready(Some(Err(err)));
                    }
                }
                Some(Err(err)) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(err.into())));
                }
                None => {
                    this.done = true;
                    if let Err(err) = this.apply(None) {
                        return Poll::Ready(Some(Err(err)));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::StorageError;

    use crate::compress::{GunzipStage, GzipStage};
    use crate::hash::HashSizeStage;
    use crate::sniff::MimeSniffStage;

    fn chunked(data: &[u8], chunk_size: usize) -> Vec<Result<Bytes, std::io::Error>> {
        data.chunks(chunk_size.max(1))
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect()
    }

    fn jpeg_bytes(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        data[..4].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
        data
    }

    #[tokio::test]
    async fn test_run_writes_all_stage_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");

        let payload = jpeg_bytes(2000);
        let source = futures::stream::iter(chunked(&payload, 256));

        let mut sniff = MimeSniffStage::new(100, 256, &["image/jpeg".to_string()]);
        let mut hash = HashSizeStage::new();
        let mut stages: Vec<&mut dyn ChunkStage> = vec![&mut sniff, &mut hash];

        let sink = FileSink::create(&path).await.unwrap();
        run(source, &mut stages, sink).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), payload);
        assert_eq!(hash.size(), 2000);
        assert_eq!(sniff.mimetype(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_failure_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.bin");

        // Undetectable content: classification fails at the end-of-stream
        // flush, after every byte was already forwarded into the sink.
        let payload = vec![0u8; 512];
        let source = futures::stream::iter(chunked(&payload, 128));

        let mut sniff = MimeSniffStage::new(4100, 128, &["image/jpeg".to_string()]);
        let mut stages: Vec<&mut dyn ChunkStage> = vec![&mut sniff];

        let sink = FileSink::create(&path).await.unwrap();
        let err = run(source, &mut stages, sink).await.unwrap_err();

        assert!(matches!(err, StorageError::UnsupportedMimetype { .. }));
        assert!(!path.exists(), "partial file must be removed on failure");
    }

    #[tokio::test]
    async fn test_source_error_aborts_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aborted.bin");

        let source = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"first")),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom")),
        ]);

        let mut hash = HashSizeStage::new();
        let mut stages: Vec<&mut dyn ChunkStage> = vec![&mut hash];

        let sink = FileSink::create(&path).await.unwrap();
        let err = run(source, &mut stages, sink).await.unwrap_err();

        assert!(matches!(err, StorageError::Io(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_finish_tail_traverses_later_stages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tail.gz");

        // The gzip trailer is produced at finish and must still be written.
        let payload = b"finish-tail-data".repeat(64);
        let source = futures::stream::iter(chunked(&payload, 64));

        let mut gzip = GzipStage::new();
        let mut stages: Vec<&mut dyn ChunkStage> = vec![&mut gzip];

        let sink = FileSink::create(&path).await.unwrap();
        run(source, &mut stages, sink).await.unwrap();

        let compressed = std::fs::read(&path).unwrap();
        let mut restored = Vec::new();
        let mut gunzip = GunzipStage::new();
        for chunk in compressed.chunks(100) {
            for b in gunzip.process(Bytes::copy_from_slice(chunk)).unwrap() {
                restored.extend_from_slice(&b);
            }
        }
        for b in gunzip.finish().unwrap() {
            restored.extend_from_slice(&b);
        }
        assert_eq!(restored, payload);
    }

    #[tokio::test]
    async fn test_stage_stream_applies_and_flushes() {
        let payload = b"streamed through stages".repeat(100);

        // Compress eagerly, then decompress through a StageStream.
        let mut gzip = GzipStage::new();
        let mut compressed = Vec::new();
        for chunk in payload.chunks(512) {
            for b in gzip.process(Bytes::copy_from_slice(chunk)).unwrap() {
                compressed.extend_from_slice(&b);
            }
        }
        for b in gzip.finish().unwrap() {
            compressed.extend_from_slice(&b);
        }

        let source = futures::stream::iter(chunked(&compressed, 200));
        let mut stream = StageStream::new(source, vec![Box::new(GunzipStage::new()) as Box<dyn ChunkStage>]);

        let mut restored = Vec::new();
        while let Some(item) = stream.next().await {
            restored.extend_from_slice(&item.unwrap());
        }
        assert_eq!(restored, payload);
    }

    #[tokio::test]
    async fn test_stage_stream_surfaces_errors() {
        let source = futures::stream::iter(chunked(b"not gzip at all", 4));
        let mut stream = StageStream::new(source, vec![Box::new(GunzipStage::new()) as Box<dyn ChunkStage>]);

        let mut saw_error = false;
        while let Some(item) = stream.next().await {
            if item.is_err() {
                saw_error = true;
                break;
            }
        }
        assert!(saw_error);
    }
}
