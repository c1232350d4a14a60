//! The two bounded unbundler stages: Data Importer and
//! Parser/Unbundler, each a priority-aware bounded worker pool.

use crate::parse::{b64url, parse_and_verify_item, read_bundle_header};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use gateway_types::{Digest32, GatewayError, UnbundleEvent};
use std::pin::Pin;
use std::sync::Arc;
use tempfile::Builder as TempFileBuilder;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tracing::{instrument, warn};

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, GatewayError>> + Send>>;

#[async_trait]
pub trait BundleByteSource: Send + Sync {
    async fn stream_bundle(&self, id: &Digest32) -> Result<ByteStream, GatewayError>;
}

pub trait ItemFilter: Send + Sync {
    fn matches(&self, item: &gateway_types::DataItem) -> bool;
}

pub struct AcceptAllFilter;

impl ItemFilter for AcceptAllFilter {
    fn matches(&self, _item: &gateway_types::DataItem) -> bool {
        true
    }
}

#[derive(Clone)]
pub struct QueueItem {
    pub bundle_id: Digest32,
    pub index: Option<u32>,
    pub bypass_filter: bool,
}

/// Stage A: downloads each queued item's bytes end-to-end, forwarding
/// anything carrying an `index` on to Stage B.
pub struct DataImporter<B> {
    _source: std::marker::PhantomData<B>,
    high: mpsc::Sender<QueueItem>,
    normal: mpsc::Sender<QueueItem>,
}

impl<B> DataImporter<B>
where
B: BundleByteSource + 'static,
{
    pub fn spawn(source: Arc<B>, queue_capacity: usize, to_parser: mpsc::Sender<QueueItem>) -> Self {
        let (high_tx, mut high_rx) = mpsc::channel::<QueueItem>(queue_capacity);
        let (normal_tx, mut normal_rx) = mpsc::channel::<QueueItem>(queue_capacity);

        let worker_source = source.clone();
        tokio::spawn(async move {
                loop {
                    let item = tokio::select! {
                        biased;
                        Some(item) = high_rx.recv() => item,
                        Some(item) = normal_rx.recv() => item,
                        else => break,
                    };
                    download_one(&*worker_source, &item, &to_parser).await;
                }
        });

        Self {
            _source: std::marker::PhantomData,
            high: high_tx,
            normal: normal_tx,
        }
    }

    /// `queue(item, prioritized, bypass_filter)`: pushes to
    /// the tail of the normal queue, or the head (front) of the
    /// priority queue when `prioritized`.
    pub async fn queue(&self, item: QueueItem, prioritized: bool) -> Result<(), GatewayError> {
        let sender = if prioritized { &self.high } else { &self.normal };
        sender.send(item).await.map_err(|_| GatewayError::Canceled)
    }
}

#[instrument(skip(source, to_parser), fields(bundle_id = %item.bundle_id))]
async fn download_one<B: BundleByteSource>(source: &B, item: &QueueItem, to_parser: &mpsc::Sender<QueueItem>) {
    use futures::StreamExt;
    let stream = match source.stream_bundle(&item.bundle_id).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "bundle download failed, dropping item");
            return;
        }
    };
    let mut stream = stream;
    while let Some(chunk) = stream.next().await {
        if let Err(e) = chunk {
            warn!(error = %e, "bundle stream error, dropping item");
            return;
        }
    }
    if item.index.is_some() {
        let _ = to_parser.send(item.clone()).await;
    }
}

/// Stage B: one bundle parses at a time.
pub struct BundleParser<B> {
    source: Arc<B>,
    filter: Arc<dyn ItemFilter>,
    parse_slot: Mutex<()>,
    events: mpsc::Sender<UnbundleEvent>,
}

impl<B> BundleParser<B>
where
B: BundleByteSource + 'static,
{
    pub fn new(source: Arc<B>, filter: Arc<dyn ItemFilter>, events: mpsc::Sender<UnbundleEvent>) -> Self {
        Self {
            source,
            filter,
            parse_slot: Mutex::new(()),
            events,
        }
    }

    #[instrument(skip(self), fields(bundle_id = %bundle_id))]
    pub async fn parse_bundle(&self, bundle_id: Digest32, bypass_filter: bool) -> Result<(), GatewayError> {
        let _slot = self.parse_slot.lock().await;

        let temp_file = TempFileBuilder::new()
        .prefix("ans104-bundle-")
        .tempfile()
        .map_err(|e| GatewayError::Unavailable(format!("temp file: {e}")))?;
        let path = temp_file.path().to_path_buf();

        let result = self.parse_bundle_inner(&bundle_id, &path, bypass_filter).await;

        // `TempFileBuilder::tempfile()` already removes the file on
        // drop, but we drop it explicitly here so it is gone before the
        // slot is released for the next bundle, matching "temp file
        // removed on all exit paths".
        drop(temp_file);

        match &result {
            Ok((item_count, matched_count)) => {
                let _ = self
                .events
                .send(UnbundleEvent::UnbundleComplete {
                        bundle_id,
                        item_count: *item_count,
                        matched_item_count: *matched_count,
                })
                .await;
            }
            Err(e) => {
                let _ = self
                .events
                .send(UnbundleEvent::UnbundleError {
                        bundle_id,
                        message: e.to_string(),
                })
                .await;
            }
        }
        result.map(|_| ())
    }

    async fn parse_bundle_inner(
        &self,
        bundle_id: &Digest32,
        temp_path: &std::path::Path,
        bypass_filter: bool,
    ) -> Result<(usize, usize), GatewayError> {
        use futures::StreamExt;

        let mut file = tokio::fs::File::create(temp_path)
        .await
        .map_err(|e| GatewayError::Unavailable(format!("temp file create: {e}")))?;
        let mut stream = self.source.stream_bundle(bundle_id).await?;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
            .await
            .map_err(|e| GatewayError::Unavailable(format!("temp file write: {e}")))?;
        }
        file.flush().await.map_err(|e| GatewayError::Unavailable(format!("temp file flush: {e}")))?;
        drop(file);

        let mut file = tokio::fs::File::open(temp_path)
        .await
        .map_err(|e| GatewayError::Unavailable(format!("temp file reopen: {e}")))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
        .await
        .map_err(|e| GatewayError::Unavailable(format!("temp file read: {e}")))?;

        let header = read_bundle_header(&buf)?;
        let item_count = header.entries.len();
        let mut matched_count = 0;
        let mut cursor = header.header_len;
        let mut first_error = None;

        for (index, (length, expected_id)) in header.entries.iter().enumerate() {
            let end = cursor + length;
            if buf.len() < end {
                first_error = Some(GatewayError::MalformedInput("item body shorter than declared length".into()));
                break;
            }
            let item_bytes = &buf[cursor..end];
            cursor = end;

            match parse_and_verify_item(item_bytes, *expected_id, *bundle_id, *bundle_id, Some(index as u32)) {
                Ok(item) => {
                    if bypass_filter || self.filter.matches(&item) {
                        matched_count += 1;
                        let _ = self.events.send(UnbundleEvent::DataItemMatched(Box::new(item))).await;
                    }
                }
                Err(e) => {
                    // Only the caller (`parse_bundle`) emits an `UnbundleError`
                    // event, once, for whichever error is ultimately returned;
                    // emitting one here too would double-report this item.
                    if first_error.is_none() {
                        first_error = Some(prefix_item_error(index, e));
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        Ok((item_count, matched_count))
    }
}

/// Prefixes a per-item parse/verify error with its index, preserving
/// the original error's kind so `IntegrityError` (e.g. `IdMismatch`,
/// `BadSignature`) is not masked as a generic `MalformedInput` or vice
/// versa.
fn prefix_item_error(index: usize, e: GatewayError) -> GatewayError {
    match e {
        GatewayError::IntegrityError(msg) => GatewayError::IntegrityError(format!("item {index}: {msg}")),
        GatewayError::MalformedInput(msg) => GatewayError::MalformedInput(format!("item {index}: {msg}")),
        GatewayError::Unavailable(msg) => GatewayError::Unavailable(format!("item {index}: {msg}")),
        other => other,
    }
}

/// Normalizes a data item's binary identifiers into their base64url
/// form for downstream consumers.
pub fn normalized_ids(item: &gateway_types::DataItem) -> (String, String, String) {
    (
        item.id.to_b64url(),
        item.parent_id.to_b64url(),
        b64url(item.owner.as_slice()),
    )
}
