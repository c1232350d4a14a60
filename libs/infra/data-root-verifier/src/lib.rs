//! C9: periodic data-root verification worker wrapping the pure Merkle
//! computation in `gateway-merkle`.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use gateway_merkle::StreamingDataRoot;
use gateway_types::{Digest32, GatewayError};
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{instrument, warn};

pub type DataStream = Pin<Box<dyn Stream<Item = Result<Bytes, GatewayError>> + Send>>;

/// The root-tx-id index (spec GLOSSARY "Data Index").
#[async_trait]
pub trait VerificationIndex: Send + Sync {
    async fn verifiable_ids(&self, limit: usize) -> Result<Vec<Digest32>, GatewayError>;
    async fn expected_root(&self, id: &Digest32) -> Result<Digest32, GatewayError>;
    async fn save_verification_status(&self, id: &Digest32, verified: bool);
    async fn increment_retry_count(&self, id: &Digest32);
}

#[async_trait]
pub trait DataStreamSource: Send + Sync {
    async fn stream_data(&self, id: &Digest32) -> Result<DataStream, GatewayError>;
}

/// Requests a re-download from raw chunks on a mismatch, if such an
/// upstream import path is configured.
#[async_trait]
pub trait RawChunkReimporter: Send + Sync {
    async fn enqueue_reimport(&self, id: &Digest32);
}

pub struct VerifierConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub max_concurrent: usize,
    pub idle_timeout: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            batch_size: 50,
            max_concurrent: 8,
            idle_timeout: Duration::from_secs(30),
        }
    }
}

pub struct DataRootVerifier<I, D, R> {
    index: Arc<I>,
    data: Arc<D>,
    reimporter: Arc<R>,
    config: VerifierConfig,
    in_flight: Mutex<HashSet<Digest32>>,
}

impl<I, D, R> DataRootVerifier<I, D, R>
where
I: VerificationIndex + 'static,
D: DataStreamSource + 'static,
R: RawChunkReimporter + 'static,
{
    pub fn new(index: Arc<I>, data: Arc<D>, reimporter: Arc<R>, config: VerifierConfig) -> Arc<Self> {
        Arc::new(Self {
                index,
                data,
                reimporter,
                config,
                in_flight: Mutex::new(HashSet::new()),
        })
    }

    /// Runs the periodic pull-and-verify loop until the returned handle
    /// is dropped or aborted.
    pub fn spawn(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
                let mut ticker = tokio::time::interval(this.config.poll_interval);
                loop {
                    ticker.tick().await;
                    this.poll_once().await;
                }
        })
    }

    #[instrument(skip(self))]
    async fn poll_once(self: &Arc<Self>) {
        let ids = match self.index.verifiable_ids(self.config.batch_size).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "failed to list verifiable ids");
                return;
            }
        };

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut handles = Vec::new();
        for id in ids {
            let already_queued = {
                let mut in_flight = self.in_flight.lock().unwrap();
                !in_flight.insert(id)
            };
            if already_queued {
                continue;
            }
            let this = self.clone();
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
            handles.push(tokio::spawn(async move {
                        let _permit = permit;
                        this.verify_one(id).await;
                        this.in_flight.lock().unwrap().remove(&id);
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn verify_one(self: &Arc<Self>, id: Digest32) {
        self.index.increment_retry_count(&id).await;

        let expected_root = match self.index.expected_root(&id).await {
            Ok(root) => root,
            Err(e) => {
                warn!(error = %e, "could not read expected root, skipping");
                return;
            }
        };

        let mut stream = match self.data.stream_data(&id).await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "transient failure fetching data stream");
                return;
            }
        };

        let mut accumulator = StreamingDataRoot::new();
        loop {
            match tokio::time::timeout(self.config.idle_timeout, stream.next()).await {
                Ok(Some(Ok(chunk))) => accumulator.push_chunk(&chunk),
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "stream error during data-root verification");
                    return;
                }
                Ok(None) => break,
                Err(_elapsed) => {
                    warn!("idle timeout while streaming data for verification");
                    return;
                }
            }
        }

        let computed_root = match accumulator.finalize() {
            Ok(root) => root,
            Err(_) => Digest32::from_bytes([0u8; 32]), // empty stream: treated as a zero root below
        };

        if gateway_merkle::roots_match(&computed_root, &expected_root) {
            self.index.save_verification_status(&id, true).await;
        } else {
            self.index.save_verification_status(&id, false).await;
            self.reimporter.enqueue_reimport(&id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as TokioMutex;

    struct FakeIndex {
        ids: Vec<Digest32>,
        roots: std::collections::HashMap<[u8; 32], Digest32>,
        verified: TokioMutex<Vec<(Digest32, bool)>>,
        retries: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl VerificationIndex for FakeIndex {
        async fn verifiable_ids(&self, _limit: usize) -> Result<Vec<Digest32>, GatewayError> {
            Ok(self.ids.clone())
        }

        async fn expected_root(&self, id: &Digest32) -> Result<Digest32, GatewayError> {
            self.roots.get(id.as_bytes()).cloned().ok_or(GatewayError::NotFound)
        }

        async fn save_verification_status(&self, id: &Digest32, verified: bool) {
            self.verified.lock().await.push((*id, verified));
        }

        async fn increment_retry_count(&self, _id: &Digest32) {
            self.retries.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeData {
        chunks: Vec<Bytes>,
    }

    #[async_trait]
    impl DataStreamSource for FakeData {
        async fn stream_data(&self, _id: &Digest32) -> Result<DataStream, GatewayError> {
            let items: Vec<Result<Bytes, GatewayError>> = self.chunks.iter().cloned().map(Ok).collect();
            Ok(Box::pin(stream::iter(items)))
        }
    }

    struct CountingReimporter {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RawChunkReimporter for CountingReimporter {
        async fn enqueue_reimport(&self, _id: &Digest32) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn matching_root_marks_verified_without_reimport() {
        let data = b"hello data root verifier";
        let root = gateway_merkle::compute_data_root(data);
        let id = Digest32::from_bytes([1u8; 32]);

        let mut roots = std::collections::HashMap::new();
        roots.insert(*id.as_bytes(), root);
        let index = Arc::new(FakeIndex {
                ids: vec![id],
                roots,
                verified: TokioMutex::new(Vec::new()),
                retries: Arc::new(AtomicUsize::new(0)),
        });
        let data_source = Arc::new(FakeData {
                chunks: vec![Bytes::from_static(data)],
        });
        let reimport_count = Arc::new(AtomicUsize::new(0));
        let reimporter = Arc::new(CountingReimporter { count: reimport_count.clone() });

        let verifier = DataRootVerifier::new(index.clone(), data_source, reimporter, VerifierConfig::default());
        verifier.poll_once().await;

        let verified = index.verified.lock().await;
        assert_eq!(*verified, vec![(id, true)]);
        assert_eq!(reimport_count.load(Ordering::SeqCst), 0);
        assert_eq!(index.retries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mismatched_root_triggers_reimport() {
        let id = Digest32::from_bytes([2u8; 32]);
        let mut roots = std::collections::HashMap::new();
        roots.insert(*id.as_bytes(), gateway_merkle::compute_data_root(b"expected"));
        let index = Arc::new(FakeIndex {
                ids: vec![id],
                roots,
                verified: TokioMutex::new(Vec::new()),
                retries: Arc::new(AtomicUsize::new(0)),
        });
        let data_source = Arc::new(FakeData {
                chunks: vec![Bytes::from_static(b"actual-bytes-differ")],
        });
        let reimport_count = Arc::new(AtomicUsize::new(0));
        let reimporter = Arc::new(CountingReimporter { count: reimport_count.clone() });

        let verifier = DataRootVerifier::new(index.clone(), data_source, reimporter, VerifierConfig::default());
        verifier.poll_once().await;

        let verified = index.verified.lock().await;
        assert_eq!(*verified, vec![(id, false)]);
        assert_eq!(reimport_count.load(Ordering::SeqCst), 1);
    }
}
