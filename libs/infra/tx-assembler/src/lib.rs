//! C6: transaction-data stream assembler — turns a (txId → offset,size)
//! lookup into an ordered chunk stream, prefetching the next chunk while
//! the current one drains.

use async_trait::async_trait;
use gateway_types::{GatewayError, TxOffset};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;

#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn get_tx_offset(&self, tx_id: &str) -> Result<TxOffset, GatewayError>;
}

/// Fetches the chunk covering an absolute weave offset. Backed by C4 in
/// production; a hand-written double in tests.
#[async_trait]
pub trait ChunkByOffsetSource: Send + Sync {
    async fn get_chunk_at(&self, absolute_offset: u64) -> Result<Vec<u8>, GatewayError>;
}

pub struct TxDataAssembler<C, S> {
    chain: C,
    chunks: S,
}

impl<C, S> TxDataAssembler<C, S>
where
C: ChainSource + 'static,
S: ChunkByOffsetSource + 'static,
{
    pub fn new(chain: C, chunks: S) -> Self {
        Self { chain, chunks }
    }

    /// Produces a lazy, finite byte stream of exactly `size` bytes for
    /// `tx_id`, in ascending offset order. A chunk fetch error or a short
    /// read (EOF before `size` bytes are accounted for) aborts the
    /// stream by surfacing a final `Err` item — it never truncates
    /// silently (§9 open question 3, resolved in favor of `destroy(err)`
    /// semantics).
    pub async fn stream_tx(
        &self,
        tx_id: &str,
    ) -> Result<impl Stream<Item = Result<Vec<u8>, GatewayError>>, GatewayError>
    where
    S: Clone,
    {
        let offset = self.chain.get_tx_offset(tx_id).await?;
        Ok(drive_stream(offset, self.chunks.clone()))
    }
}

/// One buffered chunk of backpressure: the sender's next `send` does not
/// complete until the consumer has taken the previous chunk out of the
/// channel, which is exactly "the current chunk's consumer has accepted
/// at least one byte" translated into channel terms.
fn drive_stream<S>(offset: TxOffset, chunks: S) -> impl Stream<Item = Result<Vec<u8>, GatewayError>>
where
S: ChunkByOffsetSource + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
            let size = offset.size;
            let mut cumulative: u64 = 0;
            let mut absolute = offset.start();

            while cumulative < size {
                match chunks.get_chunk_at(absolute).await {
                    Ok(bytes) if bytes.is_empty() => {
                        let _ = tx
                        .send(Err(GatewayError::IntegrityError(format!(
                                        "short read: got 0 bytes at offset {absolute} with {} of {size} bytes delivered",
                                        cumulative
                        ))))
                        .await;
                        return;
                    }
                    Ok(bytes) => {
                        let remaining = (size - cumulative) as usize;
                        let take = bytes.len().min(remaining);
                        cumulative += take as u64;
                        absolute += take as u64;
                        if tx.send(Ok(bytes[..take].to_vec())).await.is_err() {
                            // Consumer dropped the stream (client disconnect);
                            // any chunk fetch already started completes and
                            // populates the cache regardless.
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
    });
    ReceiverStream::new(rx)
}
