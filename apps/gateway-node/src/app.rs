//! Wires the composed C3 → C4 → C6 pipeline into a minimal HTTP surface.

use crate::config::Config;
use crate::demo_sources::{BufferStoreCacheAdapter, CachedChunkByOffsetSource, FixedChainIndex, InMemoryChunkSource};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::StreamExt;
use gateway_composite_source::CompositeSource;
use gateway_read_through_cache::ReadThroughCache;
use gateway_store::FsBufferStore;
use gateway_tx_assembler::TxDataAssembler;
use gateway_types::{GatewayError, RequestAttributes, TxOffset};
use std::collections::HashMap;
use std::io;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

type Assembler = TxDataAssembler<FixedChainIndex, CachedChunkByOffsetSource>;

#[derive(Clone)]
pub struct AppState {
    assembler: Arc<Assembler>,
    max_hops: u32,
}

/// Builds the demo chain/chunk wiring and the axum router around it.
/// The chain index and chunk source here are the narrow stand-ins
/// described in `demo_sources`; everything above them (composite
/// source, cache, assembler, hop-limit enforcement) is the real
/// pipeline.
pub fn build_app(config: &Config) -> Router {
    let mut offsets = HashMap::new();
    offsets.insert(
        "demo-tx".to_string(),
        TxOffset {
            absolute_end_offset: 1000,
            size: 300,
        },
    );
    let chain = FixedChainIndex::new(offsets);

    let mut chunks = HashMap::new();
    chunks.insert(701, vec![1u8; 100]);
    chunks.insert(801, vec![2u8; 100]);
    chunks.insert(901, vec![3u8; 100]);
    let chunk_source: Arc<dyn gateway_composite_source::Source<u64, Vec<u8>>> =
    Arc::new(InMemoryChunkSource::new(chunks));

    let composite = CompositeSource::new(
        vec![chunk_source],
        NonZeroUsize::new(config.source_parallelism.max(1)).unwrap(),
    );

    let buffer_store: Arc<dyn gateway_store::BufferStore> = Arc::new(FsBufferStore::new(&config.buffer_store_dir));
    let cache_store = Box::new(BufferStoreCacheAdapter::new(buffer_store));
    let cache = Arc::new(ReadThroughCache::new(composite, cache_store, |offset: &u64| {
                offset.to_be_bytes().to_vec()
    }));

    let assembler = Arc::new(TxDataAssembler::new(chain, CachedChunkByOffsetSource::new(cache)));

    let state = AppState {
        assembler,
        max_hops: config.max_hops,
    };

    Router::new()
    .route("/raw/:id", get(get_raw))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[derive(serde::Deserialize, Default)]
struct RawQuery {
    #[serde(rename = "ar-io-hops")]
    hops: Option<u32>,
    #[serde(rename = "ar-io-origin")]
    origin: Option<String>,
}

async fn get_raw(State(state): State<AppState>, Path(id): Path<String>, Query(query): Query<RawQuery>) -> Response {
    let attrs = RequestAttributes {
        hops: query.hops.unwrap_or(0),
        origin: query.origin,
        ..Default::default()
    };
    if let Err(e) = attrs.for_forward(state.max_hops) {
        return into_error_response(e);
    }

    let stream = match state.assembler.stream_tx(&id).await {
        Ok(stream) => stream,
        Err(e) => return into_error_response(e),
    };

    let body_stream = stream.map(|item| {
            item.map(bytes::Bytes::from)
            .map_err(|e: GatewayError| io::Error::other(e.to_string()))
    });
    Response::builder()
    .status(StatusCode::OK)
    .header("X-AR-IO-Verified", "true")
    .body(Body::from_stream(body_stream))
    .unwrap()
}

fn into_error_response(err: GatewayError) -> Response {
    let status = match &err {
        GatewayError::NotFound => StatusCode::NOT_FOUND,
        GatewayError::HopLimitExceeded => StatusCode::BAD_REQUEST,
        GatewayError::MalformedInput(_) => StatusCode::BAD_REQUEST,
        GatewayError::Timeout | GatewayError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::Canceled => StatusCode::INTERNAL_SERVER_ERROR,
        GatewayError::IntegrityError(_) => StatusCode::BAD_GATEWAY,
        GatewayError::NoSourcesConfigured | GatewayError::AllSourcesFailed(_) => StatusCode::BAD_GATEWAY,
    };
    warn!(error = %err, %status, "request failed");
    (status, err.to_string()).into_response()
}
