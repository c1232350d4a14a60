//! C3: composite source dispatcher — races/falls back across an ordered
//! list of sources with bounded parallelism, first validated success
//! wins.

use async_trait::async_trait;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use gateway_types::{GatewayError, SourceFailure};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{instrument, warn};

/// A single child source. `params` is the opaque lookup descriptor
/// (e.g. a chunk key, or an absolute offset).
#[async_trait]
pub trait Source<P, V>: Send + Sync
where
P: Send + Sync,
V: Send,
{
    async fn get(&self, params: &P) -> Result<V, GatewayError>;

    fn name(&self) -> &str;
}

type AttemptOutcome<V> = (usize, String, Result<V, GatewayError>);

pub struct CompositeSource<P, V> {
    sources: Vec<Arc<dyn Source<P, V>>>,
    parallelism: NonZeroUsize,
}

impl<P, V> CompositeSource<P, V>
where
P: Clone + Send + Sync + 'static,
V: Send + 'static,
{
    pub fn new(sources: Vec<Arc<dyn Source<P, V>>>, parallelism: NonZeroUsize) -> Self {
        Self {
            sources,
            parallelism,
        }
    }

    /// Sequential, single-source-at-a-time composite.
    pub fn sequential(sources: Vec<Arc<dyn Source<P, V>>>) -> Self {
        Self::new(sources, NonZeroUsize::new(1).unwrap())
    }

    fn spawn_attempt(
        &self,
        index: usize,
        params: &P,
        in_flight: &mut FuturesUnordered<tokio::task::JoinHandle<AttemptOutcome<V>>>,
    ) {
        let source = self.sources[index].clone();
        let params = params.clone();
        in_flight.push(tokio::spawn(async move {
                    let name = source.name().to_string();
                    let result = source.get(&params).await;
                    (index, name, result)
        }));
    }

    #[instrument(skip(self, params), fields(sources = self.sources.len()))]
    pub async fn get(&self, params: &P) -> Result<V, GatewayError> {
        let total = self.sources.len();
        if total == 0 {
            return Err(GatewayError::NoSourcesConfigured);
        }

        let mut in_flight: FuturesUnordered<tokio::task::JoinHandle<AttemptOutcome<V>>> =
        FuturesUnordered::new();
        let mut next_index = 0usize;
        let mut failures: Vec<Option<SourceFailure>> = vec![None; total];

        while next_index < total && in_flight.len() < self.parallelism.get() {
            self.spawn_attempt(next_index, params, &mut in_flight);
            next_index += 1;
        }

        // Dropping `in_flight` below (on early return, or at the end of
        // this loop's last iteration) detaches any still-running
        // `tokio::spawn` tasks rather than aborting them: they keep
        // running to completion in the background and their results are
        // simply never observed, matching "allowed to complete".
        while let Some(joined) = in_flight.next().await {
            let (index, name, result) = match joined {
                Ok(triple) => triple,
                Err(join_err) => {
                    warn!(error = %join_err, "composite source task join error");
                    continue;
                }
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    failures[index] = Some(SourceFailure {
                            source_name: name,
                            kind: err.kind_name().to_string(),
                            message: err.to_string(),
                    });
                    if next_index < total {
                        self.spawn_attempt(next_index, params, &mut in_flight);
                        next_index += 1;
                    }
                }
            }
        }

        Err(GatewayError::AllSourcesFailed(
                failures.into_iter().flatten().collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    struct FakeSource {
        name: &'static str,
        delay_ms: u64,
        outcome: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl Source<(), String> for FakeSource {
        async fn get(&self, _params: &()) -> Result<String, GatewayError> {
            sleep(Duration::from_millis(self.delay_ms)).await;
            self.outcome
            .map(|s| s.to_string())
            .map_err(|e| GatewayError::Unavailable(e.to_string()))
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn source(name: &'static str, delay_ms: u64, outcome: Result<&'static str, &'static str>) -> Arc<dyn Source<(), String>> {
        Arc::new(FakeSource {
                name,
                delay_ms,
                outcome,
        })
    }

    #[tokio::test]
    async fn no_sources_configured() {
        let composite: CompositeSource<(), String> = CompositeSource::sequential(vec![]);
        assert!(matches!(
                composite.get(&()).await,
                Err(GatewayError::NoSourcesConfigured)
        ));
    }

    #[tokio::test]
    async fn s1_sequential_first_fail_second_succeeds() {
        let composite = CompositeSource::sequential(vec![
                source("A", 0, Err("boom")),
                source("B", 0, Ok("x")),
        ]);
        let result = composite.get(&()).await.unwrap();
        assert_eq!(result, "x");
    }

    #[tokio::test]
    async fn s2_parallel_three_returns_fastest_success() {
        let composite = CompositeSource::new(
            vec![
                source("A", 50, Ok("a")),
                source("B", 10, Ok("b")),
                source("C", 100, Ok("c")),
            ],
            NonZeroUsize::new(3).unwrap(),
        );
        let result = composite.get(&()).await.unwrap();
        assert_eq!(result, "b");
    }

    #[tokio::test]
    async fn s3_ten_sources_tenth_succeeds_bounded_parallelism() {
        let mut sources = Vec::new();
        for i in 0..9 {
            sources.push(source(
                    Box::leak(format!("fail-{i}").into_boxed_str()),
                    10,
                    Err("no"),
            ));
        }
        sources.push(source("winner", 10, Ok("tenth")));
        let composite = CompositeSource::new(sources, NonZeroUsize::new(3).unwrap());
        let result = composite.get(&()).await.unwrap();
        assert_eq!(result, "tenth");
    }

    #[tokio::test]
    async fn exhaustion_reports_all_errors_in_attempt_order() {
        let composite = CompositeSource::sequential(vec![
                source("A", 0, Err("fail-a")),
                source("B", 0, Err("fail-b")),
        ]);
        let err = composite.get(&()).await.unwrap_err();
        match err {
            GatewayError::AllSourcesFailed(failures) => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].source_name, "A");
                assert_eq!(failures[1].source_name, "B");
            }
            other => panic!("expected AllSourcesFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_new_attempt_after_success_is_observed() {
        // A fast winner at position 0 with parallelism 1: source B must
        // never be attempted.
        let attempted_b = Arc::new(std::sync::atomic::AtomicBool::new(false));
        struct Tracking {
            flag: Arc<std::sync::atomic::AtomicBool>,
        }
        #[async_trait]
        impl Source<(), String> for Tracking {
            async fn get(&self, _: &()) -> Result<String, GatewayError> {
                self.flag.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok("should-not-run".into())
            }
            fn name(&self) -> &str {
                "B"
            }
        }
        let composite = CompositeSource::sequential(vec![
                source("A", 0, Ok("a")),
                Arc::new(Tracking {
                        flag: attempted_b.clone(),
                }),
        ]);
        let result = composite.get(&()).await.unwrap();
        assert_eq!(result, "a");
        assert!(!attempted_b.load(std::sync::atomic::Ordering::SeqCst));
    }
}
