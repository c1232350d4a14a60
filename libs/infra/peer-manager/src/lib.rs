//! C5: peer manager — ordered set of peers with per-category weights
//! updated from observed throughput, TTFB, and failures.

use gateway_types::{Peer, PeerCategory};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug)]
pub struct PeerManagerConfig {
    pub w_min: f64,
    pub w_max: f64,
    pub w_initial: f64,
    /// Fraction of the remaining distance to `w_max` closed on success.
    pub success_step: f64,
    /// Multiplicative decay toward `w_min` on failure.
    pub failure_decay: f64,
    /// EMA smoothing factor for latency/TTFB.
    pub ema_alpha: f64,
}

impl Default for PeerManagerConfig {
    fn default() -> Self {
        Self {
            w_min: 1.0,
            w_max: 100.0,
            w_initial: 50.0,
            success_step: 0.2,
            failure_decay: 0.5,
            ema_alpha: 0.2,
        }
    }
}

struct PeerState {
    peer: Peer,
    insertion_order: usize,
}

pub struct PeerManager {
    config: PeerManagerConfig,
    categories: Mutex<HashMap<PeerCategory, Vec<PeerState>>>,
}

impl PeerManager {
    pub fn new(config: PeerManagerConfig) -> Self {
        Self {
            config,
            categories: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_peer(&self, url: impl Into<String>, category: PeerCategory) {
        let mut categories = self.categories.lock().unwrap();
        let entries = categories.entry(category).or_default();
        let insertion_order = entries.len();
        entries.push(PeerState {
                peer: Peer {
                    url: url.into(),
                    category,
                    weight: self.config.w_initial,
                    rolling_latency_ms: 0.0,
                    rolling_ttfb_ms: 0.0,
                    rolling_error_rate: 0.0,
                },
                insertion_order,
        });
    }

    pub fn report_success(&self, category: PeerCategory, url: &str, kbps: f64, ttfb_ms: f64) {
        let mut categories = self.categories.lock().unwrap();
        let Some(entries) = categories.get_mut(&category) else {
            return;
        };
        let Some(state) = entries.iter_mut().find(|s| s.peer.url == url) else {
            return;
        };
        let alpha = self.config.ema_alpha;
        let latency_ms = if kbps > 0.0 { 1000.0 / kbps } else { state.peer.rolling_latency_ms };
        state.peer.rolling_latency_ms = ema(state.peer.rolling_latency_ms, latency_ms, alpha);
        state.peer.rolling_ttfb_ms = ema(state.peer.rolling_ttfb_ms, ttfb_ms, alpha);
        state.peer.rolling_error_rate = ema(state.peer.rolling_error_rate, 0.0, alpha);

        let gap = self.config.w_max - state.peer.weight;
        state.peer.weight = (state.peer.weight + gap * self.config.success_step)
        .clamp(self.config.w_min, self.config.w_max);
    }

    pub fn report_failure(&self, category: PeerCategory, url: &str) {
        let mut categories = self.categories.lock().unwrap();
        let Some(entries) = categories.get_mut(&category) else {
            return;
        };
        let Some(state) = entries.iter_mut().find(|s| s.peer.url == url) else {
            return;
        };
        state.peer.rolling_error_rate = ema(state.peer.rolling_error_rate, 1.0, self.config.ema_alpha);
        let gap = state.peer.weight - self.config.w_min;
        state.peer.weight =
        (self.config.w_min + gap * self.config.failure_decay).clamp(self.config.w_min, self.config.w_max);
    }

    /// Up to `n` distinct peers, sampled without replacement with
    /// probability proportional to weight. Ties are broken by stable
    /// insertion order.
    pub fn select_peers(&self, category: PeerCategory, n: usize) -> Vec<Peer> {
        self.select_peers_with_rng(category, n, &mut rand::thread_rng())
    }

    pub fn select_peers_with_rng(
        &self,
        category: PeerCategory,
        n: usize,
        rng: &mut impl Rng,
    ) -> Vec<Peer> {
        let categories = self.categories.lock().unwrap();
        let Some(entries) = categories.get(&category) else {
            return Vec::new();
        };

        let mut pool: Vec<(&Peer, usize)> = entries
        .iter()
        .map(|s| (&s.peer, s.insertion_order))
        .collect();
        pool.sort_by_key(|(_, order)| *order);

        let mut selected = Vec::with_capacity(n.min(pool.len()));
        for _ in 0..n {
            let total_weight: f64 = pool.iter().map(|(p, _)| p.weight).sum();
            if total_weight <= 0.0 || pool.is_empty() {
                break;
            }
            let draw = rng.gen_range(0.0..total_weight);
            let mut cumulative = 0.0;
            let mut pick_index = pool.len() - 1;
            for (idx, (peer, _)) in pool.iter().enumerate() {
                cumulative += peer.weight;
                if draw < cumulative {
                    pick_index = idx;
                    break;
                }
            }
            let (peer, _) = pool.remove(pick_index);
            selected.push(peer.clone());
        }
        selected
    }
}

fn ema(previous: f64, sample: f64, alpha: f64) -> f64 {
    previous + alpha * (sample - previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn weights_stay_within_bounds() {
        let manager = PeerManager::new(PeerManagerConfig::default());
        manager.add_peer("http://a", PeerCategory::Chunk);
        for _ in 0..50 {
            manager.report_success(PeerCategory::Chunk, "http://a", 1000.0, 10.0);
        }
        let peers = manager.select_peers(PeerCategory::Chunk, 1);
        assert!(peers[0].weight <= PeerManagerConfig::default().w_max);

        for _ in 0..50 {
            manager.report_failure(PeerCategory::Chunk, "http://a");
        }
        let peers = manager.select_peers(PeerCategory::Chunk, 1);
        assert!(peers[0].weight >= PeerManagerConfig::default().w_min);
    }

    #[test]
    fn empty_category_returns_empty_list() {
        let manager = PeerManager::new(PeerManagerConfig::default());
        assert!(manager.select_peers(PeerCategory::Data, 3).is_empty());
    }

    #[test]
    fn select_peers_returns_distinct_urls() {
        let manager = PeerManager::new(PeerManagerConfig::default());
        for i in 0..5 {
            manager.add_peer(format!("http://peer-{i}"), PeerCategory::Data);
        }
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let selected = manager.select_peers_with_rng(PeerCategory::Data, 3, &mut rng);
        assert_eq!(selected.len(), 3);
        let mut urls: Vec<_> = selected.iter().map(|p| p.url.clone()).collect();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), 3);
    }

    #[test]
    fn zero_total_weight_category_is_treated_as_no_peers() {
        let manager = PeerManager::new(PeerManagerConfig {
                w_min: 0.0,
                failure_decay: 0.0,
                ..PeerManagerConfig::default()
        });
        manager.add_peer("http://a", PeerCategory::Metadata);
        manager.report_failure(PeerCategory::Metadata, "http://a");
        assert!(manager.select_peers(PeerCategory::Metadata, 1).is_empty());
    }
}
