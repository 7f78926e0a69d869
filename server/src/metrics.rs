// Relay and proxy counters exposed on /metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

const LATENCY_SAMPLES: usize = 1000;

/// Request/latency statistics for one HTTP endpoint
#[derive(Debug)]
pub struct EndpointMetrics {
    request_count: AtomicU64,
    error_count: AtomicU64,
    total_latency_ms: AtomicU64,
    min_latency_ms: AtomicU64,
    max_latency_ms: AtomicU64,
    // most recent samples, for percentiles
    latency_samples: Mutex<VecDeque<u64>>,
}

impl Default for EndpointMetrics {
    fn default() -> Self {
        Self {
            request_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            min_latency_ms: AtomicU64::new(u64::MAX),
            max_latency_ms: AtomicU64::new(0),
            latency_samples: Mutex::new(VecDeque::with_capacity(LATENCY_SAMPLES)),
        }
    }
}

impl EndpointMetrics {
    pub fn record_request(&self, latency_ms: u64) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.min_latency_ms.fetch_min(latency_ms, Ordering::Relaxed);
        self.max_latency_ms.fetch_max(latency_ms, Ordering::Relaxed);

        if let Ok(mut samples) = self.latency_samples.lock() {
            if samples.len() == LATENCY_SAMPLES {
                samples.pop_front();
            }
            samples.push_back(latency_ms);
        }
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    fn percentile(&self, p: usize) -> u64 {
        let Ok(samples) = self.latency_samples.lock() else {
            return 0;
        };
        if samples.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = samples.iter().copied().collect();
        sorted.sort_unstable();
        let index = (sorted.len() * p / 100).min(sorted.len() - 1);
        sorted[index]
    }

    pub fn stats(&self) -> EndpointStats {
        let count = self.request_count.load(Ordering::Relaxed);
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let min = self.min_latency_ms.load(Ordering::Relaxed);
        EndpointStats {
            request_count: count,
            error_count: self.error_count.load(Ordering::Relaxed),
            avg_latency_ms: if count == 0 { 0.0 } else { total as f64 / count as f64 },
            min_latency_ms: if min == u64::MAX { 0 } else { min },
            max_latency_ms: self.max_latency_ms.load(Ordering::Relaxed),
            p50_latency_ms: self.percentile(50),
            p95_latency_ms: self.percentile(95),
            p99_latency_ms: self.percentile(99),
        }
    }
}

/// Counters for the WebSocket relay
#[derive(Debug, Default)]
pub struct RelayMetrics {
    connections_opened: AtomicU64,
    connections_active: AtomicU64,
    turns_started: AtomicU64,
    turns_completed: AtomicU64,
    turns_failed: AtomicU64,
    turns_rejected: AtomicU64,
    turns_aborted: AtomicU64,
    chunks_relayed: AtomicU64,
}

impl RelayMetrics {
    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn turn_started(&self) {
        self.turns_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn turn_completed(&self) {
        self.turns_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn turn_failed(&self) {
        self.turns_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn turn_rejected(&self) {
        self.turns_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn turn_aborted(&self) {
        self.turns_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn chunk_relayed(&self) {
        self.chunks_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            turns_started: self.turns_started.load(Ordering::Relaxed),
            turns_completed: self.turns_completed.load(Ordering::Relaxed),
            turns_failed: self.turns_failed.load(Ordering::Relaxed),
            turns_rejected: self.turns_rejected.load(Ordering::Relaxed),
            turns_aborted: self.turns_aborted.load(Ordering::Relaxed),
            chunks_relayed: self.chunks_relayed.load(Ordering::Relaxed),
        }
    }
}

/// Everything the server counts
#[derive(Debug)]
pub struct AppMetrics {
    pub relay: RelayMetrics,
    pub tts: EndpointMetrics,
    started_at: Instant,
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self {
            relay: RelayMetrics::default(),
            tts: EndpointMetrics::default(),
            started_at: Instant::now(),
        }
    }
}

impl AppMetrics {
    pub fn snapshot(&self) -> MetricsResponse {
        MetricsResponse {
            timestamp: Utc::now(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            relay: self.relay.stats(),
            tts: self.tts.stats(),
        }
    }
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub relay: RelayStats,
    pub tts: EndpointStats,
}

#[derive(Debug, Serialize)]
pub struct RelayStats {
    pub connections_opened: u64,
    pub connections_active: u64,
    pub turns_started: u64,
    pub turns_completed: u64,
    pub turns_failed: u64,
    pub turns_rejected: u64,
    pub turns_aborted: u64,
    pub chunks_relayed: u64,
}

#[derive(Debug, Serialize)]
pub struct EndpointStats {
    pub request_count: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub p99_latency_ms: u64,
}
