//! Serving metrics: lock-free counters plus a latency histogram, rendered in
//! the Prometheus text exposition format.
//!
//! Counter updates are best-effort atomics; the scrape path only ever reads,
//! so it can never block or fail a concurrent prediction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Instant;

/// Upper bounds (seconds) for the latency histogram.
const LATENCY_BUCKETS: [f64; 10] = [
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, f64::INFINITY,
];

struct HistogramInner {
    bucket_counts: [u64; LATENCY_BUCKETS.len()],
    sum: f64,
    count: u64,
}

pub struct ServiceMetrics {
    requests_total: AtomicU64,
    invalid_requests_total: AtomicU64,
    inference_errors_total: AtomicU64,
    latency: RwLock<HistogramInner>,
    started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            invalid_requests_total: AtomicU64::new(0),
            inference_errors_total: AtomicU64::new(0),
            latency: RwLock::new(HistogramInner {
                bucket_counts: [0; LATENCY_BUCKETS.len()],
                sum: 0.0,
                count: 0,
            }),
            started_at: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid_request(&self) {
        self.invalid_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inference_error(&self) {
        self.inference_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, seconds: f64) {
        if let Ok(mut inner) = self.latency.write() {
            for (i, le) in LATENCY_BUCKETS.iter().enumerate() {
                if seconds <= *le {
                    inner.bucket_counts[i] += 1;
                    break;
                }
            }
            inner.sum += seconds;
            inner.count += 1;
        }
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn errors_total(&self) -> u64 {
        self.invalid_requests_total.load(Ordering::Relaxed)
            + self.inference_errors_total.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Render the scrape document. Idempotent and side-effect-free.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(1024);

        out.push_str("# HELP modelflow_requests_total Prediction requests received.\n");
        out.push_str("# TYPE modelflow_requests_total counter\n");
        out.push_str(&format!(
            "modelflow_requests_total {}\n",
            self.requests_total()
        ));

        out.push_str("# HELP modelflow_errors_total Rejected prediction requests.\n");
        out.push_str("# TYPE modelflow_errors_total counter\n");
        out.push_str(&format!(
            "modelflow_errors_total{{kind=\"invalid_request\"}} {}\n",
            self.invalid_requests_total.load(Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "modelflow_errors_total{{kind=\"inference\"}} {}\n",
            self.inference_errors_total.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP modelflow_request_latency_seconds Prediction latency.\n");
        out.push_str("# TYPE modelflow_request_latency_seconds histogram\n");
        if let Ok(inner) = self.latency.read() {
            let mut cumulative = 0u64;
            for (i, le) in LATENCY_BUCKETS.iter().enumerate() {
                cumulative += inner.bucket_counts[i];
                let bound = if le.is_infinite() {
                    "+Inf".to_string()
                } else {
                    format!("{}", le)
                };
                out.push_str(&format!(
                    "modelflow_request_latency_seconds_bucket{{le=\"{}\"}} {}\n",
                    bound, cumulative
                ));
            }
            out.push_str(&format!(
                "modelflow_request_latency_seconds_sum {}\n",
                inner.sum
            ));
            out.push_str(&format!(
                "modelflow_request_latency_seconds_count {}\n",
                inner.count
            ));
        }

        out.push_str("# HELP modelflow_uptime_seconds Seconds since the service started.\n");
        out.push_str("# TYPE modelflow_uptime_seconds gauge\n");
        out.push_str(&format!("modelflow_uptime_seconds {:.3}\n", self.uptime_secs()));

        out
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = ServiceMetrics::new();
        metrics.record_request();
        metrics.record_request();
        metrics.record_invalid_request();
        metrics.record_inference_error();

        assert_eq!(metrics.requests_total(), 2);
        assert_eq!(metrics.errors_total(), 2);
    }

    #[test]
    fn test_histogram_buckets_are_cumulative() {
        let metrics = ServiceMetrics::new();
        metrics.record_latency(0.0005);
        metrics.record_latency(0.003);
        metrics.record_latency(2.0);

        let rendered = metrics.render();
        assert!(rendered.contains("modelflow_request_latency_seconds_bucket{le=\"0.001\"} 1"));
        assert!(rendered.contains("modelflow_request_latency_seconds_bucket{le=\"0.005\"} 2"));
        assert!(rendered.contains("modelflow_request_latency_seconds_bucket{le=\"+Inf\"} 3"));
        assert!(rendered.contains("modelflow_request_latency_seconds_count 3"));
    }

    #[test]
    fn test_render_is_idempotent() {
        let metrics = ServiceMetrics::new();
        metrics.record_request();
        let a = metrics.render();
        let b = metrics.render();
        let count_line = |s: &str| {
            s.lines()
                .find(|l| l.starts_with("modelflow_requests_total "))
                .map(|l| l.to_string())
        };
        assert_eq!(count_line(&a), count_line(&b));
    }
}
