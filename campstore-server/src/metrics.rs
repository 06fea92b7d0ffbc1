//! Simple metrics collection for observability
//!
//! Atomic counters, exported in Prometheus text format at `/metrics`.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// How a request ended, as far as metrics are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Created,
    RateLimited,
    ValidationFailed,
    Duplicate,
    NotFound,
    Unauthorized,
    PersistenceFailed,
    Error,
}

impl Outcome {
    /// Classify a response by its HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            201 => Outcome::Created,
            200..=399 => Outcome::Ok,
            400 | 422 => Outcome::ValidationFailed,
            401 => Outcome::Unauthorized,
            404 => Outcome::NotFound,
            409 => Outcome::Duplicate,
            429 => Outcome::RateLimited,
            503 => Outcome::PersistenceFailed,
            _ => Outcome::Error,
        }
    }
}

/// Core metrics collected by the server
pub struct Metrics {
    start_time: Instant,

    pub total_requests: AtomicU64,

    /// Request outcomes
    pub records_created: AtomicU64,
    pub requests_rate_limited: AtomicU64,
    pub validation_failures: AtomicU64,
    pub duplicates_rejected: AtomicU64,
    pub not_found: AtomicU64,
    pub unauthorized: AtomicU64,
    pub persistence_failures: AtomicU64,
    pub requests_errors: AtomicU64,

    /// Request latency buckets (in microseconds)
    pub latency_under_1ms: AtomicU64,
    pub latency_under_10ms: AtomicU64,
    pub latency_under_100ms: AtomicU64,
    pub latency_under_1s: AtomicU64,
    pub latency_over_1s: AtomicU64,

    pub latency_sum_micros: AtomicU64,
    pub latency_count: AtomicU64,

    /// Client keys tracked by the rate limiter
    pub active_keys: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_requests: AtomicU64::new(0),
            records_created: AtomicU64::new(0),
            requests_rate_limited: AtomicU64::new(0),
            validation_failures: AtomicU64::new(0),
            duplicates_rejected: AtomicU64::new(0),
            not_found: AtomicU64::new(0),
            unauthorized: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
            requests_errors: AtomicU64::new(0),
            latency_under_1ms: AtomicU64::new(0),
            latency_under_10ms: AtomicU64::new(0),
            latency_under_100ms: AtomicU64::new(0),
            latency_under_1s: AtomicU64::new(0),
            latency_over_1s: AtomicU64::new(0),
            latency_sum_micros: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
            active_keys: AtomicUsize::new(0),
        }
    }

    /// Record a finished request and its latency
    pub fn record_request(&self, outcome: Outcome, latency_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let counter = match outcome {
            Outcome::Ok => None,
            Outcome::Created => Some(&self.records_created),
            Outcome::RateLimited => Some(&self.requests_rate_limited),
            Outcome::ValidationFailed => Some(&self.validation_failures),
            Outcome::Duplicate => Some(&self.duplicates_rejected),
            Outcome::NotFound => Some(&self.not_found),
            Outcome::Unauthorized => Some(&self.unauthorized),
            Outcome::PersistenceFailed => Some(&self.persistence_failures),
            Outcome::Error => Some(&self.requests_errors),
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        match latency_us {
            0..=999 => self.latency_under_1ms.fetch_add(1, Ordering::Relaxed),
            1000..=9999 => self.latency_under_10ms.fetch_add(1, Ordering::Relaxed),
            10000..=99999 => self.latency_under_100ms.fetch_add(1, Ordering::Relaxed),
            100000..=999999 => self.latency_under_1s.fetch_add(1, Ordering::Relaxed),
            _ => self.latency_over_1s.fetch_add(1, Ordering::Relaxed),
        };

        self.latency_sum_micros
            .fetch_add(latency_us, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_active_keys(&self, count: usize) {
        self.active_keys.store(count, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        gauge(
            &mut output,
            "campstore_uptime_seconds",
            "Time since server start in seconds",
            self.uptime_seconds(),
        );
        counter(
            &mut output,
            "campstore_requests_total",
            "Total number of requests processed",
            self.total_requests.load(Ordering::Relaxed),
        );

        let outcomes = [
            ("campstore_records_created", "Records created", &self.records_created),
            (
                "campstore_requests_rate_limited",
                "Submissions rejected by the rate limiter",
                &self.requests_rate_limited,
            ),
            (
                "campstore_validation_failures",
                "Requests rejected as invalid input",
                &self.validation_failures,
            ),
            (
                "campstore_duplicates_rejected",
                "Submissions rejected as duplicates",
                &self.duplicates_rejected,
            ),
            ("campstore_not_found", "Requests for unknown records", &self.not_found),
            (
                "campstore_unauthorized",
                "Admin requests without a valid token",
                &self.unauthorized,
            ),
            (
                "campstore_persistence_failures",
                "Mutations that could not be committed",
                &self.persistence_failures,
            ),
            ("campstore_requests_errors", "Total internal errors", &self.requests_errors),
        ];
        for (name, help, value) in outcomes {
            counter(&mut output, name, help, value.load(Ordering::Relaxed));
        }

        // Latency distribution
        let mut cumulative = 0;
        let _ = writeln!(
            output,
            "# HELP campstore_request_duration_seconds Request latency distribution"
        );
        let _ = writeln!(output, "# TYPE campstore_request_duration_seconds histogram");
        for (le, bucket) in [
            ("0.001", &self.latency_under_1ms),
            ("0.01", &self.latency_under_10ms),
            ("0.1", &self.latency_under_100ms),
            ("1", &self.latency_under_1s),
            ("+Inf", &self.latency_over_1s),
        ] {
            cumulative += bucket.load(Ordering::Relaxed);
            let _ = writeln!(
                output,
                "campstore_request_duration_seconds_bucket{{le=\"{le}\"}} {cumulative}"
            );
        }
        let latency_sum_seconds =
            self.latency_sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let _ = writeln!(
            output,
            "campstore_request_duration_seconds_sum {latency_sum_seconds:.6}"
        );
        let _ = writeln!(
            output,
            "campstore_request_duration_seconds_count {}\n",
            self.latency_count.load(Ordering::Relaxed)
        );

        gauge(
            &mut output,
            "campstore_rate_limit_active_keys",
            "Number of client keys tracked by the rate limiter",
            self.active_keys.load(Ordering::Relaxed) as u64,
        );

        output
    }
}

fn counter(output: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} counter");
    let _ = writeln!(output, "{name} {value}\n");
}

fn gauge(output: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} gauge");
    let _ = writeln!(output, "{name} {value}\n");
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.records_created.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.requests_rate_limited.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_outcome_from_status() {
        assert_eq!(Outcome::from_status(200), Outcome::Ok);
        assert_eq!(Outcome::from_status(204), Outcome::Ok);
        assert_eq!(Outcome::from_status(201), Outcome::Created);
        assert_eq!(Outcome::from_status(422), Outcome::ValidationFailed);
        assert_eq!(Outcome::from_status(409), Outcome::Duplicate);
        assert_eq!(Outcome::from_status(429), Outcome::RateLimited);
        assert_eq!(Outcome::from_status(503), Outcome::PersistenceFailed);
        assert_eq!(Outcome::from_status(500), Outcome::Error);
    }

    #[test]
    fn test_record_request() {
        let metrics = Metrics::new();

        metrics.record_request(Outcome::Created, 500);
        assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.records_created.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_under_1ms.load(Ordering::Relaxed), 1);

        metrics.record_request(Outcome::RateLimited, 50000);
        assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.requests_rate_limited.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_under_100ms.load(Ordering::Relaxed), 1);

        // Plain successes only count towards the total
        metrics.record_request(Outcome::Ok, 10);
        assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.records_created.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_latency_buckets() {
        let metrics = Metrics::new();

        metrics.record_request(Outcome::Ok, 500); // < 1ms
        metrics.record_request(Outcome::Ok, 5000); // < 10ms
        metrics.record_request(Outcome::Ok, 50000); // < 100ms
        metrics.record_request(Outcome::Ok, 500000); // < 1s
        metrics.record_request(Outcome::Ok, 5000000); // > 1s

        assert_eq!(metrics.latency_under_1ms.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_under_10ms.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_under_100ms.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_under_1s.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.latency_over_1s.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();

        metrics.record_request(Outcome::Created, 500);
        metrics.record_request(Outcome::Duplicate, 1500);
        metrics.update_active_keys(7);

        let output = metrics.export_prometheus();

        assert!(output.contains("campstore_uptime_seconds"));
        assert!(output.contains("campstore_requests_total 2"));
        assert!(output.contains("campstore_records_created 1"));
        assert!(output.contains("campstore_duplicates_rejected 1"));
        assert!(output.contains("campstore_request_duration_seconds_bucket{le=\"0.001\"} 1"));
        assert!(output.contains("campstore_request_duration_seconds_bucket{le=\"+Inf\"} 2"));
        assert!(output.contains("campstore_rate_limit_active_keys 7"));
    }
}
