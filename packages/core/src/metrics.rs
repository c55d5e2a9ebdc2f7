//! Prometheus metrics registry for the scheduling service.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and hand it to
//! the API state; the HTTP middleware and the appointment handlers update
//! it.
//!
//! Exposed at `GET /metrics` in Prometheus text exposition format
//! (`text/plain; version=0.0.4`).

use prometheus::{Counter, CounterVec, Histogram, HistogramOpts, Opts, Registry};

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Appointments successfully booked.
    pub appointments_created_total: Counter,
    /// Appointments successfully moved to a new slot.
    pub appointments_rescheduled_total: Counter,
    /// Appointments transitioned to `cancelled`.
    pub appointments_cancelled_total: Counter,
    /// Appointments transitioned to `completed`.
    pub appointments_completed_total: Counter,
    /// Create or reschedule attempts rejected because the slot was taken.
    pub slot_conflicts_total: Counter,
    /// HTTP request count, labelled by method, route, and status code.
    pub http_requests_total: CounterVec,
    /// HTTP request latency histogram in seconds.
    pub http_request_duration: Histogram,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl AppMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let appointments_created_total = Counter::with_opts(Opts::new(
            "appointme_appointments_created_total",
            "Appointments booked",
        ))?;

        let appointments_rescheduled_total = Counter::with_opts(Opts::new(
            "appointme_appointments_rescheduled_total",
            "Appointments moved to a new slot",
        ))?;

        let appointments_cancelled_total = Counter::with_opts(Opts::new(
            "appointme_appointments_cancelled_total",
            "Appointments cancelled",
        ))?;

        let appointments_completed_total = Counter::with_opts(Opts::new(
            "appointme_appointments_completed_total",
            "Appointments completed",
        ))?;

        let slot_conflicts_total = Counter::with_opts(Opts::new(
            "appointme_slot_conflicts_total",
            "Bookings rejected because the slot was already taken",
        ))?;

        let http_requests_total = CounterVec::new(
            Opts::new(
                "appointme_http_requests_total",
                "HTTP requests by method, route, and status",
            ),
            &["method", "path", "status"],
        )?;

        let http_request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "appointme_http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        registry.register(Box::new(appointments_created_total.clone()))?;
        registry.register(Box::new(appointments_rescheduled_total.clone()))?;
        registry.register(Box::new(appointments_cancelled_total.clone()))?;
        registry.register(Box::new(appointments_completed_total.clone()))?;
        registry.register(Box::new(slot_conflicts_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            appointments_created_total,
            appointments_rescheduled_total,
            appointments_cancelled_total,
            appointments_completed_total,
            slot_conflicts_total,
            http_requests_total,
            http_request_duration,
            registry,
        })
    }

    /// Render all metrics as Prometheus text format (for the `/metrics` endpoint).
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}
