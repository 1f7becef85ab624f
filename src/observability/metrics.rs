use std::time::Instant;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub mutations_total: IntCounterVec,
    pub mutation_latency_seconds: HistogramVec,
    pub fanout_failures_total: IntCounterVec,
    pub realtime_subscribers: IntGauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let mutations_total = IntCounterVec::new(
            Opts::new(
                "move_mutations_total",
                "Move request mutations by operation and outcome",
            ),
            &["operation", "outcome"],
        )
        .expect("valid move_mutations_total metric");

        let mutation_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "move_mutation_latency_seconds",
                "Latency of move request mutations in seconds",
            ),
            &["operation"],
        )
        .expect("valid move_mutation_latency_seconds metric");

        let fanout_failures_total = IntCounterVec::new(
            Opts::new(
                "fanout_failures_total",
                "Post-commit side effects that failed, by channel",
            ),
            &["channel"],
        )
        .expect("valid fanout_failures_total metric");

        let realtime_subscribers =
            IntGauge::new("realtime_subscribers", "Currently connected websocket clients")
                .expect("valid realtime_subscribers metric");

        registry
            .register(Box::new(mutations_total.clone()))
            .expect("register move_mutations_total");
        registry
            .register(Box::new(mutation_latency_seconds.clone()))
            .expect("register move_mutation_latency_seconds");
        registry
            .register(Box::new(fanout_failures_total.clone()))
            .expect("register fanout_failures_total");
        registry
            .register(Box::new(realtime_subscribers.clone()))
            .expect("register realtime_subscribers");

        Self {
            registry,
            mutations_total,
            mutation_latency_seconds,
            fanout_failures_total,
            realtime_subscribers,
        }
    }

    pub fn record_mutation(&self, operation: &str, started: Instant, success: bool) {
        let outcome = if success { "success" } else { "error" };
        self.mutation_latency_seconds
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64());
        self.mutations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn record_fanout_failure(&self, channel: &str) {
        self.fanout_failures_total
            .with_label_values(&[channel])
            .inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
