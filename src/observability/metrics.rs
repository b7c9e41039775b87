use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub estimates_total: IntCounterVec,
    pub location_reports_total: IntCounterVec,
    pub location_tier_total: IntCounterVec,
    pub tracking_active: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let estimates_total = IntCounterVec::new(
            Opts::new("estimates_total", "Distance estimates by operation and source"),
            &["operation", "source"],
        )
        .expect("valid estimates_total metric");

        let location_reports_total = IntCounterVec::new(
            Opts::new(
                "location_reports_total",
                "Position reports sent to the backend by kind and outcome",
            ),
            &["kind", "outcome"],
        )
        .expect("valid location_reports_total metric");

        let location_tier_total = IntCounterVec::new(
            Opts::new(
                "location_tier_total",
                "Current-location lookups by the tier that answered",
            ),
            &["tier"],
        )
        .expect("valid location_tier_total metric");

        let tracking_active = IntGaugeVec::new(
            Opts::new("tracking_active", "Whether a tracking mode is running (0/1)"),
            &["mode"],
        )
        .expect("valid tracking_active metric");

        registry
            .register(Box::new(estimates_total.clone()))
            .expect("register estimates_total");
        registry
            .register(Box::new(location_reports_total.clone()))
            .expect("register location_reports_total");
        registry
            .register(Box::new(location_tier_total.clone()))
            .expect("register location_tier_total");
        registry
            .register(Box::new(tracking_active.clone()))
            .expect("register tracking_active");

        Self {
            registry,
            estimates_total,
            location_reports_total,
            location_tier_total,
            tracking_active,
        }
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

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
