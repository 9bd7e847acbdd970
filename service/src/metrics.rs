//! Prometheus metrics for the TokenTrust service.
//!
//! Counters are fed from the lifecycle [`EventBus`](tokentrust_lifecycle::EventBus)
//! via [`ServiceMetrics::observe`]; gauges are refreshed from
//! [`LifecycleStats`] by the expiry sweeper. The [`ServiceMetrics`] struct owns
//! a dedicated [`Registry`] that the HTTP `/metrics` endpoint encodes into the
//! Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Histogram,
    HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use tokentrust_lifecycle::{LifecycleEvent, LifecycleStats};
use tokentrust_types::TokenState;

/// Central collection of all service-level Prometheus metrics.
pub struct ServiceMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub tokens_issued: IntCounter,
    /// Risk analyses, labelled by default decision.
    pub analyses: IntCounterVec,
    pub freezes: IntCounter,
    pub unfreezes: IntCounter,
    pub revocations: IntCounter,
    pub verifications_requested: IntCounter,
    /// Closed verification windows, labelled by result (success, failure, timeout).
    pub verifications: IntCounterVec,
    /// Windows closed because the deadline passed.
    pub expirations: IntCounter,
    /// Triage overrides, labelled by agent decision.
    pub triage_decisions: IntCounterVec,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub token_count: IntGauge,
    pub event_count: IntGauge,
    /// Events currently in `waiting_verification`.
    pub open_events: IntGauge,
    pub audit_entries: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    pub risk_scores: Histogram,
}

impl ServiceMetrics {
    /// Create a fresh set of metrics, all registered under a new [`Registry`].
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Counters
        let tokens_issued = register_int_counter_with_registry!(
            Opts::new("tokentrust_tokens_issued_total", "Total tokens issued"),
            registry
        )?;
        let analyses = register_int_counter_vec_with_registry!(
            Opts::new(
                "tokentrust_analyses_total",
                "Risk analyses by default decision"
            ),
            &["decision"],
            registry
        )?;
        let freezes = register_int_counter_with_registry!(
            Opts::new("tokentrust_freezes_total", "Tokens moved active -> frozen"),
            registry
        )?;
        let unfreezes = register_int_counter_with_registry!(
            Opts::new("tokentrust_unfreezes_total", "Tokens moved frozen -> active"),
            registry
        )?;
        let revocations = register_int_counter_with_registry!(
            Opts::new("tokentrust_revocations_total", "Tokens revoked"),
            registry
        )?;
        let verifications_requested = register_int_counter_with_registry!(
            Opts::new(
                "tokentrust_verifications_requested_total",
                "Verification windows opened"
            ),
            registry
        )?;
        let verifications = register_int_counter_vec_with_registry!(
            Opts::new(
                "tokentrust_verifications_total",
                "Verification windows closed, by result"
            ),
            &["result"],
            registry
        )?;
        let expirations = register_int_counter_with_registry!(
            Opts::new(
                "tokentrust_verification_expirations_total",
                "Verification windows closed by deadline"
            ),
            registry
        )?;
        let triage_decisions = register_int_counter_vec_with_registry!(
            Opts::new(
                "tokentrust_triage_decisions_total",
                "Triage overrides by agent decision"
            ),
            &["decision"],
            registry
        )?;

        // Gauges
        let token_count = register_int_gauge_with_registry!(
            Opts::new("tokentrust_token_count", "Tokens in the token store"),
            registry
        )?;
        let event_count = register_int_gauge_with_registry!(
            Opts::new("tokentrust_event_count", "Events in the event store"),
            registry
        )?;
        let open_events = register_int_gauge_with_registry!(
            Opts::new(
                "tokentrust_open_events",
                "Events waiting for merchant verification"
            ),
            registry
        )?;
        let audit_entries = register_int_gauge_with_registry!(
            Opts::new("tokentrust_audit_entries", "Entries in the audit log"),
            registry
        )?;

        // Histograms, one bucket per ten score points.
        let risk_scores = register_histogram_with_registry!(
            HistogramOpts::new("tokentrust_risk_score", "Distribution of analysed risk scores")
                .buckets(prometheus::linear_buckets(10.0, 10.0, 10)?),
            registry
        )?;

        Ok(Self {
            registry,
            tokens_issued,
            analyses,
            freezes,
            unfreezes,
            revocations,
            verifications_requested,
            verifications,
            expirations,
            triage_decisions,
            token_count,
            event_count,
            open_events,
            audit_entries,
            risk_scores,
        })
    }

    /// Count one lifecycle event. Registered as an event-bus listener.
    pub fn observe(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::TokenIssued { .. } => self.tokens_issued.inc(),
            LifecycleEvent::TokenTransitioned { to, .. } => match to {
                TokenState::Frozen => self.freezes.inc(),
                TokenState::Active => self.unfreezes.inc(),
                TokenState::Revoked => self.revocations.inc(),
            },
            LifecycleEvent::EventAnalyzed {
                decision, score, ..
            } => {
                self.analyses.with_label_values(&[decision.as_str()]).inc();
                self.risk_scores.observe(f64::from(*score));
            }
            LifecycleEvent::VerificationRequested { .. } => self.verifications_requested.inc(),
            LifecycleEvent::VerificationCompleted { result, .. } => {
                self.verifications
                    .with_label_values(&[result.as_str()])
                    .inc();
                if *result == tokentrust_lifecycle::VerificationResult::Timeout {
                    self.expirations.inc();
                }
            }
            LifecycleEvent::Triaged { decision, .. } => {
                self.triage_decisions
                    .with_label_values(&[decision.as_str()])
                    .inc();
            }
        }
    }

    /// Refresh the store-size gauges.
    pub fn refresh(&self, stats: &LifecycleStats) {
        self.token_count.set(saturating_i64(stats.tokens));
        self.event_count.set(saturating_i64(stats.events));
        self.open_events.set(saturating_i64(stats.open_events));
        self.audit_entries.set(saturating_i64(stats.audit_entries));
    }
}

fn saturating_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
