use crate::reconcile::{Error, Reconciled};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{
        counter::Counter,
        family::Family,
        histogram::{exponential_buckets, Histogram},
    },
    registry::{Registry, Unit},
};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ReconcileMetrics {
    reconciles: Family<OutcomeLabels, Counter>,
    errors: Family<ErrorLabels, Counter>,
    duration: Family<KindLabels, Histogram>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OutcomeLabels {
    kind: &'static str,
    outcome: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ErrorLabels {
    kind: &'static str,
    reason: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct KindLabels {
    kind: &'static str,
}

impl ReconcileMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let reconciles = Family::default();
        reg.register(
            "reconciles",
            "Count of completed reconciliation passes by outcome",
            reconciles.clone(),
        );

        let errors = Family::default();
        reg.register(
            "reconcile_errors",
            "Count of failed reconciliation passes by reason",
            errors.clone(),
        );

        let duration = Family::<KindLabels, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.005, 2.0, 12))
        });
        reg.register_with_unit(
            "reconcile_duration",
            "Histogram of reconciliation pass latencies",
            Unit::Seconds,
            duration.clone(),
        );

        Self {
            reconciles,
            errors,
            duration,
        }
    }

    pub(crate) fn observe(
        &self,
        kind: &'static str,
        elapsed: Duration,
        result: &Result<Reconciled, Error>,
    ) {
        self.duration
            .get_or_create(&KindLabels { kind })
            .observe(elapsed.as_secs_f64());
        match result {
            Ok(outcome) => self
                .reconciles
                .get_or_create(&OutcomeLabels {
                    kind,
                    outcome: outcome.as_str(),
                })
                .inc(),
            Err(error) => self
                .errors
                .get_or_create(&ErrorLabels {
                    kind,
                    reason: error.reason(),
                })
                .inc(),
        };
    }
}
