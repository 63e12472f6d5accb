// self
use crate::obs::{FlowKind, FlowOutcome};

/// Counter incremented once per login, callback, or logout step outcome.
pub const FLOW_COUNTER: &str = "oidc_relying_party_flow_total";

/// Counts a relying-party step, labeled by `flow` and `outcome`.
///
/// A no-op unless the `metrics` feature is enabled.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(FLOW_COUNTER, "flow" => kind.as_str(), "outcome" => outcome.as_str())
		.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}
