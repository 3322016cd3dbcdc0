// self
use crate::{
	auth::ProtocolVersion,
	obs::{FlowKind, FlowOutcome},
};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, version: ProtocolVersion, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oacurl_flow_total",
			"flow" => kind.as_str(),
			"version" => version.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, version, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_flow_outcome_noop_without_recorder() {
		record_flow_outcome(FlowKind::Login, ProtocolVersion::Wrap, FlowOutcome::Rejected);
	}
}
