// crates.io
use tracing::{Span, instrument::Instrumented};
// self
use crate::{_prelude::*, auth::ProtocolVersion, obs::FlowKind};

/// A span builder used by login and fetch flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	span: Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the flow kind, protocol version, and stage.
	pub fn new(kind: FlowKind, version: ProtocolVersion, stage: &'static str) -> Self {
		let span =
			tracing::info_span!("oacurl.flow", flow = kind.as_str(), version = version.as_str(), stage);

		Self { span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		use tracing::Instrument;

		fut.instrument(self.span.clone())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::Login, ProtocolVersion::V2, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
