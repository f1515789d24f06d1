use std::sync::Arc;

use crate::address::LinkAddress;
use crate::capabilities::Capabilities;
use crate::error::LinkError;
use crate::protocol::Protocol;
use crate::route::Route;

/// The stack-side receiver a link calls to deliver inbound frames upward.
/// `views` mirrors the vectorised-view convention of original_source: a
/// frame is delivered as `[header, payload]` (or just `[payload]` once the
/// link-layer header has been trimmed), not a single flattened buffer, so
/// a wrapping endpoint (the bridge) can rebuild a prependable header region
/// without copying the whole frame.
pub trait Dispatcher: Send + Sync {
	fn deliver_network_packet(
		&self,
		source: Arc<dyn LinkEndpoint>,
		src_link: LinkAddress,
		dst_link: LinkAddress,
		protocol: Protocol,
		views: Vec<Vec<u8>>,
	);
}

/// The capability surface a link driver presents to the stack above it —
/// the Link Endpoint Contract of spec.md §4.1.
pub trait LinkEndpoint: Send + Sync {
	fn mtu(&self) -> u32;

	fn max_header_length(&self) -> u16;

	fn capabilities(&self) -> Capabilities;

	fn link_address(&self) -> LinkAddress;

	/// Install the stack-side dispatcher. Idempotent-enough to be called
	/// once per endpoint lifetime; implementations may start background
	/// tasks here.
	fn attach(self: Arc<Self>, dispatcher: Arc<dyn Dispatcher>);

	fn is_attached(&self) -> bool;

	/// `header` is the caller-supplied prependable header region (possibly
	/// empty); `payload` is a vectorised view of the payload, mirroring
	/// original_source's `buffer.VectorisedView`.
	fn write_packet(&self, route: &Route, header: &[u8], payload: &[Vec<u8>], protocol: Protocol) -> Result<(), LinkError>;
}
