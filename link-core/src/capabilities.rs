use bitflags::bitflags;

bitflags! {
	/// Capability bits a link endpoint may advertise to the stack above it.
	/// Neither `cwlink` nor `taglink` sets any bit today (original_source's
	/// endpoints return `stack.LinkEndpointCapabilities(0)` throughout) —
	/// the type exists so a future driver can add one without changing the
	/// `LinkEndpoint` trait's signature.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct Capabilities: u32 {
		const CHECKSUM_OFFLOAD = 1 << 0;
		const LOOPBACK = 1 << 1;
	}
}
