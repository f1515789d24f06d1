use std::sync::{Arc, OnceLock};

use link_core::{Capabilities, Dispatcher, LinkAddress, LinkEndpoint, LinkError, LinkStats, Protocol, Route};
use slog::info;

/// A stand-in lower endpoint for the demos, taking the place of a real
/// tun/tap device (an out-of-scope external collaborator). `inject` feeds
/// it a frame as if the OS had handed one up from the device; writes are
/// just logged, since there's no real interface underneath to carry them.
pub struct VirtualEndpoint {
	local: LinkAddress,
	dispatcher: OnceLock<Arc<dyn Dispatcher>>,
	stats: LinkStats,
	logger: slog::Logger,
}

impl VirtualEndpoint {
	pub fn new(local: LinkAddress, logger: slog::Logger) -> Arc<Self> {
		Arc::new(VirtualEndpoint {
			local,
			dispatcher: OnceLock::new(),
			stats: LinkStats::new(),
			logger,
		})
	}

	pub fn stats(&self) -> &LinkStats {
		&self.stats
	}

	/// Simulate an inbound frame arriving from the device this endpoint
	/// stands in for.
	pub fn inject(self: &Arc<Self>, src: LinkAddress, dst: LinkAddress, protocol: Protocol, payload: Vec<u8>) {
		if let Some(dispatcher) = self.dispatcher.get() {
			self.stats.record_rx_packet();
			dispatcher.deliver_network_packet(self.clone(), src, dst, protocol, vec![payload]);
		}
	}
}

impl LinkEndpoint for VirtualEndpoint {
	fn mtu(&self) -> u32 {
		1500
	}

	fn max_header_length(&self) -> u16 {
		link_core::ETHERNET_HEADER_LEN as u16
	}

	fn capabilities(&self) -> Capabilities {
		Capabilities::empty()
	}

	fn link_address(&self) -> LinkAddress {
		self.local.clone()
	}

	fn attach(self: Arc<Self>, dispatcher: Arc<dyn Dispatcher>) {
		let _ = self.dispatcher.set(dispatcher);
	}

	fn is_attached(&self) -> bool {
		self.dispatcher.get().is_some()
	}

	fn write_packet(&self, route: &Route, _header: &[u8], payload: &[Vec<u8>], protocol: Protocol) -> Result<(), LinkError> {
		self.stats.record_tx_packet();
		let len: usize = payload.iter().map(Vec::len).sum();
		info!(self.logger, "virtual endpoint: write"; "remote" => route.remote.to_text(), "protocol" => protocol.name(), "bytes" => len);
		Ok(())
	}
}
