use std::sync::{Arc, OnceLock};

use link_core::{Capabilities, ConfigError, Dispatcher, EthernetHeader, LinkAddress, LinkEndpoint, LinkError, LinkStats, Protocol, Route};
use slog::{o, warn};

use crate::endpoint::Options;
use crate::log_link::LogLink;
use crate::packet_log::LogCoordinate;
use crate::transport::LogTransport;

const MTU: u32 = 1024;

/// Wraps a lower `LinkEndpoint` (typically a tun/tap device) and relays its
/// traffic through the log-stream link, and vice versa. Grounded on
/// original_source's `cloudwatch.endpointBridge`: it is its own
/// `Dispatcher` for the lower endpoint's inbound frames, and pushes
/// whatever the log link surfaces back down through the lower endpoint.
pub struct LogLinkBridge<L: LogTransport> {
	local: LinkAddress,
	net_name: String,
	ethernet_header: bool,
	lower: Arc<dyn LinkEndpoint>,
	log_link: Arc<LogLink<L>>,
	dispatcher: OnceLock<Arc<dyn Dispatcher>>,
	stats: LinkStats,
	logger: slog::Logger,
}

impl<L: LogTransport + 'static> LogLinkBridge<L> {
	pub fn new(transport: Arc<L>, opts: Options, lower: Arc<dyn LinkEndpoint>, logger: slog::Logger) -> Result<Arc<Self>, ConfigError> {
		if opts.point_to_point && opts.remote.is_none() {
			return Err(ConfigError::MissingRemoteForPointToPoint);
		}
		let log_link = LogLink::new(transport, opts.net_name.clone(), opts.local.clone(), logger.new(o!("component" => "cwlink-bridge")));
		Ok(Arc::new(LogLinkBridge {
			local: opts.local,
			net_name: opts.net_name,
			ethernet_header: opts.ethernet_header,
			lower,
			log_link,
			dispatcher: OnceLock::new(),
			stats: LinkStats::new(),
			logger,
		}))
	}

	pub fn stats(&self) -> &LinkStats {
		&self.stats
	}

	/// Pulls frames off the log link and writes them down through the
	/// lower endpoint. original_source's `ReadPacket` builds the outbound
	/// route as `{local: remote-on-wire, remote: local-on-wire}` — flagged
	/// with a `FIXME` in that source as possibly backwards. Preserved
	/// as-is rather than guessed at; see DESIGN.md.
	fn dispatch_loop(self: Arc<Self>) {
		tokio::spawn(async move {
			if let Err(e) = self.log_link.start().await {
				warn!(self.logger, "cwlink-bridge: failed to start log link: {}", e);
				return;
			}
			loop {
				match self.log_link.read().await {
					Ok(frame) => self.forward_to_lower(frame),
					Err(e) => {
						self.stats.record_rx_error();
						warn!(self.logger, "cwlink-bridge: read error: {}", e);
					}
				}
			}
		});
	}

	fn forward_to_lower(self: &Arc<Self>, frame: crate::log_link::DecodedFrame) {
		let (protocol, remote, local, payload) = if self.ethernet_header {
			match EthernetHeader::decode(&frame.header) {
				Some(eth) => (eth.ethertype, eth.src, eth.dst, frame.payload),
				None => {
					self.stats.record_rx_error();
					warn!(self.logger, "cwlink-bridge: dropping frame with truncated ethernet header");
					return;
				}
			}
		} else {
			let protocol = frame.payload.first().map(|b| Protocol::from_ip_version_nibble(*b)).unwrap_or(Protocol::UNKNOWN);
			(protocol, LinkAddress::empty(), LinkAddress::empty(), frame.payload)
		};

		if !remote.is_empty() && remote == self.local {
			return;
		}

		let route = Route::new(protocol, remote, local);
		if let Err(e) = self.lower.write_packet(&route, &[], &[payload], protocol) {
			self.stats.record_tx_error();
			warn!(self.logger, "cwlink-bridge: lower endpoint rejected frame: {}", e);
		}
	}
}

impl<L: LogTransport + 'static> Dispatcher for LogLinkBridge<L> {
	/// Called by the lower endpoint when it receives a frame (e.g. off a
	/// tun/tap device). Broadcast is a no-op today; frames addressed to us
	/// terminate here; everything else is republished onto the log link.
	fn deliver_network_packet(&self, source: Arc<dyn LinkEndpoint>, src_link: LinkAddress, dst_link: LinkAddress, protocol: Protocol, views: Vec<Vec<u8>>) {
		if dst_link == LinkAddress::broadcast() {
			return;
		}

		if dst_link == self.local {
			if let Some(dispatcher) = self.dispatcher.get() {
				dispatcher.deliver_network_packet(source, src_link, dst_link, protocol, views);
			}
			return;
		}

		// Don't write a frame back out the interface it arrived on.
		if source.link_address() == dst_link {
			return;
		}

		let route = Route::new(protocol, src_link, dst_link.clone());
		let header = if views.len() > 1 { views[0].clone() } else { Vec::new() };
		let payload = if views.len() > 1 { views[1..].concat() } else { views.into_iter().next().unwrap_or_default() };

		let log_link = Arc::clone(&self.log_link);
		let net_name = self.net_name.clone();
		let logger = self.logger.clone();
		let coord = LogCoordinate::new(route.local.clone(), route.remote.clone(), net_name);
		tokio::spawn(async move {
			if let Err(e) = log_link.open_log_stream(&coord).await {
				warn!(logger, "cwlink-bridge: could not open log stream: {}", e);
				return;
			}
			if let Err(e) = log_link.write(coord, protocol, &header, &payload).await {
				warn!(logger, "cwlink-bridge: write error, packet dropped: {}", e);
			}
		});
	}
}

impl<L: LogTransport + 'static> LinkEndpoint for LogLinkBridge<L> {
	fn mtu(&self) -> u32 {
		self.lower.mtu().min(MTU)
	}

	fn max_header_length(&self) -> u16 {
		self.lower.max_header_length()
	}

	fn capabilities(&self) -> Capabilities {
		self.lower.capabilities()
	}

	fn link_address(&self) -> LinkAddress {
		self.lower.link_address()
	}

	fn attach(self: Arc<Self>, dispatcher: Arc<dyn Dispatcher>) {
		if self.dispatcher.set(Arc::clone(&dispatcher)).is_err() {
			return;
		}
		Arc::clone(&self.lower).attach(self.clone() as Arc<dyn Dispatcher>);
		self.dispatch_loop();
	}

	fn is_attached(&self) -> bool {
		self.dispatcher.get().is_some()
	}

	fn write_packet(&self, route: &Route, header: &[u8], payload: &[Vec<u8>], protocol: Protocol) -> Result<(), LinkError> {
		self.lower.write_packet(route, header, payload, protocol)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::transport::FakeLogTransport;
	use std::sync::Mutex as StdMutex;
	use std::sync::OnceLock as StdOnceLock;

	fn logger() -> slog::Logger {
		slog::Logger::root(slog::Discard, slog::o!())
	}

	fn addr(b: u8) -> LinkAddress {
		LinkAddress::from_bytes(vec![2, 0, 0, 0, 0, b])
	}

	/// A bare-bones lower endpoint standing in for a tun/tap device,
	/// recording what the bridge writes down to it.
	struct RecordingLower {
		local: LinkAddress,
		dispatcher: StdOnceLock<Arc<dyn Dispatcher>>,
		written: StdMutex<Vec<(LinkAddress, LinkAddress)>>,
	}

	impl RecordingLower {
		fn new(local: LinkAddress) -> Arc<Self> {
			Arc::new(RecordingLower {
				local,
				dispatcher: StdOnceLock::new(),
				written: StdMutex::new(Vec::new()),
			})
		}
	}

	impl LinkEndpoint for RecordingLower {
		fn mtu(&self) -> u32 {
			1500
		}
		fn max_header_length(&self) -> u16 {
			14
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
		fn write_packet(&self, route: &Route, _header: &[u8], _payload: &[Vec<u8>], _protocol: Protocol) -> Result<(), LinkError> {
			self.written.lock().unwrap().push((route.local.clone(), route.remote.clone()));
			Ok(())
		}
	}

	fn opts(local: LinkAddress) -> Options {
		Options {
			local,
			remote: None,
			point_to_point: false,
			ethernet_header: true,
			net_name: "net0".into(),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn broadcast_from_lower_is_a_no_op() {
		let transport = Arc::new(FakeLogTransport::new());
		let lower = RecordingLower::new(addr(0xcc));
		let bridge = LogLinkBridge::new(transport, opts(addr(0xcc)), lower.clone(), logger()).unwrap();

		bridge.deliver_network_packet(lower.clone(), addr(1), LinkAddress::broadcast(), Protocol::IPV4, vec![b"payload".to_vec()]);

		// No upward dispatcher, no write poller traffic to assert on; this
		// test only guards against a panic/log-write happening at all for
		// a broadcast destination, per spec.md's "fall through, no-op".
	}

	#[tokio::test(start_paused = true)]
	async fn frame_addressed_to_us_is_not_republished_onto_the_log_link() {
		let transport = Arc::new(FakeLogTransport::new());
		let lower = RecordingLower::new(addr(0xcc));
		let bridge = LogLinkBridge::new(transport, opts(addr(0xcc)), lower.clone(), logger()).unwrap();

		// deliver_network_packet with dst == our own link address should
		// not attempt to republish; with no dispatcher attached it's simply
		// dropped (matching "deliver upward to our own dispatcher", which
		// here is unset).
		bridge.deliver_network_packet(lower.clone(), addr(1), addr(0xcc), Protocol::IPV4, vec![b"payload".to_vec()]);
	}

	#[tokio::test(start_paused = true)]
	async fn frame_from_lower_loops_back_guard_skips_own_interface() {
		let transport = Arc::new(FakeLogTransport::new());
		// Bridge's own address differs from the delivering lower interface's
		// address, so the `dst_link == self.local` branch above is not what
		// drops this frame — only the loopback guard does.
		let lower = RecordingLower::new(addr(0xdd));
		let bridge = LogLinkBridge::new(transport, opts(addr(0xcc)), lower.clone(), logger()).unwrap();

		bridge.deliver_network_packet(lower.clone(), addr(1), addr(0xdd), Protocol::IPV4, vec![b"payload".to_vec()]);
		assert!(lower.written.lock().unwrap().is_empty());
	}
}
