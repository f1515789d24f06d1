use std::sync::{Arc, OnceLock};

use link_core::{Capabilities, ConfigError, Dispatcher, EthernetHeader, LinkAddress, LinkEndpoint, LinkError, LinkStats, Protocol, Route, ETHERNET_HEADER_LEN};
use slog::{o, warn};

use crate::log_link::LogLink;
use crate::packet_log::LogCoordinate;
use crate::transport::LogTransport;

const MTU: u32 = 1024;

pub struct Options {
	pub local: LinkAddress,
	pub remote: Option<LinkAddress>,
	pub point_to_point: bool,
	pub ethernet_header: bool,
	pub net_name: String,
}

/// A log-stream link endpoint: either a raw point-to-point IP carrier
/// (`ethernet_header: false`) or a full Ethernet-framed segment, per
/// original_source's `cloudwatch.endpoint`.
pub struct LogLinkEndpoint<L: LogTransport> {
	local: LinkAddress,
	net_name: String,
	ethernet_header: bool,
	log_link: Arc<LogLink<L>>,
	dispatcher: OnceLock<Arc<dyn Dispatcher>>,
	stats: LinkStats,
	logger: slog::Logger,
}

impl<L: LogTransport + 'static> LogLinkEndpoint<L> {
	pub fn new(transport: Arc<L>, opts: Options, logger: slog::Logger) -> Result<Arc<Self>, ConfigError> {
		if opts.point_to_point && opts.remote.is_none() {
			return Err(ConfigError::MissingRemoteForPointToPoint);
		}
		let log_link = LogLink::new(transport, opts.net_name.clone(), opts.local.clone(), logger.new(o!("component" => "cwlink")));
		Ok(Arc::new(LogLinkEndpoint {
			local: opts.local,
			net_name: opts.net_name,
			ethernet_header: opts.ethernet_header,
			log_link,
			dispatcher: OnceLock::new(),
			stats: LinkStats::new(),
			logger,
		}))
	}

	pub fn stats(&self) -> &LinkStats {
		&self.stats
	}

	fn dispatch_loop(self: Arc<Self>, dispatcher: Arc<dyn Dispatcher>) {
		tokio::spawn(async move {
			if let Err(e) = self.log_link.start().await {
				warn!(self.logger, "cwlink: failed to start log link: {}", e);
				return;
			}
			loop {
				match self.log_link.read().await {
					Ok(frame) => self.handle_frame(&dispatcher, frame),
					Err(e) => {
						self.stats.record_rx_error();
						warn!(self.logger, "cwlink: read error: {}", e);
					}
				}
			}
		});
	}

	fn handle_frame(self: &Arc<Self>, dispatcher: &Arc<dyn Dispatcher>, frame: crate::log_link::DecodedFrame) {
		let (protocol, remote, local, body) = if self.ethernet_header {
			match EthernetHeader::decode(&frame.header) {
				Some(eth) => (eth.ethertype, eth.src, eth.dst, frame.payload),
				None => {
					self.stats.record_rx_error();
					warn!(self.logger, "cwlink: dropping frame with truncated ethernet header");
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

		self.stats.record_rx_packet();
		dispatcher.deliver_network_packet(self.clone(), remote, local, protocol, vec![body]);
	}
}

impl<L: LogTransport + 'static> LinkEndpoint for LogLinkEndpoint<L> {
	fn mtu(&self) -> u32 {
		MTU
	}

	fn max_header_length(&self) -> u16 {
		if self.ethernet_header {
			ETHERNET_HEADER_LEN as u16
		} else {
			0
		}
	}

	fn capabilities(&self) -> Capabilities {
		Capabilities::empty()
	}

	fn link_address(&self) -> LinkAddress {
		self.local.clone()
	}

	fn attach(self: Arc<Self>, dispatcher: Arc<dyn Dispatcher>) {
		if self.dispatcher.set(Arc::clone(&dispatcher)).is_err() {
			return;
		}
		self.dispatch_loop(dispatcher);
	}

	fn is_attached(&self) -> bool {
		self.dispatcher.get().is_some()
	}

	fn write_packet(&self, route: &Route, header: &[u8], payload: &[Vec<u8>], protocol: Protocol) -> Result<(), LinkError> {
		if route.remote.is_empty() {
			return Err(LinkError::MissingRemoteAddress);
		}

		let mut full_header = Vec::new();
		if self.ethernet_header {
			let src = if !route.local.is_empty() { route.local.clone() } else { self.local.clone() };
			full_header = EthernetHeader {
				dst: route.remote.clone(),
				src,
				ethertype: protocol,
			}
			.encode();
		} else {
			full_header.extend_from_slice(header);
		}

		let flat_payload: Vec<u8> = payload.iter().flat_map(|v| v.iter().copied()).collect();
		let coord = LogCoordinate::new(route.local.clone(), route.remote.clone(), self.net_name.clone());
		let log_link = Arc::clone(&self.log_link);
		let logger = self.logger.clone();
		tokio::spawn(async move {
			if let Err(e) = log_link.open_log_stream(&coord).await {
				warn!(logger, "cwlink: could not open log stream: {}", e);
				return;
			}
			if let Err(e) = log_link.write(coord, protocol, &full_header, &flat_payload).await {
				warn!(logger, "cwlink: write error, packet dropped: {}", e);
			}
		});
		self.stats.record_tx_packet();
		Ok(())
	}
}
