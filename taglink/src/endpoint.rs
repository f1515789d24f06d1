use std::sync::{Arc, OnceLock};
use std::time::Duration;

use link_core::{Capabilities, Dispatcher, LinkAddress, LinkEndpoint, LinkError, LinkStats, Protocol, Route};
use slog::{o, warn};

use crate::ipv4::looks_like_ipv4;
use crate::tag_link::{TagLink, TagLinkError};
use crate::transport::TagTransport;

/// Point-to-point endpoint over a pair of tag-ring mailboxes. There is no
/// Ethernet header on this transport — `max_header_length` is 0 and every
/// decoded slot is handed upward as a bare IPv4 datagram, matching
/// original_source's cloudwatch-free tag link (it never ran Ethernet
/// framing; that's a `cwlink`-only option).
const MTU: u32 = 189;
const RX_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct TagLinkEndpoint<T: TagTransport> {
	link: Arc<TagLink<T>>,
	local: LinkAddress,
	dispatcher: OnceLock<Arc<dyn Dispatcher>>,
	stats: LinkStats,
	logger: slog::Logger,
}

impl<T: TagTransport + 'static> TagLinkEndpoint<T> {
	pub fn new(transport: Arc<T>, tx_arn: String, rx_arn: String, local: LinkAddress, remote: LinkAddress, logger: slog::Logger) -> Arc<Self> {
		let link = TagLink::new(transport, tx_arn, rx_arn, local.clone(), remote, logger.new(o!("component" => "taglink")));
		Arc::new(TagLinkEndpoint {
			link,
			local,
			dispatcher: OnceLock::new(),
			stats: LinkStats::new(),
			logger,
		})
	}

	pub fn stats(&self) -> &LinkStats {
		&self.stats
	}

	pub fn tag_stats(&self) -> &crate::tag_link::TagStats {
		self.link.stats()
	}

	fn dispatch_loop(self: Arc<Self>, dispatcher: Arc<dyn Dispatcher>) -> tokio::task::JoinHandle<()> {
		tokio::spawn(async move {
			let mut buf = vec![0u8; MTU as usize];
			loop {
				match self.link.read(&mut buf).await {
					Ok(0) => continue,
					Ok(n) => {
						let frame = buf[..n].to_vec();
						if !looks_like_ipv4(&frame) {
							self.stats.record_rx_error();
							self.link.note_rx_error();
							warn!(self.logger, "taglink: dropping non-IPv4 payload"; "len" => n);
							continue;
						}
						self.stats.record_rx_packet();
						dispatcher.deliver_network_packet(self.clone(), LinkAddress::empty(), LinkAddress::empty(), Protocol::IPV4, vec![frame]);
					}
					Err(TagLinkError::Eof) => {
						tokio::time::sleep(RX_POLL_INTERVAL).await;
					}
					Err(e) => {
						self.stats.record_rx_error();
						self.link.note_rx_error();
						warn!(self.logger, "taglink: read error: {}", e);
						tokio::time::sleep(RX_POLL_INTERVAL).await;
					}
				}
			}
		})
	}
}

impl<T: TagTransport + 'static> LinkEndpoint for TagLinkEndpoint<T> {
	fn mtu(&self) -> u32 {
		MTU
	}

	fn max_header_length(&self) -> u16 {
		0
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
		self.link.start_harvesters();
		self.clone().dispatch_loop(dispatcher);
	}

	fn is_attached(&self) -> bool {
		self.dispatcher.get().is_some()
	}

	fn write_packet(&self, _route: &Route, header: &[u8], payload: &[Vec<u8>], _protocol: Protocol) -> Result<(), LinkError> {
		let mut frame = Vec::with_capacity(header.len() + payload.iter().map(Vec::len).sum::<usize>());
		frame.extend_from_slice(header);
		for view in payload {
			frame.extend_from_slice(view);
		}
		if frame.len() > MTU as usize {
			self.stats.record_tx_error();
			return Err(LinkError::OverCapacity);
		}

		let link = Arc::clone(&self.link);
		let stats_logger = self.logger.clone();
		tokio::spawn(async move {
			match link.write(&frame).await {
				Ok(_) => {}
				Err(TagLinkError::Full) => {
					link.note_tx_error();
					warn!(stats_logger, "taglink: outbound ring full, packet dropped");
				}
				Err(e) => {
					link.note_tx_error();
					warn!(stats_logger, "taglink: write error: {}", e);
				}
			}
		});
		self.stats.record_tx_packet();
		Ok(())
	}
}
