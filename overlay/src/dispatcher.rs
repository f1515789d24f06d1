use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use link_core::{Dispatcher, LinkAddress, LinkEndpoint, Protocol, Route};
use slog::info;

/// Stands in for the (out-of-scope) user-space TCP/IP stack: logs every
/// delivered packet and counts them, without doing anything with the
/// payload. Good enough to prove a link driver is actually receiving
/// frames end to end in a demo or test.
pub struct LoggingDispatcher {
	logger: slog::Logger,
	delivered: AtomicU64,
}

impl LoggingDispatcher {
	pub fn new(logger: slog::Logger) -> Arc<Self> {
		Arc::new(LoggingDispatcher { logger, delivered: AtomicU64::new(0) })
	}

	pub fn delivered(&self) -> u64 {
		self.delivered.load(Ordering::Relaxed)
	}
}

impl Dispatcher for LoggingDispatcher {
	fn deliver_network_packet(&self, _source: Arc<dyn LinkEndpoint>, src_link: LinkAddress, dst_link: LinkAddress, protocol: Protocol, views: Vec<Vec<u8>>) {
		self.delivered.fetch_add(1, Ordering::Relaxed);
		let len: usize = views.iter().map(Vec::len).sum();
		info!(self.logger, "delivered network packet"; "src" => src_link.to_text(), "dst" => dst_link.to_text(), "protocol" => protocol.name(), "bytes" => len);
	}
}

/// Echoes every inbound packet straight back out the link it arrived on,
/// with source/destination swapped. Useful for exercising a link driver's
/// round trip (write -> remote harvester/poller -> read) without standing
/// up a real stack above it.
pub struct LoopbackDispatcher {
	logger: slog::Logger,
}

impl LoopbackDispatcher {
	pub fn new(logger: slog::Logger) -> Arc<Self> {
		Arc::new(LoopbackDispatcher { logger })
	}
}

impl Dispatcher for LoopbackDispatcher {
	fn deliver_network_packet(&self, source: Arc<dyn LinkEndpoint>, src_link: LinkAddress, dst_link: LinkAddress, protocol: Protocol, views: Vec<Vec<u8>>) {
		if dst_link.is_broadcast() {
			return;
		}
		let route = Route::new(protocol, dst_link, src_link);
		if let Err(e) = source.write_packet(&route, &[], &views, protocol) {
			info!(self.logger, "loopback: echo failed: {}", e);
		}
	}
}
