use std::sync::atomic::{AtomicU64, Ordering};

/// Per-endpoint packet/error counters. Updated without locks — spec.md §5
/// requires these to be atomic since readers may observe them from another
/// thread while pollers/harvesters update them.
#[derive(Debug, Default)]
pub struct LinkStats {
	rx_packets: AtomicU64,
	tx_packets: AtomicU64,
	rx_errors: AtomicU64,
	tx_errors: AtomicU64,
}

impl LinkStats {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn rx_packets(&self) -> u64 {
		self.rx_packets.load(Ordering::Relaxed)
	}

	pub fn tx_packets(&self) -> u64 {
		self.tx_packets.load(Ordering::Relaxed)
	}

	pub fn rx_errors(&self) -> u64 {
		self.rx_errors.load(Ordering::Relaxed)
	}

	pub fn tx_errors(&self) -> u64 {
		self.tx_errors.load(Ordering::Relaxed)
	}

	pub fn record_rx_packet(&self) {
		self.rx_packets.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_tx_packet(&self) {
		self.tx_packets.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_rx_error(&self) {
		self.rx_errors.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_tx_error(&self) {
		self.tx_errors.fetch_add(1, Ordering::Relaxed);
	}
}
