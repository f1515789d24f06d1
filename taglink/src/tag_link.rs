use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use link_core::LinkAddress;
use slog::{debug, o, warn};
use thiserror::Error;
use tokio::sync::{watch, Mutex};

use crate::ring::{Direction, RingError, TagRing, NO_OP};
use crate::transport::{TagTransport, TransportError};

/// Ring width and per-slot capacity match the original AWS tag-ring link:
/// eight in-flight packets per direction, 255 bytes of base64 text per tag
/// value (API Gateway / Lambda tag value limits).
const RING_SIZE: usize = 8;
const SLOT_CAPACITY: usize = 255;
const HARVEST_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum TagLinkError {
	#[error("tag link: outbound ring full")]
	Full,
	#[error("tag link: end of file")]
	Eof,
	#[error(transparent)]
	Transport(#[from] TransportError),
}

impl From<RingError> for TagLinkError {
	fn from(e: RingError) -> Self {
		match e {
			RingError::Full => TagLinkError::Full,
			RingError::Eof => TagLinkError::Eof,
			RingError::Buffy(_) => panic!("tag link: ring corruption: {e}"),
		}
	}
}

#[derive(Default)]
pub struct TagStats {
	rx_errors: AtomicU64,
	tx_errors: AtomicU64,
	aws_requests: AtomicU64,
	updated_tx_tags: AtomicU64,
	deleted_rx_tags: AtomicU64,
}

impl TagStats {
	pub fn rx_errors(&self) -> u64 {
		self.rx_errors.load(Ordering::Relaxed)
	}
	pub fn tx_errors(&self) -> u64 {
		self.tx_errors.load(Ordering::Relaxed)
	}
	pub fn aws_requests(&self) -> u64 {
		self.aws_requests.load(Ordering::Relaxed)
	}
	pub fn updated_tx_tags(&self) -> u64 {
		self.updated_tx_tags.load(Ordering::Relaxed)
	}
	pub fn deleted_rx_tags(&self) -> u64 {
		self.deleted_rx_tags.load(Ordering::Relaxed)
	}
}

/// Carries packets as tag values on a pair of cloud resources. `tx_arn` is
/// the resource we publish our outbound tags onto (the peer's inbox);
/// `rx_arn` is the resource the peer publishes onto for us (our inbox).
pub struct TagLink<T: TagTransport> {
	transport: Arc<T>,
	tx_arn: String,
	rx_arn: String,
	local: LinkAddress,
	remote: LinkAddress,
	tx_ring: Mutex<TagRing>,
	rx_ring: Mutex<TagRing>,
	stats: TagStats,
	logger: slog::Logger,
	stop_tx: watch::Sender<bool>,
	stop_rx: watch::Receiver<bool>,
}

impl<T: TagTransport + 'static> TagLink<T> {
	pub fn new(transport: Arc<T>, tx_arn: String, rx_arn: String, local: LinkAddress, remote: LinkAddress, logger: slog::Logger) -> Arc<Self> {
		let (stop_tx, stop_rx) = watch::channel(false);
		Arc::new(TagLink {
			transport,
			tx_arn,
			rx_arn,
			local,
			remote,
			tx_ring: Mutex::new(TagRing::new(RING_SIZE, SLOT_CAPACITY, Direction::Transmit)),
			rx_ring: Mutex::new(TagRing::new(RING_SIZE, SLOT_CAPACITY, Direction::Receive)),
			stats: TagStats::default(),
			logger,
			stop_tx,
			stop_rx,
		})
	}

	pub fn stats(&self) -> &TagStats {
		&self.stats
	}

	/// Tag name under which slot `i` of our outbound ring is published on
	/// `tx_arn`. Keyed by the *remote* link address: this is the peer's
	/// inbox, named so the peer can find packets addressed to it.
	fn tx_tag_index(&self, i: usize) -> String {
		format!("link:{}.{}", self.remote.to_text_no_colons(), i)
	}

	/// Tag name under which slot `i` of our inbound ring is published on
	/// `rx_arn`, keyed by our own link address.
	fn rx_tag_index(&self, i: usize) -> String {
		format!("link:{}.{}", self.local.to_text_no_colons(), i)
	}

	/// Spawn the Tx and Rx harvester tasks. Returns join handles the caller
	/// may use to wait for clean shutdown after `stop`.
	pub fn start_harvesters(self: &Arc<Self>) -> (tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>) {
		let tx_self = Arc::clone(self);
		let mut tx_stop = self.stop_rx.clone();
		let tx_handle = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(HARVEST_INTERVAL);
			loop {
				tokio::select! {
					_ = ticker.tick() => {
						if let Err(e) = tx_self.harvest_tx().await {
							warn!(tx_self.logger, "tx harvester: {}", e);
						}
					}
					_ = tx_stop.changed() => break,
				}
			}
		});

		let rx_self = Arc::clone(self);
		let mut rx_stop = self.stop_rx.clone();
		let rx_handle = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(HARVEST_INTERVAL);
			loop {
				tokio::select! {
					_ = ticker.tick() => {
						if let Err(e) = rx_self.harvest_rx().await {
							warn!(rx_self.logger, "rx harvester: {}", e);
						}
					}
					_ = rx_stop.changed() => break,
				}
			}
		});

		(tx_handle, rx_handle)
	}

	pub fn stop(&self) {
		let _ = self.stop_tx.send(true);
	}

	async fn harvest_tx(&self) -> Result<(), TagLinkError> {
		let mut ring = self.tx_ring.lock().await;
		let tags = self.transport.list_tags(&self.tx_arn).await?;
		self.stats.aws_requests.fetch_add(1, Ordering::Relaxed);
		self.refresh_tx_internal_buffers(&mut ring, &tags);
		Ok(())
	}

	async fn harvest_rx(&self) -> Result<(), TagLinkError> {
		let mut ring = self.rx_ring.lock().await;
		let tags = self.transport.list_tags(&self.rx_arn).await?;
		self.stats.aws_requests.fetch_add(1, Ordering::Relaxed);
		self.refresh_rx_internal_buffers(&mut ring, &tags);
		Ok(())
	}

	fn refresh_tx_internal_buffers(&self, ring: &mut TagRing, tags: &HashMap<String, String>) {
		ring.reset();
		for i in 0..ring.size() {
			let key = self.tx_tag_index(i);
			let value = tags.get(&key).map(|v| v.as_bytes()).unwrap_or(&[]);
			ring.replace(i, value).expect("tag ring: corrupt tx slot during harvest");
		}
	}

	fn refresh_rx_internal_buffers(&self, ring: &mut TagRing, tags: &HashMap<String, String>) {
		ring.reset();
		for i in 0..ring.size() {
			let key = self.rx_tag_index(i);
			let value = tags.get(&key).map(|v| v.as_bytes()).unwrap_or(&[]);
			ring.replace(i, value).expect("tag ring: corrupt rx slot during harvest");
		}
	}

	/// Encode `p` into the next free outbound slot and publish it. An empty
	/// payload is a no-op: it must not consume a slot or make a request.
	pub async fn write(&self, p: &[u8]) -> Result<usize, TagLinkError> {
		if p.is_empty() {
			return Ok(0);
		}
		let mut ring = self.tx_ring.lock().await;
		let n = ring.write(p)?;
		if n > 0 {
			self.flush_transmit(&ring).await?;
		}
		Ok(n)
	}

	async fn flush_transmit(&self, ring: &TagRing) -> Result<(), TagLinkError> {
		let i = ring.last_write_op();
		if i == NO_OP {
			return Ok(());
		}
		let i = i as usize;
		let len = ring.slot_len(i);
		assert!(len > 0, "tag link: flush of an empty transmit slot");
		let mut tags = HashMap::with_capacity(1);
		tags.insert(self.tx_tag_index(i), ring.slot_encoded_string(i));
		self.transport.tag_resource(&self.tx_arn, tags).await?;
		self.stats.aws_requests.fetch_add(1, Ordering::Relaxed);
		self.stats.updated_tx_tags.fetch_add(1, Ordering::Relaxed);
		debug!(self.logger, "tag link: flushed transmit slot"; "slot" => i);
		Ok(())
	}

	/// Decode the oldest available inbound packet into `p`, then clear its
	/// tag on the remote resource.
	pub async fn read(&self, p: &mut [u8]) -> Result<usize, TagLinkError> {
		let mut ring = self.rx_ring.lock().await;
		let n = ring.read(p)?;
		self.flush_receive(&mut ring).await?;
		Ok(n)
	}

	async fn flush_receive(&self, ring: &mut TagRing) -> Result<(), TagLinkError> {
		let i = ring.last_read_op();
		if i == NO_OP {
			return Ok(());
		}
		let i = i as usize;
		ring.reset_slot(i);
		self.transport.untag_resource(&self.rx_arn, vec![self.rx_tag_index(i)]).await?;
		self.stats.aws_requests.fetch_add(1, Ordering::Relaxed);
		self.stats.deleted_rx_tags.fetch_add(1, Ordering::Relaxed);
		debug!(self.logger, "tag link: flushed receive slot"; "slot" => i);
		Ok(())
	}

	pub fn note_rx_error(&self) {
		self.stats.rx_errors.fetch_add(1, Ordering::Relaxed);
	}

	pub fn note_tx_error(&self) {
		self.stats.tx_errors.fetch_add(1, Ordering::Relaxed);
	}

	pub fn child_logger(&self) -> slog::Logger {
		self.logger.new(o!())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::transport::FakeTagTransport;

	fn logger() -> slog::Logger {
		slog::Logger::root(slog::Discard, o!())
	}

	fn addr(b: u8) -> LinkAddress {
		LinkAddress::from_bytes(vec![2, 0, 0, 0, 0, b])
	}

	#[tokio::test]
	async fn write_calls_tag_resource_on_remote_arn() {
		let transport = Arc::new(FakeTagTransport::new());
		let link = TagLink::new(Arc::clone(&transport), "remote-arn".into(), "local-arn".into(), addr(1), addr(2), logger());

		link.write(b"hello").await.unwrap();

		let tags = transport.list_tags("remote-arn").await.unwrap();
		let key = format!("link:{}.0", addr(2).to_text_no_colons());
		assert!(tags.contains_key(&key));
		assert_eq!(link.stats().updated_tx_tags(), 1);
	}

	#[tokio::test]
	async fn empty_write_is_a_true_no_op() {
		let transport = Arc::new(FakeTagTransport::new());
		let link = TagLink::new(Arc::clone(&transport), "remote-arn".into(), "local-arn".into(), addr(1), addr(2), logger());

		let n = link.write(b"").await.unwrap();
		assert_eq!(n, 0);

		let tags = transport.list_tags("remote-arn").await.unwrap();
		assert!(tags.is_empty());
		assert_eq!(link.stats().updated_tx_tags(), 0);
	}

	#[tokio::test]
	async fn harvester_tick_makes_a_poked_tag_readable() {
		let transport = Arc::new(FakeTagTransport::new());
		let link = TagLink::new(Arc::clone(&transport), "remote-arn".into(), "local-arn".into(), addr(1), addr(2), logger());

		let key = format!("link:{}.0", addr(1).to_text_no_colons());
		let value = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"incoming");
		transport.poke("local-arn", &key, &value).await;

		link.harvest_rx().await.unwrap();

		let mut buf = [0u8; 255];
		let n = link.read(&mut buf).await.unwrap_or_else(|e| panic!("expected data, got {e}"));
		assert_eq!(&buf[..n], b"incoming");

		let tags = transport.list_tags("local-arn").await.unwrap();
		assert!(!tags.contains_key(&key), "read should have untagged the slot");
		assert_eq!(link.stats().deleted_rx_tags(), 1);
	}

	#[tokio::test]
	async fn harvest_after_read_does_not_resurrect_the_consumed_slot() {
		// Regression test for the receive lifecycle: poke a tag, harvest it
		// in, read it (which untags it on the fake transport), then harvest
		// again now that the tag is genuinely gone. Without resetting the
		// ring (harvest) and the consumed slot (flush_receive), the second
		// harvest's `Replace(i, &[])` would see stale encoded bytes still
		// sitting in the slot, report a change, and increment `avail` for a
		// slot that is actually empty — corrupting `next_read_slot`'s
		// invariant and panicking on the following `read`.
		let transport = Arc::new(FakeTagTransport::new());
		let link = TagLink::new(Arc::clone(&transport), "remote-arn".into(), "local-arn".into(), addr(1), addr(2), logger());

		let key = format!("link:{}.0", addr(1).to_text_no_colons());
		let value = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"incoming");
		transport.poke("local-arn", &key, &value).await;

		link.harvest_rx().await.unwrap();
		let mut buf = [0u8; 255];
		link.read(&mut buf).await.unwrap();

		link.harvest_rx().await.unwrap();

		// Must not panic, and must correctly report no data available.
		let err = link.read(&mut buf).await.unwrap_err();
		assert!(matches!(err, TagLinkError::Eof));
	}

	#[tokio::test]
	async fn unchanged_harvester_tick_does_not_move_avail() {
		let transport = Arc::new(FakeTagTransport::new());
		let link = TagLink::new(Arc::clone(&transport), "remote-arn".into(), "local-arn".into(), addr(1), addr(2), logger());

		link.harvest_rx().await.unwrap();
		link.harvest_rx().await.unwrap();

		let mut buf = [0u8; 255];
		let err = link.read(&mut buf).await.unwrap_err();
		assert!(matches!(err, TagLinkError::Eof));
	}
}
