use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Duration;

use link_core::{LinkAddress, Protocol};
use slog::{debug, o, warn};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};

use crate::packet_log::{LogCoordinate, PacketLog};
use crate::transport::{LogEvent, LogTransport, TransportError};

const WRITE_TICK: Duration = Duration::from_millis(200); // 5Hz, matches original's writeThrottle
const READ_TICK_LOCAL: Duration = Duration::from_millis(250); // 4Hz, matches original's readThrottle
const READ_TICK_BROADCAST: Duration = Duration::from_secs(1); // 1Hz, matches original's broadcastThrottle
const WRITE_QUEUE_DEPTH: usize = 16;
const READ_QUEUE_DEPTH: usize = 32;

#[derive(Error, Debug)]
pub enum LogLinkError {
	#[error("log link: serialization error: {0}")]
	Json(#[from] serde_json::Error),
	#[error("log link: transport error: {0}")]
	Transport(#[from] TransportError),
	#[error("log link: malformed log event: {0}")]
	Malformed(String),
	#[error("log link: channel closed")]
	Closed,
}

/// A decoded inbound frame: self-describing protocol plus the raw
/// link-layer header and payload bytes, base64-decoded off the wire.
pub struct DecodedFrame {
	pub protocol: Protocol,
	pub header: Vec<u8>,
	pub payload: Vec<u8>,
}

struct WriteJob {
	coord: LogCoordinate,
	body: Vec<u8>,
}

type ReadEvent = Result<String, TransportError>;

fn now_millis() -> i64 {
	std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

/// Process-wide memoization of "does this log group/stream already exist".
/// original_source keyed this off a package-level `map[string]bool`; one
/// cloud account's log groups are a global namespace, so the cache is
/// legitimately process-wide rather than per-`LogLink`.
fn stream_exists_cache() -> &'static StdMutex<HashSet<String>> {
	static CACHE: OnceLock<StdMutex<HashSet<String>>> = OnceLock::new();
	CACHE.get_or_init(|| StdMutex::new(HashSet::new()))
}

/// Reads/writes L2 data to an append-only log service, via two read
/// pollers (one for frames addressed to us, one for broadcast) and one
/// write poller, all polling independently of `Read`/`Write` callers.
pub struct LogLink<L: LogTransport> {
	transport: Arc<L>,
	net_name: String,
	local: LinkAddress,
	write_tx: mpsc::Sender<WriteJob>,
	write_rx: Mutex<Option<mpsc::Receiver<WriteJob>>>,
	read_tx: mpsc::Sender<ReadEvent>,
	read_rx: Mutex<mpsc::Receiver<ReadEvent>>,
	logger: slog::Logger,
	stop_tx: watch::Sender<bool>,
	stop_rx: watch::Receiver<bool>,
}

impl<L: LogTransport + 'static> LogLink<L> {
	pub fn new(transport: Arc<L>, net_name: impl Into<String>, local: LinkAddress, logger: slog::Logger) -> Arc<Self> {
		let (write_tx, write_rx) = mpsc::channel(WRITE_QUEUE_DEPTH);
		let (read_tx, read_rx) = mpsc::channel(READ_QUEUE_DEPTH);
		let (stop_tx, stop_rx) = watch::channel(false);
		Arc::new(LogLink {
			transport,
			net_name: net_name.into(),
			local,
			write_tx,
			write_rx: Mutex::new(Some(write_rx)),
			read_tx,
			read_rx: Mutex::new(read_rx),
			logger,
			stop_tx,
			stop_rx,
		})
	}

	/// Creates the broadcast log group/stream and our own receive group,
	/// then spawns the read and write poller tasks. Call once per link.
	pub async fn start(self: &Arc<Self>) -> Result<(), LogLinkError> {
		let broadcast_coord = LogCoordinate::new(self.local.clone(), LinkAddress::broadcast(), self.net_name.clone());
		self.open_log_stream(&broadcast_coord).await?;

		let own_group = LogCoordinate::new(LinkAddress::empty(), self.local.clone(), self.net_name.clone()).log_group_name();
		match self.transport.create_log_group(&own_group).await {
			Ok(()) | Err(TransportError::ResourceAlreadyExists) => {}
			Err(e) => return Err(e.into()),
		}

		let write_rx = self.write_rx.lock().await.take().expect("LogLink::start called more than once");
		self.spawn_write_poller(write_rx);
		self.spawn_read_poller(own_group, READ_TICK_LOCAL);
		self.spawn_read_poller(broadcast_coord.log_group_name(), READ_TICK_BROADCAST);
		Ok(())
	}

	pub fn stop(&self) {
		let _ = self.stop_tx.send(true);
	}

	/// Ensures the log group and stream named by `coord` exist, memoizing
	/// the result so repeat writers to the same coordinate skip the round
	/// trip. Mirrors original_source's `OpenLogStream`.
	pub async fn open_log_stream(&self, coord: &LogCoordinate) -> Result<(), LogLinkError> {
		let full_path = coord.full_path();
		if stream_exists_cache().lock().unwrap().contains(&full_path) {
			return Ok(());
		}

		match self.transport.create_log_group(&coord.log_group_name()).await {
			Ok(()) | Err(TransportError::ResourceAlreadyExists) => {}
			Err(e) => return Err(e.into()),
		}
		match self.transport.create_log_stream(&coord.log_group_name(), &coord.log_stream_name()).await {
			Ok(()) | Err(TransportError::ResourceAlreadyExists) => {}
			Err(e) => return Err(e.into()),
		}

		stream_exists_cache().lock().unwrap().insert(full_path);
		Ok(())
	}

	/// Enqueues one outbound frame. Blocks (does not drop) if the write
	/// queue is full, same as original_source's unbuffered-beyond-16 `Cw`
	/// channel send.
	pub async fn write(&self, coord: LogCoordinate, protocol: Protocol, header: &[u8], payload: &[u8]) -> Result<usize, LogLinkError> {
		let pl = PacketLog::encode(protocol, &coord.local, &coord.remote, header, payload);
		let body = serde_json::to_vec(&pl)?;
		let len = body.len();
		self.write_tx.send(WriteJob { coord, body }).await.map_err(|_| LogLinkError::Closed)?;
		Ok(len)
	}

	/// Blocks until the next inbound frame is available.
	pub async fn read(&self) -> Result<DecodedFrame, LogLinkError> {
		let mut rx = self.read_rx.lock().await;
		let event = rx.recv().await.ok_or(LogLinkError::Closed)?;
		let raw = event?;
		let pl: PacketLog = serde_json::from_str(&raw)?;
		let header = pl.decode_header().map_err(|e| LogLinkError::Malformed(e.to_string()))?;
		let payload = pl.decode_payload().map_err(|e| LogLinkError::Malformed(e.to_string()))?;
		Ok(DecodedFrame {
			protocol: pl.protocol(),
			header,
			payload,
		})
	}

	fn spawn_write_poller(self: &Arc<Self>, mut write_rx: mpsc::Receiver<WriteJob>) {
		let this = Arc::clone(self);
		let mut stop = self.stop_rx.clone();
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(WRITE_TICK);
			let mut sequence_tokens: HashMap<String, Option<String>> = HashMap::new();
			loop {
				tokio::select! {
					_ = ticker.tick() => {
						// Drain at most one job per tick: this is a direct
						// behavioural carry-over from original_source's
						// non-blocking `select { case: ...; default: }`.
						if let Ok(job) = write_rx.try_recv() {
							this.flush(job, &mut sequence_tokens).await;
						}
					}
					_ = stop.changed() => break,
				}
			}
		});
	}

	async fn flush(&self, job: WriteJob, sequence_tokens: &mut HashMap<String, Option<String>>) {
		let full_path = job.coord.full_path();
		let group = job.coord.log_group_name();
		let stream = job.coord.log_stream_name();
		let events = vec![LogEvent {
			message: String::from_utf8_lossy(&job.body).into_owned(),
			timestamp_millis: now_millis(),
		}];
		let token = sequence_tokens.get(&full_path).cloned().flatten();

		match self.transport.put_log_events(&group, &stream, token, events.clone()).await {
			Ok(outcome) => {
				sequence_tokens.insert(full_path, outcome.next_sequence_token);
			}
			Err(TransportError::DataAlreadyAccepted { correct_token }) => {
				debug!(self.logger, "write poller: data already accepted, adopting reported token"; "log-group" => &group);
				sequence_tokens.insert(full_path, Some(correct_token));
			}
			Err(TransportError::InvalidSequenceToken { correct_token }) => {
				match self.transport.put_log_events(&group, &stream, Some(correct_token), events).await {
					Ok(outcome) => {
						sequence_tokens.insert(full_path, outcome.next_sequence_token);
					}
					Err(e) => warn!(self.logger, "write poller: retry after bad sequence token failed: {}", e),
				}
			}
			Err(e) => warn!(self.logger, "write poller: flush failed: {}", e; "log-group" => &group),
		}
	}

	fn spawn_read_poller(self: &Arc<Self>, group_name: String, tick: Duration) {
		let transport = Arc::clone(&self.transport);
		let read_tx = self.read_tx.clone();
		let logger = self.logger.new(o!("log-group" => group_name.clone()));
		let mut stop = self.stop_rx.clone();
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(tick);
			let mut next_token: Option<String> = None;
			let mut start_time_millis = now_millis();
			loop {
				tokio::select! {
					_ = ticker.tick() => {
						match transport.filter_log_events(&group_name, next_token.clone(), start_time_millis).await {
							Ok(outcome) => {
								// A `None` next_token means "no new messages" in
								// original_source, not "forget the cursor" — so the
								// previous token is deliberately kept, not cleared.
								if outcome.next_token.is_some() {
									next_token = outcome.next_token;
								}
								for event in outcome.events {
									start_time_millis = event.timestamp_millis + 1;
									if read_tx.send(Ok(event.message)).await.is_err() {
										return;
									}
								}
							}
							Err(e) => {
								warn!(logger, "read poller: {}", e);
								let _ = read_tx.send(Err(e)).await;
							}
						}
					}
					_ = stop.changed() => break,
				}
			}
		});
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::transport::FakeLogTransport;

	fn logger() -> slog::Logger {
		slog::Logger::root(slog::Discard, o!())
	}

	fn addr(b: u8) -> LinkAddress {
		LinkAddress::from_bytes(vec![2, 0, 0, 0, 0, b])
	}

	#[tokio::test(start_paused = true)]
	async fn write_then_poller_tick_flushes_to_transport() {
		let transport = Arc::new(FakeLogTransport::new());
		let link = LogLink::new(Arc::clone(&transport), "net0", addr(1), logger());
		link.start().await.unwrap();

		let coord = LogCoordinate::new(addr(1), addr(2), "net0");
		link.write(coord.clone(), Protocol::IPV4, b"\xaa", b"payload").await.unwrap();

		tokio::time::advance(WRITE_TICK).await;
		tokio::task::yield_now().await;

		let events = transport
			.filter_log_events(&coord.log_group_name(), None, 0)
			.await
			.unwrap();
		assert_eq!(events.events.len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn poked_broadcast_event_surfaces_through_read() {
		let transport = Arc::new(FakeLogTransport::new());
		let link = LogLink::new(Arc::clone(&transport), "net0", addr(1), logger());
		link.start().await.unwrap();

		let broadcast_group = LogCoordinate::new(addr(1), LinkAddress::broadcast(), "net0").log_group_name();
		let pl = PacketLog::encode(Protocol::IPV4, &addr(2), &LinkAddress::broadcast(), &[], b"hi");
		transport.poke(&broadcast_group, "sender", &serde_json::to_string(&pl).unwrap(), now_millis() + 10_000).await;

		tokio::time::advance(READ_TICK_BROADCAST).await;
		tokio::task::yield_now().await;

		let frame = link.read().await.unwrap();
		assert_eq!(frame.payload, b"hi");
	}

	#[tokio::test(start_paused = true)]
	async fn invalid_sequence_token_triggers_one_retry_and_stores_the_reported_token() {
		let transport = Arc::new(FakeLogTransport::new());
		let link = LogLink::new(Arc::clone(&transport), "net0", addr(1), logger());
		link.start().await.unwrap();

		let coord = LogCoordinate::new(addr(1), addr(2), "net0");
		let group = coord.log_group_name();
		let stream = coord.log_stream_name();
		transport.fail_next_put_with_invalid_sequence_token(&group, &stream, "corrected-token").await;

		link.write(coord.clone(), Protocol::IPV4, b"\xaa", b"first").await.unwrap();
		tokio::time::advance(WRITE_TICK).await;
		tokio::task::yield_now().await;

		// One failed attempt with the old (absent) token, one retry with
		// exactly the token the service reported.
		let attempts = transport.put_attempts(&group, &stream).await;
		assert_eq!(attempts, vec![None, Some("corrected-token".to_string())]);

		let events = transport.filter_log_events(&group, None, 0).await.unwrap();
		assert_eq!(events.events.len(), 1);

		// The next flush must continue from the *service's* next-token, not
		// the one the poller originally guessed.
		link.write(coord.clone(), Protocol::IPV4, b"\xaa", b"second").await.unwrap();
		tokio::time::advance(WRITE_TICK).await;
		tokio::task::yield_now().await;

		let attempts = transport.put_attempts(&group, &stream).await;
		assert_eq!(attempts.last().unwrap(), &Some("1".to_string()));
	}

	#[tokio::test(start_paused = true)]
	async fn data_already_accepted_is_not_retried_and_its_token_is_adopted() {
		let transport = Arc::new(FakeLogTransport::new());
		let link = LogLink::new(Arc::clone(&transport), "net0", addr(1), logger());
		link.start().await.unwrap();

		let coord = LogCoordinate::new(addr(1), addr(2), "net0");
		let group = coord.log_group_name();
		let stream = coord.log_stream_name();
		transport.fail_next_put_with_data_already_accepted(&group, &stream, "already-seen-token").await;

		link.write(coord.clone(), Protocol::IPV4, b"\xaa", b"payload").await.unwrap();
		tokio::time::advance(WRITE_TICK).await;
		tokio::task::yield_now().await;

		// Treated as success: exactly one attempt, no retry.
		let attempts = transport.put_attempts(&group, &stream).await;
		assert_eq!(attempts, vec![None]);

		// The next flush continues from the reported token.
		link.write(coord.clone(), Protocol::IPV4, b"\xaa", b"second").await.unwrap();
		tokio::time::advance(WRITE_TICK).await;
		tokio::task::yield_now().await;

		let attempts = transport.put_attempts(&group, &stream).await;
		assert_eq!(attempts.last().unwrap(), &Some("already-seen-token".to_string()));
	}
}
