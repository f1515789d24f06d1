use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
	#[error("log group or stream already exists")]
	ResourceAlreadyExists,

	/// The sequence token supplied to `put_log_events` was stale; the
	/// service reports the correct one to retry with.
	#[error("invalid sequence token, correct token: {correct_token}")]
	InvalidSequenceToken { correct_token: String },

	/// The same batch was already accepted under a previous attempt; the
	/// service reports the sequence token to continue from.
	#[error("data already accepted, correct token: {correct_token}")]
	DataAlreadyAccepted { correct_token: String },

	#[error("log transport error: {0}")]
	Other(String),
}

#[derive(Debug, Clone)]
pub struct LogEvent {
	pub message: String,
	pub timestamp_millis: i64,
}

#[derive(Debug, Default)]
pub struct PutLogEventsOutcome {
	pub next_sequence_token: Option<String>,
}

#[derive(Debug, Default)]
pub struct FilterLogEventsOutcome {
	pub events: Vec<LogEvent>,
	pub next_token: Option<String>,
}

/// The append-only log service's interface, as far as `cwlink` is
/// concerned. A real implementation would be backed by a cloud SDK client;
/// that SDK is an out-of-scope external collaborator (spec.md §1) — this
/// crate depends only on the trait.
#[async_trait]
pub trait LogTransport: Send + Sync {
	async fn create_log_group(&self, group_name: &str) -> Result<(), TransportError>;

	async fn create_log_stream(&self, group_name: &str, stream_name: &str) -> Result<(), TransportError>;

	async fn put_log_events(
		&self,
		group_name: &str,
		stream_name: &str,
		sequence_token: Option<String>,
		events: Vec<LogEvent>,
	) -> Result<PutLogEventsOutcome, TransportError>;

	async fn filter_log_events(
		&self,
		group_name: &str,
		next_token: Option<String>,
		start_time_millis: i64,
	) -> Result<FilterLogEventsOutcome, TransportError>;
}

struct FakeStream {
	events: Vec<LogEvent>,
	sequence_token: u64,
}

/// A one-shot failure queued for the next `put_log_events` against a given
/// (group, stream), used to exercise the write poller's sequence-token
/// recovery path (spec.md §8, scenario 5).
#[derive(Clone)]
enum InjectedPutFailure {
	InvalidSequenceToken(String),
	DataAlreadyAccepted(String),
}

/// An in-memory fake used by tests and the `cwlink-client`/`cwlink-bridge`
/// demos. Each (group, stream) pair is an append-only event list; sequence
/// tokens are simple monotonically increasing counters rendered as text
/// (the fake never needs to reject a token on its own, since nothing else
/// writes to it concurrently in tests — `fail_next_put_with_*` lets a test
/// inject a rejection deliberately).
#[derive(Default)]
pub struct FakeLogTransport {
	groups: tokio::sync::Mutex<HashMap<String, HashMap<String, FakeStream>>>,
	pending_put_failures: tokio::sync::Mutex<HashMap<(String, String), InjectedPutFailure>>,
	put_attempts: tokio::sync::Mutex<HashMap<(String, String), Vec<Option<String>>>>,
}

impl FakeLogTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Directly append an event to a stream, bypassing `put_log_events`, to
	/// simulate the remote end of the link writing into our read-side
	/// group (what the read pollers are meant to observe).
	pub async fn poke(&self, group_name: &str, stream_name: &str, message: &str, timestamp_millis: i64) {
		let mut groups = self.groups.lock().await;
		let stream = groups
			.entry(group_name.to_string())
			.or_default()
			.entry(stream_name.to_string())
			.or_insert_with(|| FakeStream {
				events: Vec::new(),
				sequence_token: 0,
			});
		stream.events.push(LogEvent {
			message: message.to_string(),
			timestamp_millis,
		});
	}

	/// Arranges for the *next* `put_log_events` call against (group, stream)
	/// to fail with `InvalidSequenceToken`, reporting `correct_token` as the
	/// token to retry with. Fires exactly once.
	pub async fn fail_next_put_with_invalid_sequence_token(&self, group_name: &str, stream_name: &str, correct_token: impl Into<String>) {
		self.pending_put_failures
			.lock()
			.await
			.insert((group_name.to_string(), stream_name.to_string()), InjectedPutFailure::InvalidSequenceToken(correct_token.into()));
	}

	/// Arranges for the *next* `put_log_events` call against (group, stream)
	/// to fail with `DataAlreadyAccepted`, reporting `correct_token` as the
	/// token to continue from. Fires exactly once.
	pub async fn fail_next_put_with_data_already_accepted(&self, group_name: &str, stream_name: &str, correct_token: impl Into<String>) {
		self.pending_put_failures
			.lock()
			.await
			.insert((group_name.to_string(), stream_name.to_string()), InjectedPutFailure::DataAlreadyAccepted(correct_token.into()));
	}

	/// The sequence tokens `put_log_events` was called with against
	/// (group, stream), in call order, including attempts that failed.
	pub async fn put_attempts(&self, group_name: &str, stream_name: &str) -> Vec<Option<String>> {
		self.put_attempts
			.lock()
			.await
			.get(&(group_name.to_string(), stream_name.to_string()))
			.cloned()
			.unwrap_or_default()
	}
}

#[async_trait]
impl LogTransport for FakeLogTransport {
	async fn create_log_group(&self, group_name: &str) -> Result<(), TransportError> {
		let mut groups = self.groups.lock().await;
		groups.entry(group_name.to_string()).or_default();
		Ok(())
	}

	async fn create_log_stream(&self, group_name: &str, stream_name: &str) -> Result<(), TransportError> {
		let mut groups = self.groups.lock().await;
		let group = groups.entry(group_name.to_string()).or_default();
		group.entry(stream_name.to_string()).or_insert_with(|| FakeStream {
			events: Vec::new(),
			sequence_token: 0,
		});
		Ok(())
	}

	async fn put_log_events(
		&self,
		group_name: &str,
		stream_name: &str,
		sequence_token: Option<String>,
		events: Vec<LogEvent>,
	) -> Result<PutLogEventsOutcome, TransportError> {
		let key = (group_name.to_string(), stream_name.to_string());
		self.put_attempts.lock().await.entry(key.clone()).or_default().push(sequence_token.clone());

		if let Some(failure) = self.pending_put_failures.lock().await.remove(&key) {
			return Err(match failure {
				InjectedPutFailure::InvalidSequenceToken(correct_token) => TransportError::InvalidSequenceToken { correct_token },
				InjectedPutFailure::DataAlreadyAccepted(correct_token) => TransportError::DataAlreadyAccepted { correct_token },
			});
		}

		let mut groups = self.groups.lock().await;
		let stream = groups
			.entry(group_name.to_string())
			.or_default()
			.entry(stream_name.to_string())
			.or_insert_with(|| FakeStream {
				events: Vec::new(),
				sequence_token: 0,
			});
		stream.events.extend(events);
		stream.sequence_token += 1;
		Ok(PutLogEventsOutcome {
			next_sequence_token: Some(stream.sequence_token.to_string()),
		})
	}

	async fn filter_log_events(
		&self,
		group_name: &str,
		next_token: Option<String>,
		start_time_millis: i64,
	) -> Result<FilterLogEventsOutcome, TransportError> {
		let groups = self.groups.lock().await;
		let Some(group) = groups.get(group_name) else {
			return Ok(FilterLogEventsOutcome::default());
		};

		let offset: usize = next_token.as_deref().and_then(|t| t.parse().ok()).unwrap_or(0);
		let mut all: Vec<&LogEvent> = group.values().flat_map(|s| s.events.iter()).collect();
		all.sort_by_key(|e| e.timestamp_millis);
		let matching: Vec<LogEvent> = all
			.into_iter()
			.filter(|e| e.timestamp_millis >= start_time_millis)
			.skip(offset)
			.cloned()
			.collect();

		if matching.is_empty() {
			return Ok(FilterLogEventsOutcome { events: Vec::new(), next_token: None });
		}

		let new_offset = offset + matching.len();
		Ok(FilterLogEventsOutcome {
			events: matching,
			next_token: Some(new_offset.to_string()),
		})
	}
}
