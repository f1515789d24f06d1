use thiserror::Error;

/// Configuration errors are fatal at setup time and surface before any I/O.
#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("point-to-point endpoint requires a remote link address")]
	MissingRemoteForPointToPoint,
}

/// Errors `LinkEndpoint::write_packet` can return to its caller. Capacity
/// errors are recoverable by the caller (the packet is simply dropped and
/// tx-errors incremented); they are never retried internally.
#[derive(Error, Debug)]
pub enum LinkError {
	#[error("no remote link address in route")]
	MissingRemoteAddress,

	#[error("ring buffers full, packet dropped")]
	Full,

	#[error("buffer over capacity")]
	OverCapacity,

	#[error("transport error: {0}")]
	Transport(String),
}
