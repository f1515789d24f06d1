//! The log-stream link: smuggles Ethernet/IP frames as JSON log events on
//! an append-only log service, polled by independent read/write poller
//! tasks. `bridge` additionally wraps a lower `LinkEndpoint` (a tun/tap
//! device in the demos) to relay between it and the log link.

pub mod bridge;
pub mod endpoint;
pub mod log_link;
pub mod packet_log;
pub mod transport;

pub use bridge::LogLinkBridge;
pub use endpoint::{LogLinkEndpoint, Options};
pub use log_link::{DecodedFrame, LogLink, LogLinkError};
pub use packet_log::{LogCoordinate, PacketLog};
pub use transport::{FakeLogTransport, LogEvent, LogTransport, TransportError};
