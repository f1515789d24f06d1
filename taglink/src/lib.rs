//! The Tag-Ring link: smuggles Ethernet/IP frames as base64 tag values on a
//! pair of cloud resources, polled by periodic harvester tasks rather than
//! any push notification. See `link-core` for the endpoint contract this
//! crate implements.

pub mod buffy;
pub mod endpoint;
pub mod ipv4;
pub mod ring;
pub mod tag_link;
pub mod transport;

pub use endpoint::TagLinkEndpoint;
pub use tag_link::{TagLink, TagLinkError, TagStats};
pub use transport::{FakeTagTransport, TagTransport, TransportError};
