//! Glue for the demo binaries: environment-variable bootstrap
//! configuration and stand-in `Dispatcher`s that take the place of the
//! out-of-scope user-space TCP/IP stack above a link endpoint.

pub mod bootstrap;
pub mod dispatcher;
pub mod virtual_endpoint;

pub use bootstrap::{BootstrapConfig, BootstrapError};
pub use dispatcher::{LoggingDispatcher, LoopbackDispatcher};
pub use virtual_endpoint::VirtualEndpoint;
