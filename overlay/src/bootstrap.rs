use std::env;

use link_core::{LinkAddress, ParseLinkAddressError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootstrapError {
	#[error("missing required environment variable {0}")]
	MissingVar(&'static str),
	#[error("invalid mac address in OL_MAC_ADDR: {0}")]
	InvalidMacAddress(#[from] ParseLinkAddressError),
}

/// The configuration a demo process reads from its environment before
/// standing up a link endpoint, mirroring original_source's
/// `OL_NET_NAME`/`OL_MAC_ADDR`/`OL_IP_ADDR` bootstrap variables. The
/// lambda-runtime bootstrap process itself (polling for invocations,
/// running the wrapped handler) is an out-of-scope external collaborator —
/// this only covers the network-overlay half of that bootstrap.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
	pub net_name: String,
	pub mac_address: LinkAddress,
	pub ip_address: String,
}

impl BootstrapConfig {
	pub fn from_env() -> Result<BootstrapConfig, BootstrapError> {
		let net_name = required_var("OL_NET_NAME")?;
		let mac_raw = required_var("OL_MAC_ADDR")?;
		let ip_address = required_var("OL_IP_ADDR")?;
		let mac_address = LinkAddress::parse_colon_hex(&mac_raw)?;
		Ok(BootstrapConfig { net_name, mac_address, ip_address })
	}
}

fn required_var(name: &'static str) -> Result<String, BootstrapError> {
	env::var(name).map_err(|_| BootstrapError::MissingVar(name))
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn missing_var_reports_its_name() {
		// SAFETY: single-threaded test process, no other test reads this var.
		unsafe {
			env::remove_var("OL_NET_NAME_TEST_PROBE");
		}
		let err = required_var("OL_NET_NAME_TEST_PROBE").unwrap_err();
		assert!(matches!(err, BootstrapError::MissingVar("OL_NET_NAME_TEST_PROBE")));
	}
}
