use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
#[error("invalid link address {0:?}: expected colon-separated hex octets")]
pub struct ParseLinkAddressError(String);

/// An opaque link-layer address. Typically six bytes (an Ethernet MAC), but
/// nothing here assumes a fixed length beyond `BROADCAST`.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct LinkAddress(Vec<u8>);

impl LinkAddress {
	/// The distinguished all-ones broadcast address.
	pub fn broadcast() -> Self {
		LinkAddress(vec![0xff; 6])
	}

	/// The empty address, used where spec.md calls for "" (unset local/remote).
	pub fn empty() -> Self {
		LinkAddress(Vec::new())
	}

	pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
		LinkAddress(bytes.into())
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn is_broadcast(&self) -> bool {
		*self == LinkAddress::broadcast()
	}

	/// Colon-hex text form, e.g. `aa:bb:cc:dd:ee:ff` — used in `PacketLog`
	/// and wherever the spec calls for a link address rendered as text.
	pub fn to_text(&self) -> String {
		self.0.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(":")
	}

	/// Text form with colons stripped, used to build log group/stream names.
	pub fn to_text_no_colons(&self) -> String {
		self.0.iter().map(|b| format!("{:02x}", b)).collect()
	}

	/// Parse a colon-hex MAC string (`aa:bb:cc:dd:ee:ff`), as accepted from
	/// CLI flags and environment configuration.
	pub fn parse_colon_hex(s: &str) -> Result<LinkAddress, ParseLinkAddressError> {
		let bytes: Result<Vec<u8>, _> = s.split(':').map(|octet| u8::from_str_radix(octet, 16)).collect();
		match bytes {
			Ok(bytes) if !bytes.is_empty() => Ok(LinkAddress(bytes)),
			_ => Err(ParseLinkAddressError(s.to_string())),
		}
	}
}

impl fmt::Debug for LinkAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "LinkAddress({})", self.to_text())
	}
}

impl fmt::Display for LinkAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_text())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn broadcast_is_six_bytes_of_ff() {
		assert_eq!(LinkAddress::broadcast().as_bytes(), &[0xff; 6]);
	}

	#[test]
	fn equality_is_by_byte_content() {
		let a = LinkAddress::from_bytes(vec![1, 2, 3, 4, 5, 6]);
		let b = LinkAddress::from_bytes(vec![1, 2, 3, 4, 5, 6]);
		assert_eq!(a, b);
	}

	#[test]
	fn text_form_strips_colons_when_asked() {
		let a = LinkAddress::from_bytes(vec![0xaa, 0xbb]);
		assert_eq!(a.to_text(), "aa:bb");
		assert_eq!(a.to_text_no_colons(), "aabb");
	}

	#[test]
	fn parse_colon_hex_round_trips_with_to_text() {
		let a = LinkAddress::parse_colon_hex("aa:bb:cc:dd:ee:ff").unwrap();
		assert_eq!(a.to_text(), "aa:bb:cc:dd:ee:ff");
	}

	#[test]
	fn parse_colon_hex_rejects_garbage() {
		assert!(LinkAddress::parse_colon_hex("not-a-mac").is_err());
	}
}
