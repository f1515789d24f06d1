use crate::address::LinkAddress;
use crate::protocol::Protocol;

/// Size in bytes of a minimal Ethernet header: dst (6) + src (6) + type (2).
pub const ETHERNET_HEADER_LEN: usize = 14;

/// A decoded Ethernet header.
#[derive(Debug, Clone)]
pub struct EthernetHeader {
	pub dst: LinkAddress,
	pub src: LinkAddress,
	pub ethertype: Protocol,
}

impl EthernetHeader {
	/// Encode to exactly `ETHERNET_HEADER_LEN` bytes.
	pub fn encode(&self) -> Vec<u8> {
		let mut out = Vec::with_capacity(ETHERNET_HEADER_LEN);
		out.extend_from_slice(self.dst.as_bytes());
		out.extend_from_slice(self.src.as_bytes());
		out.extend_from_slice(&self.ethertype.0.to_be_bytes());
		out
	}

	/// Decode from a byte slice at least `ETHERNET_HEADER_LEN` long.
	pub fn decode(bytes: &[u8]) -> Option<EthernetHeader> {
		if bytes.len() < ETHERNET_HEADER_LEN {
			return None;
		}
		let dst = LinkAddress::from_bytes(bytes[0..6].to_vec());
		let src = LinkAddress::from_bytes(bytes[6..12].to_vec());
		let ethertype = Protocol(u16::from_be_bytes([bytes[12], bytes[13]]));
		Some(EthernetHeader { dst, src, ethertype })
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn encode_decode_round_trip() {
		let hdr = EthernetHeader {
			dst: LinkAddress::from_bytes(vec![1, 2, 3, 4, 5, 6]),
			src: LinkAddress::from_bytes(vec![6, 5, 4, 3, 2, 1]),
			ethertype: Protocol::IPV4,
		};
		let encoded = hdr.encode();
		assert_eq!(encoded.len(), ETHERNET_HEADER_LEN);
		let decoded = EthernetHeader::decode(&encoded).unwrap();
		assert_eq!(decoded.dst, hdr.dst);
		assert_eq!(decoded.src, hdr.src);
		assert_eq!(decoded.ethertype, hdr.ethertype);
	}

	#[test]
	fn decode_rejects_short_input() {
		assert!(EthernetHeader::decode(&[0u8; 13]).is_none());
	}
}
