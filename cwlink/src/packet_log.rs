use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use link_core::{LinkAddress, Protocol};
use serde::{Deserialize, Serialize};

/// The wire format of one log event: the payload and its link-layer framing
/// carried as base64 text, plus a self-describing protocol name. Mirrors
/// original_source's `PacketLog` field-for-field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketLog {
	#[serde(rename = "type")]
	pub protocol: String,
	pub src: String,
	pub dest: String,
	pub header: String,
	pub payload: String,
}

impl PacketLog {
	pub fn encode(protocol: Protocol, src: &LinkAddress, dest: &LinkAddress, header: &[u8], payload: &[u8]) -> Self {
		PacketLog {
			protocol: protocol.name().to_string(),
			src: src.to_text(),
			dest: dest.to_text(),
			header: BASE64.encode(header),
			payload: BASE64.encode(payload),
		}
	}

	pub fn decode_header(&self) -> Result<Vec<u8>, base64::DecodeError> {
		BASE64.decode(&self.header)
	}

	pub fn decode_payload(&self) -> Result<Vec<u8>, base64::DecodeError> {
		BASE64.decode(&self.payload)
	}

	pub fn protocol(&self) -> Protocol {
		Protocol::from_name(&self.protocol)
	}
}

/// Names the log group/stream pair a frame is written to or read from.
/// Log group format: `<net-name>/<remote-link-address>`.
/// Log stream format: `<local-link-address>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogCoordinate {
	pub local: LinkAddress,
	pub remote: LinkAddress,
	pub net_name: String,
}

impl LogCoordinate {
	pub fn new(local: LinkAddress, remote: LinkAddress, net_name: impl Into<String>) -> Self {
		LogCoordinate {
			local,
			remote,
			net_name: net_name.into(),
		}
	}

	pub fn log_group_name(&self) -> String {
		format!("{}/{}", self.net_name, self.remote.to_text_no_colons())
	}

	pub fn log_stream_name(&self) -> String {
		self.local.to_text_no_colons()
	}

	pub fn full_path(&self) -> String {
		format!("{}/{}", self.log_group_name(), self.log_stream_name())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn packet_log_round_trips_through_json() {
		let src = LinkAddress::from_bytes(vec![1, 2, 3, 4, 5, 6]);
		let dest = LinkAddress::from_bytes(vec![6, 5, 4, 3, 2, 1]);
		let pl = PacketLog::encode(Protocol::IPV4, &src, &dest, &[0xaa, 0xbb], b"payload");
		let json = serde_json::to_string(&pl).unwrap();
		assert!(json.contains("\"type\":\"ipv4\""));

		let back: PacketLog = serde_json::from_str(&json).unwrap();
		assert_eq!(back.protocol(), Protocol::IPV4);
		assert_eq!(back.decode_header().unwrap(), vec![0xaa, 0xbb]);
		assert_eq!(back.decode_payload().unwrap(), b"payload");
	}

	#[test]
	fn log_coordinate_naming() {
		let local = LinkAddress::from_bytes(vec![0xaa, 0xbb]);
		let remote = LinkAddress::from_bytes(vec![0xcc, 0xdd]);
		let coord = LogCoordinate::new(local, remote, "net0");
		assert_eq!(coord.log_group_name(), "net0/ccdd");
		assert_eq!(coord.log_stream_name(), "aabb");
		assert_eq!(coord.full_path(), "net0/ccdd/aabb");
	}
}
