use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuffyError {
	#[error("Buffy: over capacity")]
	OverCapacity,
	#[error("Buffy: end of file")]
	Eof,
}

/// A bounded byte container holding base64-encoded bytes, with a read
/// cursor. `Replace` is byte-equal-idempotent — that idempotence is the
/// hook `TagRing`'s harvesters use to detect "did this tag value change?"
/// without any external bookkeeping. See spec.md §4.5.
#[derive(Debug)]
pub struct Buffy {
	offset: usize,
	capacity: usize,
	encoded: Vec<u8>,
}

impl Buffy {
	pub fn new(capacity: usize) -> Self {
		Buffy {
			offset: 0,
			capacity,
			encoded: Vec::with_capacity(capacity),
		}
	}

	/// Append `base64(p)` to the encoded buffer.
	pub fn write_unencoded(&mut self, p: &[u8]) -> Result<usize, BuffyError> {
		let encoded = BASE64.encode(p);
		self.write(encoded.as_bytes())
	}

	/// Append `p` raw (already encoded) to the encoded buffer.
	pub fn write(&mut self, p: &[u8]) -> Result<usize, BuffyError> {
		let m = self.encoded.len();
		if p.len() > self.capacity - m {
			return Err(BuffyError::OverCapacity);
		}
		self.encoded.extend_from_slice(p);
		Ok(p.len())
	}

	/// Read the remainder and base64-decode it.
	pub fn decoded_bytes(&mut self) -> Result<Vec<u8>, BuffyError> {
		let mut buf = vec![0u8; self.encoded.len()];
		let n = self.read(&mut buf)?;
		BASE64.decode(&buf[..n]).map_err(|_| BuffyError::Eof)
	}

	fn is_empty(&self) -> bool {
		self.encoded.len() <= self.offset
	}

	pub fn encoded_bytes(&self) -> &[u8] {
		&self.encoded
	}

	pub fn encoded_bytes_string(&self) -> String {
		String::from_utf8_lossy(&self.encoded).into_owned()
	}

	pub fn reset(&mut self) {
		self.encoded.clear();
		self.offset = 0;
	}

	/// Clears and writes `p` raw, but only if `p` differs from the current
	/// encoded contents. Returns whether a replacement occurred.
	pub fn replace(&mut self, p: &[u8]) -> Result<bool, BuffyError> {
		if p == self.encoded.as_slice() {
			return Ok(false);
		}
		self.reset();
		self.write(p)?;
		Ok(true)
	}

	pub fn len(&self) -> usize {
		self.encoded.len() - self.offset
	}

	pub fn offset(&self) -> usize {
		self.offset
	}

	/// Reads up to `p.len()` bytes, advancing the cursor. Returns `Eof`
	/// (and resets the cursor to 0) once the buffer is exhausted.
	pub fn read(&mut self, p: &mut [u8]) -> Result<usize, BuffyError> {
		if self.is_empty() {
			self.reset();
			if p.is_empty() {
				return Ok(0);
			}
			return Err(BuffyError::Eof);
		}
		let n = std::cmp::min(p.len(), self.encoded.len() - self.offset);
		p[..n].copy_from_slice(&self.encoded[self.offset..self.offset + n]);
		self.offset += n;
		Ok(n)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn write_unencoded_then_decode_round_trips() {
		let mut b = Buffy::new(64);
		b.write_unencoded(b"hello world").unwrap();
		assert_eq!(b.decoded_bytes().unwrap(), b"hello world");
	}

	#[test]
	fn over_capacity_write_leaves_state_unchanged() {
		let mut b = Buffy::new(4);
		let before = b.encoded_bytes().to_vec();
		let err = b.write_unencoded(b"way too long for four bytes").unwrap_err();
		assert_eq!(err, BuffyError::OverCapacity);
		assert_eq!(b.encoded_bytes(), before.as_slice());
	}

	#[test]
	fn replace_with_equal_contents_is_a_no_op() {
		let mut b = Buffy::new(64);
		b.write(b"AAAA").unwrap();
		let replaced = b.replace(b"AAAA").unwrap();
		assert!(!replaced);
		assert_eq!(b.offset(), 0);
	}

	#[test]
	fn replace_with_different_contents_replaces() {
		let mut b = Buffy::new(64);
		b.write(b"AAAA").unwrap();
		let replaced = b.replace(b"BBBB").unwrap();
		assert!(replaced);
		assert_eq!(b.encoded_bytes(), b"BBBB");
	}

	#[test]
	fn read_to_exhaustion_then_eof() {
		let mut b = Buffy::new(64);
		b.write(b"AAAA").unwrap();
		let mut out = [0u8; 4];
		assert_eq!(b.read(&mut out).unwrap(), 4);
		let err = b.read(&mut out).unwrap_err();
		assert_eq!(err, BuffyError::Eof);
		assert_eq!(b.len(), 0);
	}
}
