use crate::buffy::{Buffy, BuffyError};
use thiserror::Error;

/// The sentinel stored in `last_write_op`/`last_read_op` before any
/// operation has happened.
pub const NO_OP: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	Transmit,
	Receive,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RingError {
	#[error("TagRing: full buffers")]
	Full,
	#[error("TagRing: end of file")]
	Eof,
	#[error(transparent)]
	Buffy(#[from] BuffyError),
}

struct Slot {
	buf: Buffy,
	position: usize,
}

/// A ring of N fixed-capacity `Buffy` slots, directional (`Transmit` or
/// `Receive`). See spec.md §3/§4.5 for the full invariant list; the two
/// load-bearing ones are: `avail` tracks empty slots on Tx and non-empty
/// slots on Rx, and `Replace` only moves `avail` when the stored bytes
/// actually change (idempotent replace is what makes harvester polling
/// correct without separate change-tracking state).
pub struct TagRing {
	slots: Vec<Slot>,
	current: usize,
	direction: Direction,
	avail: usize,
	last_write_op: i64,
	last_read_op: i64,
}

impl TagRing {
	pub fn new(size: usize, slot_capacity: usize, direction: Direction) -> Self {
		let slots = (0..size)
			.map(|i| Slot {
				buf: Buffy::new(slot_capacity),
				position: i,
			})
			.collect();
		let avail = match direction {
			Direction::Transmit => size,
			Direction::Receive => 0,
		};
		TagRing {
			slots,
			current: 0,
			direction,
			avail,
			last_write_op: NO_OP,
			last_read_op: NO_OP,
		}
	}

	pub fn size(&self) -> usize {
		self.slots.len()
	}

	pub fn avail(&self) -> usize {
		self.avail
	}

	pub fn last_write_op(&self) -> i64 {
		self.last_write_op
	}

	pub fn last_read_op(&self) -> i64 {
		self.last_read_op
	}

	pub fn reset(&mut self) {
		self.last_write_op = NO_OP;
		self.last_read_op = NO_OP;
		self.avail = match self.direction {
			Direction::Transmit => self.slots.len(),
			Direction::Receive => 0,
		};
		for slot in &mut self.slots {
			slot.buf.reset();
		}
	}

	/// Rotate so slot `i` is current. Out-of-range is a programming error.
	pub fn seek(&mut self, i: usize) {
		if i >= self.slots.len() {
			panic!("TagRing::seek: out of bounds ring position {}", i);
		}
		self.current = i;
	}

	pub fn slot_len(&self, i: usize) -> usize {
		self.slots[i].buf.len()
	}

	pub fn slot_offset(&self, i: usize) -> usize {
		self.slots[i].buf.offset()
	}

	pub fn slot_encoded_string(&self, i: usize) -> String {
		self.slots[i].buf.encoded_bytes_string()
	}

	pub fn reset_slot(&mut self, i: usize) {
		self.slots[i].buf.reset();
	}

	/// Inject a byte slice into a position in the ring.
	pub fn replace(&mut self, i: usize, p: &[u8]) -> Result<(), RingError> {
		self.seek(i);
		let replaced = self.slots[i].buf.replace(p)?;
		if replaced {
			match self.direction {
				Direction::Transmit => self.avail -= 1,
				Direction::Receive => self.avail += 1,
			}
		}
		Ok(())
	}

	/// Encode `p` into the first empty slot (Tx only).
	pub fn write(&mut self, p: &[u8]) -> Result<usize, RingError> {
		assert_eq!(self.direction, Direction::Transmit, "TagRing: fatal cannot write to a receive ring");

		if self.avail == 0 {
			return Err(RingError::Full);
		}
		let position = self.next_write_slot();
		let n = self.slots[position].buf.write_unencoded(p)?;
		if n > 0 {
			self.last_write_op = position as i64;
			self.avail -= 1;
		}
		Ok(n)
	}

	/// Decode the first non-empty slot into `p` (Rx only).
	pub fn read(&mut self, p: &mut [u8]) -> Result<usize, RingError> {
		assert_eq!(self.direction, Direction::Receive, "TagRing: cannot read from a transmit ring");

		if self.avail == 0 {
			return Err(RingError::Eof);
		}
		let position = self.next_read_slot();
		let decoded = self.slots[position].buf.decoded_bytes()?;
		let n = std::cmp::min(p.len(), decoded.len());
		p[..n].copy_from_slice(&decoded[..n]);
		if n > 0 {
			self.last_read_op = position as i64;
			self.avail -= 1;
		}
		Ok(n)
	}

	fn next_write_slot(&self) -> usize {
		let n = self.slots.len();
		for offset in 0..n {
			let idx = (self.current + offset) % n;
			if self.slots[idx].buf.len() == 0 {
				return idx;
			}
		}
		panic!("TagRing: encountered writable buffer (avail: {}) with no available slots", self.avail);
	}

	fn next_read_slot(&self) -> usize {
		let n = self.slots.len();
		for offset in 0..n {
			let idx = (self.current + offset) % n;
			if self.slots[idx].buf.len() > 0 {
				return idx;
			}
		}
		panic!("TagRing: encountered readable buffer (avail: {}) with no available slots", self.avail);
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn new_tx_ring_starts_full_avail_new_rx_ring_starts_empty_avail() {
		let tx = TagRing::new(8, 255, Direction::Transmit);
		assert_eq!(tx.avail(), 8);
		let rx = TagRing::new(8, 255, Direction::Receive);
		assert_eq!(rx.avail(), 0);
	}

	#[test]
	fn tx_write_decrements_avail_until_full() {
		let mut tx = TagRing::new(8, 255, Direction::Transmit);
		for i in 0..8 {
			tx.write(format!("packet-{i}").as_bytes()).unwrap();
		}
		assert_eq!(tx.avail(), 0);
		let err = tx.write(b"ninth").unwrap_err();
		assert_eq!(err, RingError::Full);
	}

	#[test]
	fn rx_replace_then_read_drains_avail() {
		let mut rx = TagRing::new(8, 255, Direction::Receive);
		rx.replace(0, b"AAAA").unwrap();
		rx.replace(3, b"BBBB").unwrap();
		assert_eq!(rx.avail(), 2);

		let mut buf = [0u8; 255];
		let n1 = rx.read(&mut buf).unwrap();
		assert!(n1 > 0);
		assert_eq!(rx.avail(), 1);
		let n2 = rx.read(&mut buf).unwrap();
		assert!(n2 > 0);
		assert_eq!(rx.avail(), 0);

		let err = rx.read(&mut buf).unwrap_err();
		assert_eq!(err, RingError::Eof);
	}

	#[test]
	fn replace_with_unchanged_bytes_does_not_move_avail() {
		let mut rx = TagRing::new(8, 255, Direction::Receive);
		rx.replace(0, b"AAAA").unwrap();
		assert_eq!(rx.avail(), 1);
		rx.replace(0, b"AAAA").unwrap();
		assert_eq!(rx.avail(), 1);
	}

	#[test]
	#[should_panic]
	fn seek_out_of_range_panics() {
		let mut tx = TagRing::new(8, 255, Direction::Transmit);
		tx.seek(8);
	}

	#[test]
	#[should_panic]
	fn write_on_receive_ring_is_a_programming_error() {
		let mut rx = TagRing::new(8, 255, Direction::Receive);
		let _ = rx.write(b"nope");
	}
}
