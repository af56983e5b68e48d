// Copyright 2022 Parity Technologies (UK) Ltd.
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! Message fragmentation and reassembly.
//!
//! A fragment payload is `index | digest | message id | message size | chunk`. The index is 3
//! bytes with the top bit set; the digest covers everything after it. The message is the whitened
//! framed message built by the payload module, split into equal chunks with the last one padded.

use super::{
	crypto::{hash, Hash},
	error::{Error, FormatError},
	payload::{Payload, FRAGMENT_CAPACITY, FRAGMENT_HEADER_LEN},
	util::{default_boxed_array, div_ceil, read_u32},
	MAX_MESSAGE_SIZE, PAYLOAD_LEN,
};
use arrayref::array_ref;
use hashlink::{linked_hash_map, LinkedHashMap};
use log::{debug, trace};
use rand::{CryptoRng, Rng};
use std::{
	collections::BTreeMap,
	time::{Duration, Instant},
};
use subtle::ConstantTimeEq;

pub type MessageId = Hash;

/// Marks the index field of a fragment.
const FRAGMENT_FLAG: u32 = 0x80_0000;
const INDEX_MASK: u32 = 0x7f_ffff;
const MAX_FRAGMENTS: usize = div_ceil_const(MAX_MESSAGE_SIZE, FRAGMENT_CAPACITY);

const fn div_ceil_const(n: usize, d: usize) -> usize {
	(n + d - 1) / d
}

struct FragmentHeader<'a>(&'a mut [u8; PAYLOAD_LEN]);

impl<'a> FragmentHeader<'a> {
	fn set_index(&mut self, index: u32) {
		let index = (FRAGMENT_FLAG | index).to_be_bytes();
		self.0[0..3].copy_from_slice(&index[1..]);
	}

	fn set_message_id(&mut self, id: &MessageId) {
		self.0[23..43].copy_from_slice(id)
	}

	fn set_message_len(&mut self, len: u32) {
		self.0[43..47].copy_from_slice(&len.to_be_bytes())
	}

	/// Must be called last.
	fn set_digest(&mut self) {
		let digest = hash(&self.0[23..]);
		self.0[3..23].copy_from_slice(&digest)
	}
}

/// Split a whitened framed message into fragment payloads.
pub fn create_fragments(
	rng: &mut (impl Rng + CryptoRng),
	message_id: &MessageId,
	message: &[u8],
) -> Result<Vec<Box<Payload>>, Error> {
	let count = div_ceil(message.len(), FRAGMENT_CAPACITY);
	if message.is_empty() || count > MAX_FRAGMENTS {
		return Err(FormatError::Length {
			what: "fragmented message",
			expected: MAX_FRAGMENTS * FRAGMENT_CAPACITY,
			actual: message.len(),
		}
		.into())
	}
	let message_len = message.len() as u32;
	let mut fragments = Vec::with_capacity(count);
	for (index, chunk) in message.chunks(FRAGMENT_CAPACITY).enumerate() {
		let mut payload: Box<Payload> = default_boxed_array();
		payload[FRAGMENT_HEADER_LEN..FRAGMENT_HEADER_LEN + chunk.len()].copy_from_slice(chunk);
		rng.fill_bytes(&mut payload[FRAGMENT_HEADER_LEN + chunk.len()..]);
		let mut header = FragmentHeader(&mut *payload);
		header.set_index(index as u32);
		header.set_message_id(message_id);
		header.set_message_len(message_len);
		header.set_digest();
		fragments.push(payload);
	}
	Ok(fragments)
}

/// A payload recognised as a fragment.
#[derive(Clone, Copy, Debug)]
pub struct FragmentView<'a>(&'a Payload);

impl<'a> FragmentView<'a> {
	/// Returns [`None`] if the payload is not a well-formed fragment.
	pub fn new(payload: &'a Payload) -> Option<Self> {
		if payload[0] & 0x80 == 0 {
			return None
		}
		let digest = hash(&payload[23..]);
		bool::from(digest[..].ct_eq(&payload[3..23])).then_some(Self(payload))
	}

	pub fn index(&self) -> u32 {
		read_u32(&[0, self.0[0], self.0[1], self.0[2]]) & INDEX_MASK
	}

	pub fn message_id(&self) -> &'a MessageId {
		array_ref![self.0, 23, 20]
	}

	/// Size of the whole framed message.
	pub fn message_len(&self) -> u32 {
		read_u32(array_ref![self.0, 43, 4])
	}

	/// Chunk of the message, padding included.
	pub fn chunk(&self) -> &'a [u8] {
		&self.0[FRAGMENT_HEADER_LEN..]
	}

	/// Number of fragments the message was split into.
	pub fn expected_fragments(&self) -> usize {
		div_ceil(self.message_len() as usize, FRAGMENT_CAPACITY)
	}
}

struct IncompleteMessage {
	message_len: u32,
	fragments: BTreeMap<u32, Vec<u8>>,
	expires: Instant,
}

impl IncompleteMessage {
	fn expected_fragments(&self) -> usize {
		div_ceil(self.message_len as usize, FRAGMENT_CAPACITY)
	}

	fn is_complete(&self) -> bool {
		self.fragments.len() == self.expected_fragments()
	}

	fn reconstruct(self) -> Vec<u8> {
		let mut message = Vec::with_capacity(self.fragments.len() * FRAGMENT_CAPACITY);
		// BTreeMap iterates in index order
		for chunk in self.fragments.into_values() {
			message.extend_from_slice(&chunk);
		}
		message.truncate(self.message_len as usize);
		message
	}
}

/// Result of inserting a fragment.
#[derive(Debug, PartialEq, Eq)]
pub enum FragmentStatus {
	/// The fragment completed the message; this is the whitened framed message.
	Complete(Vec<u8>),
	/// More fragments are needed.
	Incomplete { message_id: MessageId, received: usize, expected: usize },
}

/// Manages partial messages, keyed by message id.
pub struct MessageCollection {
	/// In arrival order of the first fragment: oldest messages at the front.
	messages: LinkedHashMap<MessageId, IncompleteMessage>,
	/// Maximum number of partial messages.
	capacity: usize,
	expiration: Duration,
}

impl MessageCollection {
	pub fn new(capacity: usize, expiration: Duration) -> Self {
		debug_assert_ne!(capacity, 0);
		Self { messages: LinkedHashMap::new(), capacity, expiration }
	}

	/// Number of partial messages.
	pub fn len(&self) -> usize {
		self.messages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.messages.is_empty()
	}

	/// Insert a fragment. If it completes its message, the message is removed from the collection
	/// and returned.
	pub fn insert_fragment(
		&mut self,
		fragment: FragmentView,
		log_target: &str,
	) -> Result<FragmentStatus, Error> {
		let index = fragment.index();
		let expected = fragment.expected_fragments();
		if expected == 0 || expected > MAX_FRAGMENTS || index as usize >= expected {
			return Err(FormatError::BadFragment.into())
		}
		let message_id = *fragment.message_id();

		let message = match self.messages.entry(message_id) {
			linked_hash_map::Entry::Occupied(entry) => {
				let message = entry.into_mut();
				if message.message_len != fragment.message_len() {
					return Err(FormatError::BadFragment.into())
				}
				message
			},
			linked_hash_map::Entry::Vacant(entry) => entry.insert(IncompleteMessage {
				message_len: fragment.message_len(),
				fragments: BTreeMap::new(),
				expires: Instant::now() + self.expiration,
			}),
		};
		if message.fragments.insert(index, fragment.chunk().to_vec()).is_some() {
			trace!(target: log_target, "Duplicate fragment {} of {:02x?}", index, &message_id[..4]);
		}
		let received = message.fragments.len();
		trace!(target: log_target, "Inserted fragment {} ({}/{})", index, received, expected);

		if message.is_complete() {
			trace!(target: log_target, "Message complete");
			let message = self
				.messages
				.remove(&message_id)
				.ok_or(FormatError::BadReassembly)?;
			return Ok(FragmentStatus::Complete(message.reconstruct()))
		}

		// Discard the oldest partial message if we are over capacity
		if self.messages.len() > self.capacity {
			debug!(target: log_target, "Too many partial messages; evicting oldest");
			self.messages.pop_front();
		}
		Ok(FragmentStatus::Incomplete { message_id, received, expected })
	}

	/// Perform periodic maintenance. Messages that sit in the collection for too long are expunged.
	pub fn cleanup(&mut self, log_target: &str) {
		let now = Instant::now();
		let count = self.messages.len();
		self.messages.retain(|_, m| m.expires > now);
		let removed = count - self.messages.len();
		if removed > 0 {
			debug!(target: log_target, "Fragment cleanup. Removed {} partial messages", removed)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use itertools::Itertools;
	use rand::RngCore;

	const LOG_TARGET: &str = "typeiii";

	fn message(len: usize) -> Vec<u8> {
		let mut message = vec![0; len];
		rand::thread_rng().fill_bytes(&mut message);
		message
	}

	fn fragments_of(message: &[u8]) -> Vec<Box<Payload>> {
		create_fragments(&mut rand::thread_rng(), &hash(message), message).unwrap()
	}

	#[test]
	fn fragment_count() {
		for (len, count) in [
			(1, 1),
			(FRAGMENT_CAPACITY, 1),
			(FRAGMENT_CAPACITY + 1, 2),
			(40 * 1024, 2),
			(3 * FRAGMENT_CAPACITY, 3),
		] {
			let fragments = fragments_of(&message(len));
			assert_eq!(fragments.len(), count);
			for (i, fragment) in fragments.iter().enumerate() {
				let view = FragmentView::new(fragment).unwrap();
				assert_eq!(view.index(), i as u32);
				assert_eq!(view.message_len(), len as u32);
				assert_eq!(view.expected_fragments(), count);
			}
		}
		assert!(create_fragments(&mut rand::thread_rng(), &[0; 20], &[]).is_err());
	}

	#[test]
	fn any_arrival_order() {
		let message = message(3 * FRAGMENT_CAPACITY - 100);
		let fragments = fragments_of(&message);
		for order in (0..fragments.len()).permutations(fragments.len()) {
			let mut collection = MessageCollection::new(4, Duration::from_secs(60));
			for (n, &i) in order.iter().enumerate() {
				let status = collection
					.insert_fragment(FragmentView::new(&fragments[i]).unwrap(), LOG_TARGET)
					.unwrap();
				if n + 1 < fragments.len() {
					let FragmentStatus::Incomplete { received, expected, .. } = status else {
						panic!("Message completed early")
					};
					assert_eq!((received, expected), (n + 1, 3));
				} else {
					assert_eq!(status, FragmentStatus::Complete(message.clone()));
				}
			}
			assert!(collection.is_empty());
		}
	}

	#[test]
	fn duplicates_do_not_complete() {
		let message = message(FRAGMENT_CAPACITY + 1);
		let fragments = fragments_of(&message);
		let mut collection = MessageCollection::new(4, Duration::from_secs(60));
		let first = FragmentView::new(&fragments[0]).unwrap();
		for _ in 0..3 {
			assert!(matches!(
				collection.insert_fragment(first, LOG_TARGET).unwrap(),
				FragmentStatus::Incomplete { received: 1, expected: 2, .. }
			));
		}
	}

	#[test]
	fn not_a_fragment() {
		let mut payload: Box<Payload> = default_boxed_array();
		assert!(FragmentView::new(&payload).is_none());
		payload[0] = 0x80;
		assert!(FragmentView::new(&payload).is_none());

		let mut fragment = fragments_of(&message(10)).remove(0);
		fragment[PAYLOAD_LEN - 1] ^= 1;
		assert!(FragmentView::new(&fragment).is_none());
	}

	#[test]
	fn eviction_and_cleanup() {
		let mut collection = MessageCollection::new(2, Duration::from_secs(60));
		let messages: Vec<_> =
			(0..3).map(|_| fragments_of(&message(FRAGMENT_CAPACITY * 2))).collect();
		fn view(fragment: &Payload) -> FragmentView<'_> {
			FragmentView::new(fragment).unwrap()
		}
		for fragments in &messages {
			collection.insert_fragment(view(&fragments[0]), LOG_TARGET).unwrap();
		}
		assert_eq!(collection.len(), 2);
		// The first message was evicted, so its second fragment starts over
		assert!(matches!(
			collection.insert_fragment(view(&messages[0][1]), LOG_TARGET).unwrap(),
			FragmentStatus::Incomplete { received: 1, .. }
		));

		let mut collection = MessageCollection::new(2, Duration::from_millis(0));
		collection.insert_fragment(view(&messages[0][0]), LOG_TARGET).unwrap();
		assert_eq!(1, collection.len());
		collection.cleanup(LOG_TARGET);
		assert_eq!(0, collection.len());
	}
}
