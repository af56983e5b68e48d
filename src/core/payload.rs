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

//! Payload encoding: compression, the singleton/fragmented decision, and recognising decrypted
//! payloads.

use super::{
	crypto::{compress, decompress, hash, hash_parts, sprp_decrypt, sprp_encrypt, SprpKey},
	error::{CapacityError, Error, FormatError},
	fragment::{create_fragments, FragmentView, MessageId},
	routing::{Routing, RoutingType},
	util::{default_boxed_array, read_u16},
	MAX_MESSAGE_SIZE, PAYLOAD_LEN,
};
use arrayref::array_ref;
use log::debug;
use rand::{CryptoRng, Rng};
use subtle::ConstantTimeEq;

pub type Payload = [u8; PAYLOAD_LEN];

/// `length(2) | digest(20)`.
pub const SINGLETON_HEADER_LEN: usize = 2 + 20;
/// `index(3) | digest(20) | message id(20) | message size(4)`.
pub const FRAGMENT_HEADER_LEN: usize = 3 + 20 + 20 + 4;
/// Largest compressed message that fits in one payload.
pub const SINGLETON_CAPACITY: usize = PAYLOAD_LEN - SINGLETON_HEADER_LEN;
/// Bytes of the framed message carried by each fragment.
pub const FRAGMENT_CAPACITY: usize = PAYLOAD_LEN - FRAGMENT_HEADER_LEN;

/// Size of the routing type and length prefix of a framed message.
const FRAMING_LEN: usize = 4;

fn whitening_key() -> SprpKey {
	hash_parts(&[b"WHITEN", b"WHITEN"])
}

/// A message encoded into payloads.
#[derive(Debug)]
pub enum EncodedPayload {
	Singleton(Box<Payload>),
	Fragmented { message_id: MessageId, fragments: Vec<Box<Payload>> },
}

impl EncodedPayload {
	/// Number of packets needed to send the message.
	pub fn len(&self) -> usize {
		match self {
			Self::Singleton(_) => 1,
			Self::Fragmented { fragments, .. } => fragments.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn is_fragmented(&self) -> bool {
		matches!(self, Self::Fragmented { .. })
	}

	pub fn payloads(&self) -> &[Box<Payload>] {
		match self {
			Self::Singleton(payload) => std::slice::from_ref(payload),
			Self::Fragmented { fragments, .. } => fragments,
		}
	}
}

fn singleton_payload(rng: &mut (impl Rng + CryptoRng), compressed: &[u8]) -> Box<Payload> {
	debug_assert!(compressed.len() <= SINGLETON_CAPACITY);
	let mut payload: Box<Payload> = default_boxed_array();
	payload[..2].copy_from_slice(&(compressed.len() as u16).to_be_bytes());
	let end = SINGLETON_HEADER_LEN + compressed.len();
	payload[SINGLETON_HEADER_LEN..end].copy_from_slice(compressed);
	rng.fill_bytes(&mut payload[end..]);
	let digest = hash(&payload[SINGLETON_HEADER_LEN..]);
	payload[2..SINGLETON_HEADER_LEN].copy_from_slice(&digest);
	payload
}

/// Compress `message` and encode it as a singleton if it fits, as fragments otherwise. Fragments
/// carry `delivery` inside the reassembled message, for the node that reassembles them.
pub fn encode_payload(
	rng: &mut (impl Rng + CryptoRng),
	message: &[u8],
	delivery: &Routing,
	log_target: &str,
) -> Result<EncodedPayload, Error> {
	if message.len() > MAX_MESSAGE_SIZE {
		return Err(CapacityError::MessageTooLarge { size: message.len(), max: MAX_MESSAGE_SIZE }
			.into())
	}
	let compressed = compress(message, log_target)?;
	if compressed.len() <= SINGLETON_CAPACITY {
		debug!(target: log_target, "Singleton payload: {} bytes compressed", compressed.len());
		return Ok(EncodedPayload::Singleton(singleton_payload(rng, &compressed)))
	}

	let mut framed = Vec::with_capacity(FRAMING_LEN + delivery.info.len() + compressed.len());
	framed.extend_from_slice(&delivery.kind.0.to_be_bytes());
	framed.extend_from_slice(&(delivery.info.len() as u16).to_be_bytes());
	framed.extend_from_slice(&delivery.info);
	framed.extend_from_slice(&compressed);
	sprp_encrypt(&whitening_key(), &mut framed)?;

	let message_id = hash_parts(&[&delivery.info, &framed]);
	let fragments = create_fragments(rng, &message_id, &framed)?;
	debug!(
		target: log_target,
		"Fragmented payload: {} bytes compressed in {} fragments",
		compressed.len(),
		fragments.len()
	);
	Ok(EncodedPayload::Fragmented { message_id, fragments })
}

/// A decrypted payload in one of the two plaintext shapes.
#[derive(Clone, Copy, Debug)]
pub enum PlaintextPayload<'a> {
	/// Compressed message.
	Singleton(&'a [u8]),
	Fragment(FragmentView<'a>),
}

/// Recognise a fully decrypted payload. Returns [`None`] for anything else, which is the expected
/// outcome for payloads that still have layers of encryption on them.
pub fn decode_plaintext_payload(payload: &Payload) -> Option<PlaintextPayload<'_>> {
	if payload[0] & 0x80 != 0 {
		return FragmentView::new(payload).map(PlaintextPayload::Fragment)
	}
	let len = read_u16(array_ref![payload, 0, 2]) as usize;
	if len > SINGLETON_CAPACITY {
		return None
	}
	let digest = hash(&payload[SINGLETON_HEADER_LEN..]);
	if !bool::from(digest[..].ct_eq(&payload[2..SINGLETON_HEADER_LEN])) {
		return None
	}
	Some(PlaintextPayload::Singleton(&payload[SINGLETON_HEADER_LEN..SINGLETON_HEADER_LEN + len]))
}

/// Unwhiten a reassembled framed message and split it into the delivery routing and the
/// decompressed message.
pub fn decode_framed_message(
	mut framed: Vec<u8>,
	limit: usize,
) -> Result<(Routing, Vec<u8>), Error> {
	sprp_decrypt(&whitening_key(), &mut framed)?;
	if framed.len() < FRAMING_LEN {
		return Err(FormatError::BadReassembly.into())
	}
	let kind = RoutingType(read_u16(array_ref![framed, 0, 2]));
	let info_len = read_u16(array_ref![framed, 2, 2]) as usize;
	let info = framed.get(FRAMING_LEN..FRAMING_LEN + info_len).ok_or(FormatError::BadReassembly)?;
	let routing = Routing { kind, info: info.to_vec() };
	let message = decompress(&framed[FRAMING_LEN + info_len..], limit)?;
	Ok((routing, message))
}
