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

//! Decoding of delivered messages.
//!
//! An exit node delivers a payload it could not make sense of together with the decoding handle
//! from its routing information. Only the creator of the reply block the handle came from can
//! remove the remaining layers: for every keyring secret that accepts the handle, the decoder
//! regenerates the hop secrets and peels layers until the payload takes one of the two plaintext
//! shapes, or the maximum path length is reached.

use super::{
	armor,
	crypto::{decompress, keystream, sprp_encrypt, sprp_key, PAYLOAD_ENCRYPT},
	error::{Error, FormatError},
	fragment::{FragmentStatus, MessageCollection, MessageId},
	payload::{decode_framed_message, decode_plaintext_payload, Payload, PlaintextPayload},
	replay_filter::ReplayFilter,
	surb::{tag_accepted, tag_stream_key},
	util::default_boxed_array,
	Config, Tag, UserSecret, KEY_LEN, MAX_HOPS, MAX_MESSAGE_SIZE, PAYLOAD_LEN, TAG_LEN,
};
use arrayref::array_ref;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, trace};
use zeroize::Zeroizing;

pub const MESSAGE_ARMOR_TITLE: &str = "TYPE III ANONYMOUS MESSAGE";
const MESSAGE_TYPE: &str = "Message-type";
const DECODING_HANDLE: &str = "Decoding-handle";

/// Armored form of a payload only the holder of `tag`'s secret can decode.
pub fn encrypted_envelope(tag: &Tag, payload: &Payload) -> String {
	let handle = STANDARD.encode(tag);
	armor::encode(
		MESSAGE_ARMOR_TITLE,
		&[(MESSAGE_TYPE, "encrypted"), (DECODING_HANDLE, &handle)],
		&payload[..],
	)
}

/// Armored form of a message an exit node could read.
pub fn plaintext_envelope(text: &str) -> String {
	armor::encode_text(MESSAGE_ARMOR_TITLE, &[(MESSAGE_TYPE, "plaintext")], text)
}

#[derive(Debug, PartialEq, Eq)]
pub enum DecodeOutcome {
	/// A complete message.
	Message(Vec<u8>),
	/// A fragment was stored; the message needs more.
	Incomplete { message_id: MessageId, received: usize, expected: usize },
	/// No keyring secret decodes the message. This is the normal outcome for messages meant for
	/// someone else.
	NotForUs,
	/// The decoding handle has already produced output.
	Replayed,
}

impl From<FragmentStatus> for DecodeOutcome {
	fn from(status: FragmentStatus) -> Self {
		match status {
			FragmentStatus::Complete(message) => Self::Message(message),
			FragmentStatus::Incomplete { message_id, received, expected } =>
				Self::Incomplete { message_id, received, expected },
		}
	}
}

/// Decoder session: partially reassembled messages and consumed decoding handles.
pub struct Decoder {
	log_target: &'static str,
	messages: MessageCollection,
	consumed: ReplayFilter,
}

impl Decoder {
	pub fn new(config: &Config) -> Self {
		Self {
			log_target: config.log_target,
			messages: MessageCollection::new(config.max_pending_messages, config.fragment_ttl),
			consumed: ReplayFilter::new(config.consumed_handles_capacity),
		}
	}

	/// Number of messages waiting for more fragments.
	pub fn pending_messages(&self) -> usize {
		self.messages.len()
	}

	/// Decode the first message block in `text`, trying each of `secrets`.
	pub fn decode(&mut self, text: &str, secrets: &[UserSecret]) -> Result<DecodeOutcome, Error> {
		let block = armor::first_block(text, MESSAGE_ARMOR_TITLE)?;
		match block.header(MESSAGE_TYPE) {
			Some("plaintext") => {
				debug!(target: self.log_target, "Plaintext message; passing through");
				Ok(DecodeOutcome::Message(block.text().into_owned().into_bytes()))
			},
			Some("encrypted") => {
				let handle = block
					.header(DECODING_HANDLE)
					.ok_or(FormatError::MissingHeader(DECODING_HANDLE))?;
				let handle = STANDARD.decode(handle).map_err(FormatError::from)?;
				if handle.len() != TAG_LEN {
					return Err(FormatError::Length {
						what: "decoding handle",
						expected: TAG_LEN,
						actual: handle.len(),
					}
					.into())
				}
				let body = block.decode_body()?;
				if body.len() != PAYLOAD_LEN {
					return Err(FormatError::Length {
						what: "payload",
						expected: PAYLOAD_LEN,
						actual: body.len(),
					}
					.into())
				}
				let mut payload: Box<Payload> = default_boxed_array();
				payload.copy_from_slice(&body);
				self.decode_payload(array_ref![handle, 0, TAG_LEN], &payload, secrets)
			},
			Some(other) => Err(FormatError::UnsupportedMessageType(other.into()).into()),
			None => Err(FormatError::MissingHeader(MESSAGE_TYPE).into()),
		}
	}

	/// Decode a payload delivered with decoding handle `tag`.
	pub fn decode_payload(
		&mut self,
		tag: &Tag,
		payload: &Payload,
		secrets: &[UserSecret],
	) -> Result<DecodeOutcome, Error> {
		if self.consumed.contains(tag) {
			debug!(target: self.log_target, "Decoding handle {:02x?} already used", &tag[..4]);
			return Ok(DecodeOutcome::Replayed)
		}

		let mut candidate: Box<Payload> = default_boxed_array();
		for secret in secrets.iter().filter(|secret| tag_accepted(tag, secret)) {
			let stream =
				Zeroizing::new(keystream(&tag_stream_key(tag, secret), KEY_LEN * MAX_HOPS));
			candidate.copy_from_slice(payload);
			for (layer, key) in stream.chunks_exact(KEY_LEN).enumerate() {
				sprp_encrypt(&sprp_key(key, PAYLOAD_ENCRYPT), &mut candidate[..])?;
				if let Some(plaintext) = decode_plaintext_payload(&candidate) {
					trace!(target: self.log_target, "Payload decoded after {} layers", layer + 1);
					let outcome = self.handle_plaintext(plaintext)?;
					self.consumed.insert(*tag, self.log_target);
					return Ok(outcome)
				}
			}
		}
		trace!(target: self.log_target, "No secret decodes handle {:02x?}", &tag[..4]);
		Ok(DecodeOutcome::NotForUs)
	}

	fn handle_plaintext(&mut self, plaintext: PlaintextPayload) -> Result<DecodeOutcome, Error> {
		match plaintext {
			PlaintextPayload::Singleton(compressed) =>
				Ok(DecodeOutcome::Message(decompress(compressed, MAX_MESSAGE_SIZE)?)),
			PlaintextPayload::Fragment(fragment) => {
				match self.messages.insert_fragment(fragment, self.log_target)? {
					FragmentStatus::Complete(framed) => {
						let (routing, message) = decode_framed_message(framed, MAX_MESSAGE_SIZE)?;
						debug!(
							target: self.log_target,
							"Reassembled {}-byte message for {:?}",
							message.len(),
							routing.kind
						);
						Ok(DecodeOutcome::Message(message))
					},
					status => Ok(status.into()),
				}
			},
		}
	}

	/// Expunge partial messages that have waited too long.
	pub fn cleanup(&mut self) {
		self.messages.cleanup(self.log_target);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::core::{
		crypto::{hash, sprp_decrypt},
		payload::SINGLETON_HEADER_LEN,
		routing::random_tag,
	};

	#[test]
	fn plaintext_passes_through() {
		let mut decoder = Decoder::new(&Config::default());
		let text = format!("From: nobody\n\n{}", plaintext_envelope("Hello\nworld"));
		assert_eq!(
			decoder.decode(&text, &[]).unwrap(),
			DecodeOutcome::Message(b"Hello\nworld".to_vec())
		);
	}

	#[test]
	fn envelope_errors() {
		let mut decoder = Decoder::new(&Config::default());
		assert!(matches!(
			decoder.decode("nothing here", &[]),
			Err(Error::Format(FormatError::MissingArmor(_)))
		));
		let unknown = armor::encode_text(MESSAGE_ARMOR_TITLE, &[(MESSAGE_TYPE, "binary")], "x");
		assert!(matches!(
			decoder.decode(&unknown, &[]),
			Err(Error::Format(FormatError::UnsupportedMessageType(_)))
		));
		let no_handle = armor::encode(MESSAGE_ARMOR_TITLE, &[(MESSAGE_TYPE, "encrypted")], &[0; 8]);
		assert!(matches!(
			decoder.decode(&no_handle, &[]),
			Err(Error::Format(FormatError::MissingHeader(DECODING_HANDLE)))
		));
		let short = armor::encode(
			MESSAGE_ARMOR_TITLE,
			&[(MESSAGE_TYPE, "encrypted"), (DECODING_HANDLE, &STANDARD.encode([1; TAG_LEN]))],
			&[0; 8],
		);
		assert!(matches!(
			decoder.decode(&short, &[]),
			Err(Error::Format(FormatError::Length { what: "payload", .. }))
		));
	}

	#[test]
	fn plaintext_kept_byte_for_byte() {
		let mut decoder = Decoder::new(&Config::default());
		let body = "> you wrote this\nmy answer\n";
		let text = format!("From: nobody\n\n{}", plaintext_envelope(body));
		assert_eq!(
			decoder.decode(&text, &[]).unwrap(),
			DecodeOutcome::Message(body.as_bytes().to_vec())
		);
	}

	#[test]
	fn failed_decode_does_not_consume_handle() {
		let mut rng = rand::thread_rng();
		let secret: UserSecret = [7; 20];
		let tag = loop {
			let tag = random_tag(&mut rng);
			if tag_accepted(&tag, &secret) {
				break tag
			}
		};

		// A singleton with a valid digest whose body is not zlib data
		let mut payload: Box<Payload> = default_boxed_array();
		payload[..2].copy_from_slice(&4u16.to_be_bytes());
		let digest = hash(&payload[SINGLETON_HEADER_LEN..]);
		payload[2..SINGLETON_HEADER_LEN].copy_from_slice(&digest);
		let stream = keystream(&tag_stream_key(&tag, &secret), KEY_LEN);
		sprp_decrypt(&sprp_key(&stream, PAYLOAD_ENCRYPT), &mut payload[..]).unwrap();

		let mut decoder = Decoder::new(&Config::default());
		assert!(decoder.decode_payload(&tag, &payload, &[secret]).is_err());
		assert!(!decoder.consumed.contains(&tag));
		assert!(decoder.decode_payload(&tag, &payload, &[secret]).is_err());
	}

	#[test]
	fn unrelated_secrets() {
		let mut decoder = Decoder::new(&Config::default());
		let payload: Box<Payload> = default_boxed_array();
		let text = encrypted_envelope(&[3; TAG_LEN], &payload);
		let secrets: Vec<UserSecret> = (0..=255).map(|i| [i; 20]).collect();
		assert_eq!(decoder.decode(&text, &secrets).unwrap(), DecodeOutcome::NotForUs);
	}
}
