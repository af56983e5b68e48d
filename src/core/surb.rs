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

//! Single-use reply blocks (SURBs).
//!
//! A SURB is a header leading back to its creator, the address of its first hop, and the
//! end-to-end key the replier encrypts the payload with. Every secret in it is derived from a
//! random decoding handle and one of the creator's keyring secrets, so the creator does not need
//! to remember anything per SURB: the decoder rederives the hop keys from the handle the exit node
//! delivers.

use super::{
	armor,
	crypto::{hash_parts, keystream, Key},
	error::{CapacityError, Error, FormatError},
	header::{build_header, Header, HopSecret},
	routing::{random_tag, Routing, RoutingType},
	topology::Mixnode,
	util::{default_boxed_array, read_u16, read_u32},
	Tag, UserSecret, HASH_LEN, HEADER_LEN, KEY_LEN, MAX_HOPS,
};
use arrayref::{array_ref, array_refs};
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

pub const SURB_ARMOR_TITLE: &str = "TYPE III REPLY BLOCK";
const ARMOR_VERSION: &str = "0.2";
const MAGIC: &[u8; 4] = b"SURB";
const VERSION: [u8; 2] = [0x01, 0x00];
/// `magic | version | expiry | header | routing length | routing type | shared secret`.
const FIXED_LEN: usize = 4 + 2 + 4 + HEADER_LEN + 2 + 2 + KEY_LEN;

/// Acceptance test for a decoding handle. This is a cheap filter, not an authenticator: a
/// handle not made with `secret` passes it one time in 256, and the decoder then finds that no
/// layer count produces a valid payload.
pub fn tag_accepted(tag: &Tag, secret: &UserSecret) -> bool {
	hash_parts(&[tag, secret, b"Validate"])[HASH_LEN - 1] == 0
}

/// Key for the stream the hop secrets of a reply block are taken from.
pub fn tag_stream_key(tag: &Tag, secret: &UserSecret) -> Key {
	let h = hash_parts(&[tag, secret, b"Generate"]);
	*array_ref![h, 0, KEY_LEN]
}

/// A reply block.
#[derive(Clone, PartialEq, Eq)]
pub struct Surb {
	/// Unix time after which the block should not be used.
	pub expires: u32,
	pub header: Box<Header>,
	/// Routing to the first hop of the block. This is a swap routing, as the block is the second
	/// header of a reply packet.
	pub first_hop: Routing,
	/// The replier decrypts the payload with a key derived from this.
	pub shared_secret: Key,
}

impl std::fmt::Debug for Surb {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("Surb")
			.field("expires", &self.expires)
			.field("first_hop", &self.first_hop)
			.finish_non_exhaustive()
	}
}

impl Surb {
	pub fn is_valid_at(&self, now: u32) -> bool {
		now < self.expires
	}

	pub fn to_bytes(&self) -> Vec<u8> {
		let mut bytes = Vec::with_capacity(FIXED_LEN + self.first_hop.info.len());
		bytes.extend_from_slice(MAGIC);
		bytes.extend_from_slice(&VERSION);
		bytes.extend_from_slice(&self.expires.to_be_bytes());
		bytes.extend_from_slice(&self.header[..]);
		bytes.extend_from_slice(&(self.first_hop.info.len() as u16).to_be_bytes());
		bytes.extend_from_slice(&self.first_hop.kind.0.to_be_bytes());
		bytes.extend_from_slice(&self.shared_secret);
		bytes.extend_from_slice(&self.first_hop.info);
		bytes
	}

	/// Parse one block from the start of `bytes`, returning it and the number of bytes consumed.
	pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), FormatError> {
		if bytes.len() < FIXED_LEN {
			return Err(FormatError::Length {
				what: "reply block",
				expected: FIXED_LEN,
				actual: bytes.len(),
			})
		}
		let (magic, version, expires, header, info_len, kind, shared_secret) =
			array_refs![array_ref![bytes, 0, FIXED_LEN], 4, 2, 4, HEADER_LEN, 2, 2, KEY_LEN];
		if magic != MAGIC {
			return Err(FormatError::BadMagic)
		}
		if *version != VERSION {
			return Err(FormatError::UnsupportedVersion(format!("{}.{}", version[0], version[1])))
		}
		let len = FIXED_LEN + read_u16(info_len) as usize;
		let info = bytes.get(FIXED_LEN..len).ok_or(FormatError::Length {
			what: "reply block",
			expected: len,
			actual: bytes.len(),
		})?;
		let mut surb_header: Box<Header> = default_boxed_array();
		surb_header.copy_from_slice(header);
		let surb = Self {
			expires: read_u32(expires),
			header: surb_header,
			first_hop: Routing { kind: RoutingType(read_u16(kind)), info: info.to_vec() },
			shared_secret: *shared_secret,
		};
		Ok((surb, len))
	}

	/// ASCII-armored form, suitable for appending to a message body.
	pub fn armor(&self) -> String {
		armor::encode(SURB_ARMOR_TITLE, &[("Version", ARMOR_VERSION)], &self.to_bytes())
	}

	/// Parse every unquoted reply block in `text`. A block may hold several reply blocks back to
	/// back.
	pub fn parse_all(text: &str) -> Result<Vec<Self>, FormatError> {
		let mut surbs = Vec::new();
		for block in armor::scan(text, SURB_ARMOR_TITLE)? {
			if block.quoted {
				continue
			}
			match block.header("Version") {
				Some(ARMOR_VERSION) => (),
				Some(version) => return Err(FormatError::UnsupportedVersion(version.into())),
				None => return Err(FormatError::MissingHeader("Version")),
			}
			let bytes = block.decode_body()?;
			let mut rest = &bytes[..];
			while !rest.is_empty() {
				let (surb, len) = Self::from_bytes(rest)?;
				surbs.push(surb);
				rest = &rest[len..];
			}
		}
		Ok(surbs)
	}

	/// `text` with every unquoted reply block removed.
	pub fn strip(text: &str) -> Result<String, FormatError> {
		let mut stripped = String::with_capacity(text.len());
		let mut offset = 0;
		for block in armor::scan(text, SURB_ARMOR_TITLE)? {
			if block.quoted {
				continue
			}
			stripped.push_str(&text[offset..block.span.start]);
			offset = block.span.end;
		}
		stripped.push_str(&text[offset..]);
		Ok(stripped)
	}
}

/// Build a reply block over `path`, delivering by mail to `address`. The stream the hop secrets
/// come from is laid out last hop first, with the shared secret after the first hop's.
pub fn build_surb(
	rng: &mut (impl Rng + CryptoRng),
	path: &[&Mixnode],
	user_secret: &UserSecret,
	address: &str,
	expires: u32,
) -> Result<Surb, Error> {
	let num_hops = path.len();
	if num_hops == 0 {
		return Err(CapacityError::EmptyPath.into())
	}
	// The decoder tries MAX_HOPS layers, one of which is the shared secret
	if num_hops > MAX_HOPS - 1 {
		return Err(CapacityError::PathTooLong { hops: num_hops, max: MAX_HOPS - 1 }.into())
	}

	let tag = loop {
		let tag = random_tag(rng);
		if tag_accepted(&tag, user_secret) {
			break tag
		}
	};
	let stream =
		Zeroizing::new(keystream(&tag_stream_key(&tag, user_secret), KEY_LEN * (num_hops + 1)));
	let secrets: Zeroizing<Vec<HopSecret>> = Zeroizing::new(
		(1..=num_hops).map(|i| *array_ref![stream, (num_hops - i) * KEY_LEN, KEY_LEN]).collect(),
	);
	let shared_secret = *array_ref![stream, num_hops * KEY_LEN, KEY_LEN];

	let header = build_header(rng, path, &secrets, &Routing::smtp(&tag, address))?;
	Ok(Surb { expires, header, first_hop: path[0].routing().with_swap(), shared_secret })
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::RngCore;

	fn surb(rng: &mut impl RngCore, info_len: usize) -> Surb {
		let mut header: Box<Header> = default_boxed_array();
		rng.fill_bytes(&mut header[..]);
		let mut info = vec![0; info_len];
		rng.fill_bytes(&mut info);
		let mut shared_secret = [0; KEY_LEN];
		rng.fill_bytes(&mut shared_secret);
		Surb {
			expires: 1_700_000_000,
			header,
			first_hop: Routing { kind: RoutingType::SWAP_FWD_HOST, info },
			shared_secret,
		}
	}

	#[test]
	fn binary_layout() {
		let mut rng = rand::thread_rng();
		let surb = surb(&mut rng, 30);
		let bytes = surb.to_bytes();
		assert_eq!(bytes.len(), FIXED_LEN + 30);
		assert_eq!(&bytes[..6], b"SURB\x01\x00");
		assert_eq!(bytes[4 + 2 + 4 + HEADER_LEN..][..4], [0, 30, 0x00, 0x04]);

		let (parsed, len) = Surb::from_bytes(&bytes).unwrap();
		assert_eq!(len, bytes.len());
		assert_eq!(parsed, surb);

		assert!(matches!(
			Surb::from_bytes(&bytes[..bytes.len() - 1]),
			Err(FormatError::Length { .. })
		));
		let mut bad = bytes.clone();
		bad[0] = b's';
		assert!(matches!(Surb::from_bytes(&bad), Err(FormatError::BadMagic)));
		let mut bad = bytes;
		bad[4] = 2;
		assert!(matches!(Surb::from_bytes(&bad), Err(FormatError::UnsupportedVersion(_))));
	}

	#[test]
	fn armored_in_text() {
		let mut rng = rand::thread_rng();
		let (a, b, quoted) = (surb(&mut rng, 10), surb(&mut rng, 20), surb(&mut rng, 30));
		let quoted_text: String =
			quoted.armor().lines().map(|line| format!("> {}\n", line)).collect();
		let text = format!("Hi,\n{}\nsome text\n{}{}\nBye\n", a.armor(), b.armor(), quoted_text);

		assert_eq!(Surb::parse_all(&text).unwrap(), vec![a, b]);
		let stripped = Surb::strip(&text).unwrap();
		assert_eq!(stripped, format!("Hi,\n\nsome text\n{}\nBye\n", quoted_text));
		assert!(Surb::parse_all(&stripped).unwrap().is_empty());
	}

	#[test]
	fn validity() {
		let surb = surb(&mut rand::thread_rng(), 0);
		assert!(surb.is_valid_at(surb.expires - 1));
		assert!(!surb.is_valid_at(surb.expires));
	}

	#[test]
	fn tags() {
		let mut rng = rand::thread_rng();
		let mut secret = [0; 20];
		rng.fill_bytes(&mut secret);
		let accepted = (0..4096).filter(|_| tag_accepted(&random_tag(&mut rng), &secret)).count();
		// One in 256 on average
		assert!((2..=60).contains(&accepted), "{} accepted", accepted);
	}
}
