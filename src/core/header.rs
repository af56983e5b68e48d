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

//! Onion header construction.
//!
//! A header is a chain of subheaders, one per hop, followed by random padding. Each subheader is
//! `version | hop secret | digest | routing length | routing type | routing info`. The first
//! [`PK_MAX_DATA_LEN`] bytes of a hop's subheader plus everything after it are RSA encrypted for
//! that hop; the remainder is encrypted with a keystream derived from the hop secret. As each hop
//! strips its subheader it appends junk to keep the header size fixed. The digest in each
//! subheader covers the rest of the header as that hop will see it, junk included, so the junk
//! each hop will add has to be computed up front.

use super::{
	crypto::{
		apply_keystream, hash_parts, keystream, subkey, xor_in_place, Key, HEADER_SECRET_KEY,
		RANDOM_JUNK,
	},
	error::{CapacityError, Error, FormatError},
	routing::Routing,
	topology::Mixnode,
	util::default_boxed_array,
	HASH_LEN, HEADER_LEN, KEY_LEN, MAX_HOPS,
};
use rand::{CryptoRng, Rng};

pub type Header = [u8; HEADER_LEN];
/// Secret shared between the sender and one hop.
pub type HopSecret = [u8; KEY_LEN];

/// Size of an RSA envelope.
pub const PK_ENC_LEN: usize = 256;
/// Envelope expansion due to OAEP padding.
pub const PK_OVERHEAD_LEN: usize = 42;
/// Maximum plaintext that fits in an envelope.
pub const PK_MAX_DATA_LEN: usize = PK_ENC_LEN - PK_OVERHEAD_LEN;
/// Size of a subheader with empty routing information.
pub const MIN_SUBHEADER_LEN: usize = 2 + KEY_LEN + HASH_LEN + 2 + 2;
pub const SUBHEADER_VERSION: [u8; 2] = [0x00, 0x03];
/// Offset of the digest within a subheader.
pub const DIGEST_OFFSET: usize = 2 + KEY_LEN;

/// Space a hop with the given routing information takes up in a header.
fn hop_size(routing: &Routing) -> usize {
	routing.info.len() + MIN_SUBHEADER_LEN + PK_OVERHEAD_LEN
}

/// Subheader with an all-zero digest.
fn subheader(secret: &HopSecret, routing: &Routing) -> Vec<u8> {
	let mut sh = Vec::with_capacity(MIN_SUBHEADER_LEN + routing.info.len() + HEADER_LEN);
	sh.extend_from_slice(&SUBHEADER_VERSION);
	sh.extend_from_slice(secret);
	sh.extend_from_slice(&[0; HASH_LEN]);
	// hop_size() checks keep this below HEADER_LEN
	sh.extend_from_slice(&(routing.info.len() as u16).to_be_bytes());
	sh.extend_from_slice(&routing.kind.0.to_be_bytes());
	sh.extend_from_slice(&routing.info);
	sh
}

/// Check that hops of the given sizes fit in a header. Every hop but the last must leave room
/// for at least one envelope after itself, otherwise the next hop would have nothing to decrypt.
fn check_capacity(sizes: &[usize]) -> Result<(), CapacityError> {
	let total: usize = sizes.iter().sum();
	if total > HEADER_LEN {
		return Err(CapacityError::HeaderOverflow { needed: total, available: HEADER_LEN })
	}
	let all_but_last: usize = sizes[..sizes.len() - 1].iter().sum();
	if all_but_last > HEADER_LEN - PK_ENC_LEN {
		return Err(CapacityError::HeaderOverflow {
			needed: all_but_last + PK_ENC_LEN,
			available: HEADER_LEN,
		})
	}
	Ok(())
}

/// `junks[i]` is the junk appended to the header by the hops before hop `i`.
fn compute_junks(
	secrets: &[HopSecret],
	header_keys: &[Key],
	sizes: &[usize],
) -> Result<Vec<Vec<u8>>, FormatError> {
	let mut junks = Vec::with_capacity(secrets.len());
	junks.push(Vec::new());
	for i in 0..secrets.len() - 1 {
		let prev = &junks[i];
		let offset = HEADER_LEN - PK_ENC_LEN - prev.len();
		let mut junk = Vec::with_capacity(prev.len() + sizes[i]);
		junk.extend_from_slice(prev);
		junk.extend_from_slice(&keystream(&subkey(&secrets[i], RANDOM_JUNK), sizes[i]));
		let stream = keystream(&header_keys[i], HEADER_LEN + sizes[i]);
		xor_in_place(&mut junk, &stream[offset..offset + prev.len() + sizes[i]])?;
		junks.push(junk);
	}
	Ok(junks)
}

/// Build a header for `path`. Hop `i` forwards to hop `i + 1`; the last hop uses `exit`.
pub fn build_header(
	rng: &mut (impl Rng + CryptoRng),
	path: &[&Mixnode],
	secrets: &[HopSecret],
	exit: &Routing,
) -> Result<Box<Header>, Error> {
	if path.is_empty() {
		return Err(CapacityError::EmptyPath.into())
	}
	if path.len() > MAX_HOPS {
		return Err(CapacityError::PathTooLong { hops: path.len(), max: MAX_HOPS }.into())
	}
	if secrets.len() != path.len() {
		return Err(FormatError::Length {
			what: "hop secret list",
			expected: path.len(),
			actual: secrets.len(),
		}
		.into())
	}

	let routing: Vec<Routing> = path[1..]
		.iter()
		.map(|mixnode| mixnode.routing())
		.chain(std::iter::once(exit.clone()))
		.collect();
	let sizes: Vec<usize> = routing.iter().map(hop_size).collect();
	check_capacity(&sizes)?;
	let total: usize = sizes.iter().sum();

	let header_keys: Vec<Key> =
		secrets.iter().map(|secret| subkey(secret, HEADER_SECRET_KEY)).collect();
	let junks = compute_junks(secrets, &header_keys, &sizes)?;

	let mut next = vec![0; HEADER_LEN - total];
	rng.fill_bytes(&mut next);
	for i in (0..path.len()).rev() {
		let mut sh = subheader(&secrets[i], &routing[i]);
		sh.extend_from_slice(&next);
		// check_capacity() guarantees at least PK_MAX_DATA_LEN bytes here
		let (front, rest) = sh.split_at_mut(PK_MAX_DATA_LEN);
		apply_keystream(rest, &header_keys[i]);
		let digest = hash_parts(&[rest, &junks[i]]);
		front[DIGEST_OFFSET..DIGEST_OFFSET + HASH_LEN].copy_from_slice(&digest);

		let mut encrypted = path[i].packet_key.encrypt(rng, front)?;
		encrypted.extend_from_slice(rest);
		next = encrypted;
	}

	if next.len() != HEADER_LEN {
		return Err(FormatError::Length { what: "header", expected: HEADER_LEN, actual: next.len() }
			.into())
	}
	let mut header: Box<Header> = default_boxed_array();
	header.copy_from_slice(&next);
	Ok(header)
}
