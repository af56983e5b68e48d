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

//! Hashing, keystream generation, the LIONESS wide-block permutation, and compression.

use super::{
	error::{CapacityError, Error, FormatError},
	HASH_LEN, KEY_LEN,
};
use aes::Aes128;
use arrayref::{array_mut_ref, array_ref};
use ctr::cipher::{KeyIvInit, StreamCipher};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use log::warn;
use sha1::{Digest, Sha1};
use std::io::{Read, Write};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// SHA-1 digest.
pub type Hash = [u8; HASH_LEN];
/// AES-128 key for the keystream generator.
pub type Key = [u8; KEY_LEN];
/// Key for the wide-block permutation.
pub type SprpKey = [u8; HASH_LEN];

pub const RANDOM_JUNK: &[u8] = b"RANDOM JUNK";
pub const HEADER_SECRET_KEY: &[u8] = b"HEADER SECRET KEY";
pub const HEADER_ENCRYPT: &[u8] = b"HEADER ENCRYPT";
pub const PAYLOAD_ENCRYPT: &[u8] = b"PAYLOAD ENCRYPT";
pub const HIDE_HEADER: &[u8] = b"HIDE HEADER";
pub const HIDE_PAYLOAD: &[u8] = b"HIDE PAYLOAD";

/// Size of the hashed (left) side of the wide-block permutation. Inputs must be at least this big.
pub const SPRP_LEFT_LEN: usize = HASH_LEN;

/// First two bytes of a zlib stream produced at the best compression level.
const ZLIB_BEST_HEADER: [u8; 2] = [0x78, 0xda];

////////////////////////////////////////////////////////////////////////////////
// Hashing and key derivation
////////////////////////////////////////////////////////////////////////////////

pub fn hash(data: &[u8]) -> Hash {
	Sha1::digest(data).into()
}

/// Hash of the concatenation of `parts`.
pub fn hash_parts(parts: &[&[u8]]) -> Hash {
	let mut h = Sha1::new();
	for part in parts {
		h.update(part);
	}
	h.finalize().into()
}

/// Derive a keystream key for some purpose from a secret.
pub fn subkey(secret: &[u8], phrase: &[u8]) -> Key {
	let h = hash_parts(&[secret, phrase]);
	*array_ref![h, 0, KEY_LEN]
}

/// Derive a wide-block permutation key for some purpose from a secret.
pub fn sprp_key(secret: &[u8], phrase: &[u8]) -> SprpKey {
	hash_parts(&[secret, phrase])
}

////////////////////////////////////////////////////////////////////////////////
// Keystream
////////////////////////////////////////////////////////////////////////////////

/// XOR `data` with the AES-128-CTR keystream for `key`. The counter starts at zero and is
/// incremented as a big-endian 128-bit integer.
pub fn apply_keystream(data: &mut [u8], key: &Key) {
	// Keys are only ever used for one stream, so a zero IV is fine
	let mut c = Aes128Ctr::new(key.into(), &[0; 16].into());
	c.apply_keystream(data);
}

pub fn keystream(key: &Key, len: usize) -> Vec<u8> {
	let mut stream = vec![0; len];
	apply_keystream(&mut stream, key);
	stream
}

pub fn xor_in_place(data: &mut [u8], other: &[u8]) -> Result<(), FormatError> {
	if data.len() != other.len() {
		return Err(FormatError::XorLengthMismatch { left: data.len(), right: other.len() })
	}
	for (d, o) in data.iter_mut().zip(other) {
		*d ^= *o;
	}
	Ok(())
}

////////////////////////////////////////////////////////////////////////////////
// LIONESS
////////////////////////////////////////////////////////////////////////////////

fn lioness_keys(key: &SprpKey) -> [SprpKey; 4] {
	let mut keys = [*key; 4];
	for (i, k) in keys.iter_mut().enumerate() {
		k[HASH_LEN - 1] ^= i as u8;
	}
	keys
}

fn split(data: &mut [u8]) -> Result<(&mut [u8; SPRP_LEFT_LEN], &mut [u8]), FormatError> {
	if data.len() < SPRP_LEFT_LEN {
		return Err(FormatError::SprpInputTooShort(data.len()))
	}
	let (left, right) = data.split_at_mut(SPRP_LEFT_LEN);
	Ok((array_mut_ref![left, 0, SPRP_LEFT_LEN], right))
}

/// Stream cipher round: encrypt `right` under a key derived from `left`.
fn stream_round(right: &mut [u8], key: &SprpKey, left: &[u8; SPRP_LEFT_LEN]) {
	let h = hash_parts(&[key, left, key]);
	apply_keystream(right, array_ref![h, 0, KEY_LEN]);
}

/// Hash round: XOR `left` with a keyed hash of `right`.
fn hash_round(left: &mut [u8; SPRP_LEFT_LEN], key: &SprpKey, right: &[u8]) {
	let h = hash_parts(&[key, right, key]);
	for (l, h) in left.iter_mut().zip(&h) {
		*l ^= *h;
	}
}

/// Apply the LIONESS permutation to `data` in place. Changing any bit of the input changes the
/// whole output.
pub fn sprp_encrypt(key: &SprpKey, data: &mut [u8]) -> Result<(), FormatError> {
	let [k1, k2, k3, k4] = lioness_keys(key);
	let (left, right) = split(data)?;
	stream_round(right, &k1, left);
	hash_round(left, &k2, right);
	stream_round(right, &k3, left);
	hash_round(left, &k4, right);
	Ok(())
}

/// Inverse of [`sprp_encrypt`].
pub fn sprp_decrypt(key: &SprpKey, data: &mut [u8]) -> Result<(), FormatError> {
	let [k1, k2, k3, k4] = lioness_keys(key);
	let (left, right) = split(data)?;
	hash_round(left, &k4, right);
	stream_round(right, &k3, left);
	hash_round(left, &k2, right);
	stream_round(right, &k1, left);
	Ok(())
}

////////////////////////////////////////////////////////////////////////////////
// Compression
////////////////////////////////////////////////////////////////////////////////

pub fn compress(data: &[u8], log_target: &str) -> Result<Vec<u8>, Error> {
	let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
	encoder.write_all(data).map_err(Error::Compression)?;
	let compressed = encoder.finish().map_err(Error::Compression)?;
	if !compressed.starts_with(&ZLIB_BEST_HEADER) {
		warn!(
			target: log_target,
			"Unexpected zlib header {:02x?}",
			&compressed[..compressed.len().min(ZLIB_BEST_HEADER.len())]
		);
	}
	Ok(compressed)
}

/// Decompress a zlib stream, refusing to produce more than `limit` bytes. Trailing bytes after
/// the end of the stream are ignored.
pub fn decompress(data: &[u8], limit: usize) -> Result<Vec<u8>, Error> {
	let mut out = Vec::new();
	ZlibDecoder::new(data)
		.take(limit as u64 + 1)
		.read_to_end(&mut out)
		.map_err(Error::Compression)?;
	if out.len() > limit {
		return Err(CapacityError::MessageTooLarge { size: out.len(), max: limit }.into())
	}
	Ok(out)
}
