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

//! Packet assembly.
//!
//! A packet is two headers followed by a payload. The first header carries the packet along the
//! first leg of its path; at the last hop of the first leg (the swap point) the second header
//! takes its place. Before the first-leg layers are added the second header and the payload are
//! each encrypted with a key derived from the other, so that tampering with either before the
//! swap point destroys both.

use super::{
	crypto::{
		hash, sprp_decrypt, sprp_encrypt, sprp_key, HEADER_ENCRYPT, HIDE_HEADER, HIDE_PAYLOAD,
		PAYLOAD_ENCRYPT,
	},
	error::{CapacityError, Error},
	header::{build_header, Header, HopSecret},
	payload::Payload,
	routing::Routing,
	surb::Surb,
	topology::Mixnode,
	util::default_boxed_array,
	HEADER_LEN, PACKET_LEN, PAYLOAD_LEN,
};
use arrayref::mut_array_refs;
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

pub type Packet = [u8; PACKET_LEN];

pub fn headers_and_payload(packet: &mut Packet) -> (&mut Header, &mut Header, &mut Payload) {
	mut_array_refs![packet, HEADER_LEN, HEADER_LEN, PAYLOAD_LEN]
}

fn gen_secrets(rng: &mut (impl Rng + CryptoRng), num_hops: usize) -> Zeroizing<Vec<HopSecret>> {
	Zeroizing::new(
		(0..num_hops)
			.map(|_| {
				let mut secret = [0; 16];
				rng.fill_bytes(&mut secret);
				secret
			})
			.collect(),
	)
}

/// Hide the second header and payload from each other, then add the first-leg layers.
fn finish_packet(
	h2: &mut Header,
	payload: &mut Payload,
	leg1_secrets: &[HopSecret],
) -> Result<(), Error> {
	sprp_encrypt(&sprp_key(&hash(&payload[..]), HIDE_HEADER), h2)?;
	sprp_encrypt(&sprp_key(&hash(&h2[..]), HIDE_PAYLOAD), payload)?;
	for secret in leg1_secrets.iter().rev() {
		sprp_encrypt(&sprp_key(secret, HEADER_ENCRYPT), h2)?;
		sprp_encrypt(&sprp_key(secret, PAYLOAD_ENCRYPT), payload)?;
	}
	Ok(())
}

/// Build a forward packet to `exit`, along `leg1` and then `leg2`. Both legs must be non-empty.
pub fn build_forward_packet(
	rng: &mut (impl Rng + CryptoRng),
	payload: &Payload,
	leg1: &[&Mixnode],
	leg2: &[&Mixnode],
	exit: &Routing,
) -> Result<Box<Packet>, Error> {
	let swap = leg2.first().ok_or(CapacityError::EmptyPath)?;
	let leg1_secrets = gen_secrets(rng, leg1.len());
	let leg2_secrets = gen_secrets(rng, leg2.len());

	let mut packet: Box<Packet> = default_boxed_array();
	let (h1, h2, p) = headers_and_payload(&mut packet);
	*h1 = *build_header(rng, leg1, &leg1_secrets, &swap.routing().with_swap())?;
	*h2 = *build_header(rng, leg2, &leg2_secrets, exit)?;
	*p = *payload;
	for secret in leg2_secrets.iter().rev() {
		sprp_encrypt(&sprp_key(secret, PAYLOAD_ENCRYPT), p)?;
	}
	finish_packet(h2, p, &leg1_secrets)?;
	Ok(packet)
}

/// Build a reply packet: `leg1` leads to the first hop of `surb`, which supplies the second
/// header. The payload is prepared so that the layers the reply block's hops remove, followed by
/// the creator's decryption with the shared secret, yield `payload`.
pub fn build_reply_packet(
	rng: &mut (impl Rng + CryptoRng),
	payload: &Payload,
	leg1: &[&Mixnode],
	surb: &Surb,
) -> Result<Box<Packet>, Error> {
	let leg1_secrets = gen_secrets(rng, leg1.len());

	let mut packet: Box<Packet> = default_boxed_array();
	let (h1, h2, p) = headers_and_payload(&mut packet);
	*h1 = *build_header(rng, leg1, &leg1_secrets, &surb.first_hop)?;
	*h2 = *surb.header;
	*p = *payload;
	sprp_decrypt(&sprp_key(&surb.shared_secret, PAYLOAD_ENCRYPT), p)?;
	finish_packet(h2, p, &leg1_secrets)?;
	Ok(packet)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hiding_binds_header_and_payload() {
		let mut h2 = [7; HEADER_LEN];
		let mut payload: Box<Payload> = default_boxed_array();
		finish_packet(&mut h2, &mut payload, &[]).unwrap();

		// Undo the hiding the way the swap point does
		let mut undone_h2 = h2;
		let mut undone_payload = payload.clone();
		sprp_decrypt(&sprp_key(&hash(&undone_h2[..]), HIDE_PAYLOAD), &mut undone_payload[..])
			.unwrap();
		sprp_decrypt(&sprp_key(&hash(&undone_payload[..]), HIDE_HEADER), &mut undone_h2).unwrap();
		assert_eq!(undone_h2, [7; HEADER_LEN]);
		assert!(undone_payload.iter().all(|&b| b == 0));

		// A single flipped payload bit garbles the header as well
		let mut tampered_h2 = h2;
		let mut tampered_payload = payload;
		tampered_payload[100] ^= 1;
		sprp_decrypt(&sprp_key(&hash(&tampered_h2[..]), HIDE_PAYLOAD), &mut tampered_payload[..])
			.unwrap();
		sprp_decrypt(&sprp_key(&hash(&tampered_payload[..]), HIDE_HEADER), &mut tampered_h2)
			.unwrap();
		assert_ne!(tampered_h2, [7; HEADER_LEN]);
	}

	#[test]
	fn layout() {
		let mut packet: Box<Packet> = default_boxed_array();
		let (h1, h2, payload) = headers_and_payload(&mut packet);
		h1[0] = 2;
		h2[0] = 3;
		payload[0] = 1;
		assert_eq!(packet[0], 2);
		assert_eq!(packet[HEADER_LEN], 3);
		assert_eq!(packet[2 * HEADER_LEN], 1);
	}
}
