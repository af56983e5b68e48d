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

//! Mixnode descriptors and route generation.

use super::{
	crypto::{hash, Hash},
	error::{CapacityError, Error, FormatError},
	header::{PK_ENC_LEN, PK_MAX_DATA_LEN},
	routing::Routing,
	MAX_HOPS,
};
use arrayvec::ArrayVec;
use bitflags::bitflags;
use rand::{seq::SliceRandom, CryptoRng, Rng};
use rsa::{pkcs1::EncodeRsaPublicKey, traits::PublicKeyParts, Oaep, RsaPublicKey};
use sha1::Sha1;
use std::fmt;

/// OAEP label used for every subheader envelope.
pub const OAEP_LABEL: &str =
	"He who would make his own liberty secure, must guard even his enemy from oppression.";

/// OAEP padding (SHA-1, with [`OAEP_LABEL`]) for subheader envelopes.
pub fn oaep_padding() -> Oaep {
	Oaep::new_with_label::<Sha1, _>(OAEP_LABEL)
}

bitflags! {
	/// What a mixnode will do with packets other than relaying them.
	pub struct Capabilities: u8 {
		/// Relays packets. Every usable mixnode does this.
		const RELAY = 0b001;
		/// Delivers single-packet messages by mail.
		const SMTP = 0b010;
		/// Reassembles fragmented messages and delivers them.
		const FRAGMENT = 0b100;
	}
}

/// RSA key that subheaders for a mixnode are encrypted with.
#[derive(Clone)]
pub struct PacketKey {
	key: RsaPublicKey,
	digest: Hash,
}

impl PacketKey {
	/// The modulus must be exactly [`PK_ENC_LEN`] bytes.
	pub fn new(key: RsaPublicKey) -> Result<Self, Error> {
		if key.size() != PK_ENC_LEN {
			return Err(FormatError::Length {
				what: "packet key modulus",
				expected: PK_ENC_LEN,
				actual: key.size(),
			}
			.into())
		}
		let der = key.to_pkcs1_der().map_err(|_| FormatError::BadPublicKey)?;
		let digest = hash(der.as_bytes());
		Ok(Self { key, digest })
	}

	/// Digest of the PKCS#1 encoding of the key. Hops are named by this in routing information.
	pub fn digest(&self) -> &Hash {
		&self.digest
	}

	/// Encrypt at most [`PK_MAX_DATA_LEN`] bytes into a [`PK_ENC_LEN`]-byte envelope.
	pub fn encrypt(&self, rng: &mut (impl Rng + CryptoRng), data: &[u8]) -> Result<Vec<u8>, Error> {
		if data.len() > PK_MAX_DATA_LEN {
			return Err(FormatError::Length {
				what: "envelope plaintext",
				expected: PK_MAX_DATA_LEN,
				actual: data.len(),
			}
			.into())
		}
		let envelope = self.key.encrypt(rng, oaep_padding(), data)?;
		debug_assert_eq!(envelope.len(), PK_ENC_LEN);
		Ok(envelope)
	}
}

impl fmt::Debug for PacketKey {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "PacketKey({:02x?})", &self.digest[..4])
	}
}

/// Index of a mixnode in the directory.
pub type MixnodeIndex = usize;

/// A mixnode as published in the directory.
#[derive(Clone, Debug)]
pub struct Mixnode {
	pub nickname: String,
	pub hostname: String,
	pub port: u16,
	pub packet_key: PacketKey,
	pub capabilities: Capabilities,
}

impl Mixnode {
	/// Routing information for forwarding a packet to this mixnode.
	pub fn routing(&self) -> Routing {
		Routing::forward_host(self.port, self.packet_key.digest(), &self.hostname)
	}
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyErr {
	#[error("The directory has no mixnodes")]
	NoMixnodes,
	#[error("No mixnode offers {0:?}")]
	NoExitNode(Capabilities),
}

/// Picks random routes through the directory.
pub struct RouteGenerator<'directory> {
	mixnodes: &'directory [Mixnode],
}

impl<'directory> RouteGenerator<'directory> {
	pub fn new(mixnodes: &'directory [Mixnode]) -> Result<Self, TopologyErr> {
		if mixnodes.is_empty() {
			return Err(TopologyErr::NoMixnodes)
		}
		Ok(Self { mixnodes })
	}

	pub fn mixnodes(&self) -> &'directory [Mixnode] {
		self.mixnodes
	}

	/// Choose a random mixnode with all of the given capabilities.
	pub fn choose_exit(
		&self,
		rng: &mut impl Rng,
		capabilities: Capabilities,
	) -> Result<MixnodeIndex, TopologyErr> {
		let candidates: Vec<MixnodeIndex> = self
			.mixnodes
			.iter()
			.enumerate()
			.filter(|(_, mixnode)| mixnode.capabilities.contains(capabilities))
			.map(|(index, _)| index)
			.collect();
		candidates.choose(rng).copied().ok_or(TopologyErr::NoExitNode(capabilities))
	}

	/// Generate a random route of `num_hops` mixnodes, ending at `last` if given. The same
	/// mixnode is never used twice in a row unless the directory has only one.
	pub fn gen_route(
		&self,
		rng: &mut impl Rng,
		num_hops: usize,
		last: Option<MixnodeIndex>,
	) -> Result<ArrayVec<MixnodeIndex, MAX_HOPS>, Error> {
		if num_hops == 0 {
			return Err(CapacityError::EmptyPath.into())
		}
		if num_hops > MAX_HOPS {
			return Err(CapacityError::PathTooLong { hops: num_hops, max: MAX_HOPS }.into())
		}

		let mut route = ArrayVec::<MixnodeIndex, MAX_HOPS>::new();
		for i in 0..num_hops {
			let index = match last {
				Some(last) if i == num_hops - 1 => last,
				_ => {
					let mut avoid = ArrayVec::<MixnodeIndex, 2>::new();
					avoid.extend(route.last().copied());
					if i + 2 == num_hops {
						avoid.extend(last);
					}
					self.choose_hop(rng, &avoid)
				},
			};
			route.push(index);
		}
		Ok(route)
	}

	fn choose_hop(&self, rng: &mut impl Rng, avoid: &[MixnodeIndex]) -> MixnodeIndex {
		let candidates: Vec<MixnodeIndex> =
			(0..self.mixnodes.len()).filter(|index| !avoid.contains(index)).collect();
		candidates
			.choose(rng)
			.copied()
			.unwrap_or_else(|| rng.gen_range(0..self.mixnodes.len()))
	}

	pub fn path(&self, route: &[MixnodeIndex]) -> Vec<&'directory Mixnode> {
		route.iter().map(|&index| &self.mixnodes[index]).collect()
	}
}
