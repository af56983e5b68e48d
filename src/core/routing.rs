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

//! Routing types and the routing information they carry.

use super::{
	crypto::Hash,
	error::FormatError,
	util::read_u16,
	Tag, HASH_LEN, TAG_LEN,
};
use arrayref::array_ref;
use rand::{CryptoRng, Rng};
use std::fmt;

/// Routing type of a subheader. Types below [`RoutingType::MIN_EXIT`] name a next hop; the rest
/// tell the last hop how to deliver.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutingType(pub u16);

impl RoutingType {
	/// Discard the packet.
	pub const DROP: Self = Self(0x0000);
	/// Forward to an IPv4 address.
	pub const FWD_IPV4: Self = Self(0x0001);
	/// Forward to an IPv4 address, swapping headers first.
	pub const SWAP_FWD_IPV4: Self = Self(0x0002);
	/// Forward to a host name.
	pub const FWD_HOST: Self = Self(0x0003);
	/// Forward to a host name, swapping headers first.
	pub const SWAP_FWD_HOST: Self = Self(0x0004);
	/// Lowest exit type.
	pub const MIN_EXIT: Self = Self(0x0100);
	/// Deliver by mail.
	pub const SMTP: Self = Self(0x0100);
	/// Deliver to a mailbox held at the exit node.
	pub const MBOX: Self = Self(0x0101);
	/// Fragment of a larger message; the exit reassembles it.
	pub const FRAGMENT: Self = Self(0x0103);

	pub fn is_exit(self) -> bool {
		self.0 >= Self::MIN_EXIT.0
	}

	pub fn is_swap(self) -> bool {
		self == Self::SWAP_FWD_IPV4 || self == Self::SWAP_FWD_HOST
	}
}

impl fmt::Debug for RoutingType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let name = match *self {
			Self::DROP => "DROP",
			Self::FWD_IPV4 => "FWD_IPV4",
			Self::SWAP_FWD_IPV4 => "SWAP_FWD_IPV4",
			Self::FWD_HOST => "FWD_HOST",
			Self::SWAP_FWD_HOST => "SWAP_FWD_HOST",
			Self::SMTP => "SMTP",
			Self::MBOX => "MBOX",
			Self::FRAGMENT => "FRAGMENT",
			_ => return write!(f, "RoutingType({:#06x})", self.0),
		};
		f.write_str(name)
	}
}

/// Parsed `FWD_HOST`/`SWAP_FWD_HOST` routing information.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostInfo {
	pub port: u16,
	/// Digest of the packet key of the host.
	pub key_digest: Hash,
	pub hostname: String,
}

const HOST_INFO_FIXED_LEN: usize = 2 + HASH_LEN;

/// Routing type plus routing information.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Routing {
	pub kind: RoutingType,
	pub info: Vec<u8>,
}

impl Routing {
	fn host(kind: RoutingType, port: u16, key_digest: &Hash, hostname: &str) -> Self {
		let mut info = Vec::with_capacity(HOST_INFO_FIXED_LEN + hostname.len());
		info.extend_from_slice(&port.to_be_bytes());
		info.extend_from_slice(key_digest);
		info.extend_from_slice(hostname.as_bytes());
		Self { kind, info }
	}

	pub fn forward_host(port: u16, key_digest: &Hash, hostname: &str) -> Self {
		Self::host(RoutingType::FWD_HOST, port, key_digest, hostname)
	}

	/// Mail delivery to `address`. The tag becomes the decoding handle of the delivered message.
	pub fn smtp(tag: &Tag, address: &str) -> Self {
		let mut info = Vec::with_capacity(TAG_LEN + address.len());
		info.extend_from_slice(tag);
		info.extend_from_slice(address.as_bytes());
		Self { kind: RoutingType::SMTP, info }
	}

	pub fn fragment() -> Self {
		Self { kind: RoutingType::FRAGMENT, info: Vec::new() }
	}

	/// Discard at the exit. The routing information is a random tag so that dropped packets look
	/// like delivered ones.
	pub fn drop(rng: &mut (impl Rng + CryptoRng)) -> Self {
		Self { kind: RoutingType::DROP, info: random_tag(rng).to_vec() }
	}

	/// The same next hop, but swapping headers there.
	pub fn with_swap(&self) -> Self {
		let kind = match self.kind {
			RoutingType::FWD_IPV4 => RoutingType::SWAP_FWD_IPV4,
			RoutingType::FWD_HOST => RoutingType::SWAP_FWD_HOST,
			kind => kind,
		};
		Self { kind, info: self.info.clone() }
	}

	/// Decoding handle of exit routing information that carries one.
	pub fn tag(&self) -> Option<&Tag> {
		match self.kind {
			RoutingType::DROP | RoutingType::SMTP | RoutingType::MBOX
				if self.info.len() >= TAG_LEN =>
				Some(array_ref![self.info, 0, TAG_LEN]),
			_ => None,
		}
	}

	/// Delivery address of `SMTP`/`MBOX` routing information.
	pub fn address(&self) -> Option<&str> {
		self.tag()?;
		match self.kind {
			RoutingType::SMTP | RoutingType::MBOX =>
				std::str::from_utf8(&self.info[TAG_LEN..]).ok(),
			_ => None,
		}
	}

	pub fn host_info(&self) -> Result<HostInfo, FormatError> {
		if !matches!(self.kind, RoutingType::FWD_HOST | RoutingType::SWAP_FWD_HOST) ||
			self.info.len() < HOST_INFO_FIXED_LEN
		{
			return Err(FormatError::BadRoutingInfo)
		}
		let hostname = std::str::from_utf8(&self.info[HOST_INFO_FIXED_LEN..])
			.map_err(|_| FormatError::BadRoutingInfo)?;
		Ok(HostInfo {
			port: read_u16(array_ref![self.info, 0, 2]),
			key_digest: *array_ref![self.info, 2, HASH_LEN],
			hostname: hostname.into(),
		})
	}
}

/// Random decoding handle. The top bit is clear so that a handle never looks like the start of
/// a fragment.
pub fn random_tag(rng: &mut (impl Rng + CryptoRng)) -> Tag {
	let mut tag = [0; TAG_LEN];
	rng.fill_bytes(&mut tag);
	tag[0] &= 0x7f;
	tag
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn host_routing() {
		let digest = [7; HASH_LEN];
		let routing = Routing::forward_host(48099, &digest, "mix.example.org");
		assert_eq!(routing.kind, RoutingType::FWD_HOST);
		assert_eq!(routing.info.len(), 2 + HASH_LEN + 15);
		assert_eq!(routing.info[..2], [0xbb, 0xe3]);

		let swapped = routing.with_swap();
		assert_eq!(swapped.kind, RoutingType::SWAP_FWD_HOST);
		assert!(swapped.kind.is_swap() && !swapped.kind.is_exit());
		assert_eq!(
			swapped.host_info().unwrap(),
			HostInfo { port: 48099, key_digest: digest, hostname: "mix.example.org".into() }
		);
		assert!(Routing::fragment().host_info().is_err());
	}

	#[test]
	fn exit_routing() {
		let mut rng = rand::thread_rng();
		for _ in 0..64 {
			assert_eq!(random_tag(&mut rng)[0] & 0x80, 0);
		}

		let tag = random_tag(&mut rng);
		let smtp = Routing::smtp(&tag, "alice@example.org");
		assert!(smtp.kind.is_exit());
		assert_eq!(smtp.tag(), Some(&tag));
		assert_eq!(smtp.address(), Some("alice@example.org"));

		let dropped = Routing::drop(&mut rng);
		assert!(dropped.tag().is_some());
		assert_eq!(dropped.address(), None);
		assert_eq!(Routing::fragment().tag(), None);
		assert_eq!(format!("{:?}", RoutingType(0x0200)), "RoutingType(0x0200)");
	}
}
