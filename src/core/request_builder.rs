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

//! Request builder. This module plugs together route generation, payload encoding, and packet
//! assembly.

use super::{
	error::{CapacityError, Error},
	packet::{build_forward_packet, build_reply_packet, Packet},
	payload::EncodedPayload,
	routing::{Routing, RoutingType},
	surb::{build_surb, Surb},
	topology::{Capabilities, Mixnode, MixnodeIndex, RouteGenerator, TopologyErr},
	UserSecret,
};
use log::{debug, error};
use rand::{CryptoRng, Rng};

/// A packet and the mixnode it should be handed to.
pub struct AddressedPacket {
	pub first_hop: MixnodeIndex,
	pub packet: Box<Packet>,
}

pub struct RequestBuilder<'directory> {
	route_generator: RouteGenerator<'directory>,
	log_target: &'static str,
}

impl<'directory> RequestBuilder<'directory> {
	pub fn new(
		mixnodes: &'directory [Mixnode],
		log_target: &'static str,
	) -> Result<Self, TopologyErr> {
		Ok(Self { route_generator: RouteGenerator::new(mixnodes)?, log_target })
	}

	pub fn mixnodes(&self) -> &'directory [Mixnode] {
		self.route_generator.mixnodes()
	}

	/// Capabilities the exit node for `encoded` must have when delivering with `delivery`.
	fn exit_capabilities(encoded: &EncodedPayload, delivery: &Routing) -> Capabilities {
		if encoded.is_fragmented() {
			Capabilities::RELAY | Capabilities::FRAGMENT
		} else if delivery.kind == RoutingType::SMTP {
			Capabilities::RELAY | Capabilities::SMTP
		} else {
			Capabilities::RELAY
		}
	}

	/// Build one forward packet per payload in `encoded`. Fragments all exit at the same node,
	/// which reassembles them and delivers with the routing embedded in the message.
	pub fn build_forward_packets(
		&self,
		rng: &mut (impl Rng + CryptoRng),
		encoded: &EncodedPayload,
		delivery: &Routing,
		num_hops: usize,
	) -> Result<Vec<AddressedPacket>, Error> {
		if num_hops < 2 {
			return Err(CapacityError::PathTooShort { hops: num_hops, min: 2 }.into())
		}
		if delivery.kind == RoutingType::DROP {
			error!(
				target: self.log_target,
				"Message has no recipients; it will be dropped at the exit"
			);
		}
		let exit_index =
			self.route_generator.choose_exit(rng, Self::exit_capabilities(encoded, delivery))?;
		let exit = if encoded.is_fragmented() { Routing::fragment() } else { delivery.clone() };

		let leg1_hops = num_hops / 2;
		encoded
			.payloads()
			.iter()
			.map(|payload| -> Result<AddressedPacket, Error> {
				let route = self.route_generator.gen_route(rng, num_hops, Some(exit_index))?;
				let path = self.route_generator.path(&route);
				let (leg1, leg2) = path.split_at(leg1_hops);
				let packet = build_forward_packet(rng, payload, leg1, leg2, &exit)?;
				debug!(
					target: self.log_target,
					"Built forward packet via {} to {}",
					path[0].nickname,
					path[path.len() - 1].nickname
				);
				Ok(AddressedPacket { first_hop: route[0], packet })
			})
			.collect()
	}

	/// Build one reply packet per payload in `encoded`, each using one of `surbs`. `num_hops` is
	/// the length of the first leg.
	pub fn build_reply_packets(
		&self,
		rng: &mut (impl Rng + CryptoRng),
		encoded: &EncodedPayload,
		surbs: &[Surb],
		num_hops: usize,
	) -> Result<Vec<AddressedPacket>, Error> {
		if surbs.len() < encoded.len() {
			let (needed, available) = (encoded.len(), surbs.len());
			return Err(Error::NotEnoughReplyBlocks { needed, available })
		}
		encoded
			.payloads()
			.iter()
			.zip(surbs)
			.map(|(payload, surb)| -> Result<AddressedPacket, Error> {
				let route = self.route_generator.gen_route(rng, num_hops, None)?;
				let path = self.route_generator.path(&route);
				let packet = build_reply_packet(rng, payload, &path, surb)?;
				debug!(target: self.log_target, "Built reply packet via {}", path[0].nickname);
				Ok(AddressedPacket { first_hop: route[0], packet })
			})
			.collect()
	}

	/// Build a reply block of `num_hops` hops ending at an SMTP-capable node, which will mail the
	/// reply to `address`.
	pub fn build_surb(
		&self,
		rng: &mut (impl Rng + CryptoRng),
		user_secret: &UserSecret,
		address: &str,
		num_hops: usize,
		expires: u32,
	) -> Result<Surb, Error> {
		let exit_index =
			self.route_generator.choose_exit(rng, Capabilities::RELAY | Capabilities::SMTP)?;
		let route = self.route_generator.gen_route(rng, num_hops, Some(exit_index))?;
		let path = self.route_generator.path(&route);
		let surb = build_surb(rng, &path, user_secret, address, expires)?;
		debug!(
			target: self.log_target,
			"Built {}-hop reply block via {}",
			num_hops,
			path[0].nickname
		);
		Ok(surb)
	}
}
