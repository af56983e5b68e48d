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

//! Test utilities: a small directory of mixnodes with known private keys, and a relay that pushes
//! packets through them the way real mixnodes would.

#![allow(dead_code)]

use rsa::RsaPrivateKey;
use std::{sync::OnceLock, time::Duration};
use typeiii::{
	core::{
		apply_keystream, decode_framed_message, decode_plaintext_payload, decompress,
		encrypted_envelope, hash, headers_and_payload, keystream, oaep_padding,
		plaintext_envelope, sprp_decrypt, sprp_key, subkey, FragmentStatus, Header,
		MessageCollection, Packet, PlaintextPayload, HASH_LEN, HEADER_ENCRYPT, HEADER_LEN,
		HEADER_SECRET_KEY, HIDE_HEADER, HIDE_PAYLOAD, KEY_LEN, MAX_MESSAGE_SIZE, PAYLOAD_ENCRYPT,
		PK_ENC_LEN, RANDOM_JUNK, SUBHEADER_VERSION,
	},
	traits::{Directory, MessageSink, PacketSender, SendError},
	Capabilities, Mixnode, PacketKey, Routing, RoutingType,
};

pub const LOG_TARGET: &str = "typeiii_test";
pub const NUM_MIXNODES: usize = 5;

pub fn init_logging() {
	let _ = env_logger::builder().is_test(true).try_init();
}

/// Mixnodes and their private keys. Nodes 3 and 4 can deliver mail and reassemble fragments.
pub struct Network {
	pub mixnodes: Vec<Mixnode>,
	keys: Vec<RsaPrivateKey>,
}

/// Key generation is slow, so every test in a binary shares one network.
pub fn network() -> &'static Network {
	static NETWORK: OnceLock<Network> = OnceLock::new();
	NETWORK.get_or_init(|| {
		let mut rng = rand::thread_rng();
		let keys: Vec<RsaPrivateKey> = (0..NUM_MIXNODES)
			.map(|_| RsaPrivateKey::new(&mut rng, 2048).expect("Key generation should succeed"))
			.collect();
		let mixnodes = keys
			.iter()
			.enumerate()
			.map(|(i, key)| Mixnode {
				nickname: format!("mix{i}"),
				hostname: format!("mix{i}.example.org"),
				port: 48099,
				packet_key: PacketKey::new(key.to_public_key()).unwrap(),
				capabilities: if i >= 3 { Capabilities::all() } else { Capabilities::RELAY },
			})
			.collect();
		Network { mixnodes, keys }
	})
}

impl Network {
	fn index_of(&self, routing: &Routing) -> usize {
		let info = routing.host_info().unwrap();
		self.mixnodes
			.iter()
			.position(|mixnode| mixnode.packet_key.digest() == &info.key_digest)
			.expect("Routing should name a known mixnode")
	}
}

/// Directory view of the shared network.
pub struct TestDirectory(pub &'static Network);

impl Directory for TestDirectory {
	fn mixnodes(&self) -> &[Mixnode] {
		&self.0.mixnodes
	}
}

/// What an exit node did with a packet.
#[derive(Debug, PartialEq, Eq)]
pub enum Delivery {
	/// Mailed `text` (an armored message) to `address`.
	Mail { address: String, text: String },
	/// Stored a fragment; the message is not yet complete.
	Stored,
	Dropped,
}

/// Remove the outer subheader of `header` as mixnode `index`, returning the hop secret, the
/// routing, and the header for the next hop.
pub fn peel_header(
	network: &Network,
	index: usize,
	header: &Header,
) -> ([u8; KEY_LEN], Routing, Box<Header>) {
	let front = network.keys[index].decrypt(oaep_padding(), &header[..PK_ENC_LEN]).unwrap();
	assert_eq!(front[..2], SUBHEADER_VERSION);
	let secret: [u8; KEY_LEN] = front[2..2 + KEY_LEN].try_into().unwrap();
	assert_eq!(front[18..18 + HASH_LEN], hash(&header[PK_ENC_LEN..]), "Header digest mismatch");
	let info_len = u16::from_be_bytes([front[38], front[39]]) as usize;
	let kind = RoutingType(u16::from_be_bytes([front[40], front[41]]));

	let hop_size = info_len + 42 + 42;
	let mut rest = header[PK_ENC_LEN..].to_vec();
	rest.extend_from_slice(&keystream(&subkey(&secret, RANDOM_JUNK), hop_size));
	apply_keystream(&mut rest, &subkey(&secret, HEADER_SECRET_KEY));
	let mut full = front;
	full.extend_from_slice(&rest);

	let routing = Routing { kind, info: full[42..42 + info_len].to_vec() };
	let mut next = Box::new([0; HEADER_LEN]);
	next.copy_from_slice(&full[42 + info_len..]);
	(secret, routing, next)
}

/// Relays packets through a [`Network`] and plays the exit node.
pub struct Relay {
	network: &'static Network,
	fragments: MessageCollection,
	/// Hops visited by the most recent packet.
	pub hops: Vec<usize>,
}

impl Relay {
	pub fn new(network: &'static Network) -> Self {
		Self {
			network,
			fragments: MessageCollection::new(16, Duration::from_secs(60)),
			hops: Vec::new(),
		}
	}

	pub fn process(&mut self, first_hop: usize, packet: &Packet) -> Delivery {
		let mut packet = Box::new(*packet);
		let mut index = first_hop;
		self.hops.clear();
		loop {
			self.hops.push(index);
			let capabilities = self.network.mixnodes[index].capabilities;
			let (h1, h2, payload) = headers_and_payload(&mut packet);
			let (secret, routing, next) = peel_header(self.network, index, h1);
			sprp_decrypt(&sprp_key(&secret, HEADER_ENCRYPT), h2).unwrap();
			sprp_decrypt(&sprp_key(&secret, PAYLOAD_ENCRYPT), payload).unwrap();
			*h1 = *next;

			match routing.kind {
				RoutingType::FWD_HOST => index = self.network.index_of(&routing),
				RoutingType::SWAP_FWD_HOST => {
					sprp_decrypt(&sprp_key(&hash(&h2[..]), HIDE_PAYLOAD), payload).unwrap();
					sprp_decrypt(&sprp_key(&hash(&payload[..]), HIDE_HEADER), h2).unwrap();
					std::mem::swap(h1, h2);
					index = self.network.index_of(&routing);
				},
				RoutingType::SMTP => {
					assert!(capabilities.contains(Capabilities::SMTP));
					let address = routing.address().unwrap().to_owned();
					let text = match decode_plaintext_payload(payload) {
						Some(PlaintextPayload::Singleton(compressed)) => {
							let message = decompress(compressed, MAX_MESSAGE_SIZE).unwrap();
							plaintext_envelope(&String::from_utf8(message).unwrap())
						},
						_ => encrypted_envelope(routing.tag().unwrap(), payload),
					};
					return Delivery::Mail { address, text }
				},
				RoutingType::FRAGMENT => {
					assert!(capabilities.contains(Capabilities::FRAGMENT));
					let fragment = decode_plaintext_payload(payload);
					let Some(PlaintextPayload::Fragment(fragment)) = fragment else {
						panic!("Fragment exit got a non-fragment payload")
					};
					return match self.fragments.insert_fragment(fragment, LOG_TARGET).unwrap() {
						FragmentStatus::Complete(framed) => {
							let (delivery, message) =
								decode_framed_message(framed, MAX_MESSAGE_SIZE).unwrap();
							assert_eq!(delivery.kind, RoutingType::SMTP);
							Delivery::Mail {
								address: delivery.address().unwrap().to_owned(),
								text: plaintext_envelope(&String::from_utf8(message).unwrap()),
							}
						},
						FragmentStatus::Incomplete { .. } => Delivery::Stored,
					}
				},
				RoutingType::DROP => return Delivery::Dropped,
				kind => panic!("Unexpected routing type {kind:?}"),
			}
		}
	}
}

/// Records packets instead of sending them. Sends to `failing` mixnodes fail.
#[derive(Default)]
pub struct TestSender {
	pub sent: Vec<(usize, Box<Packet>)>,
	pub failing: Vec<String>,
}

impl PacketSender for TestSender {
	fn send_packet(&mut self, first_hop: &Mixnode, packet: &Packet) -> Result<(), SendError> {
		if self.failing.contains(&first_hop.nickname) {
			return Err(format!("{} is down", first_hop.nickname).into())
		}
		let index = network()
			.mixnodes
			.iter()
			.position(|mixnode| mixnode.nickname == first_hop.nickname)
			.unwrap();
		self.sent.push((index, Box::new(*packet)));
		Ok(())
	}
}

/// Collects decoded messages.
#[derive(Default)]
pub struct TestSink(pub Vec<Vec<u8>>);

impl MessageSink for TestSink {
	fn deliver(&mut self, message: &[u8]) {
		self.0.push(message.to_vec());
	}
}
