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

//! End-to-end message tests: packets are built with the request builder, relayed through the test
//! network, and decoded from the armored text the exit node mails.

#[path = "common.rs"]
mod common;

use common::{init_logging, network, Delivery, Relay, LOG_TARGET};
use rand::{distributions::Alphanumeric, Rng, RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use typeiii::{
	core::{
		encode_payload, random_tag, unix_time, Decoder, Keyring, MemoryKeyringStorage,
		RequestBuilder, SURB_ARMOR_TITLE,
	},
	Config, DecodeOutcome, Error, Routing, RoutingType, Surb,
};

const ALICE: &str = "alice@example.org";
const BOB: &str = "bob@example.org";

fn reply_delivery() -> Routing {
	Routing { kind: RoutingType::SMTP, info: Vec::new() }
}

fn random_text(len: usize) -> String {
	Xoshiro256StarStar::seed_from_u64(len as u64)
		.sample_iter(Alphanumeric)
		.take(len)
		.map(char::from)
		.collect()
}

fn random_bytes(len: usize) -> Vec<u8> {
	let mut bytes = vec![0; len];
	Xoshiro256StarStar::seed_from_u64(len as u64).fill_bytes(&mut bytes);
	bytes
}

fn test_keyring() -> Keyring<MemoryKeyringStorage> {
	Keyring::open(MemoryKeyringStorage::new(), "hunter2", &Config::default()).unwrap()
}

#[test]
fn reply_singleton() {
	init_logging();
	let mut rng = rand::thread_rng();
	let network = network();
	let builder = RequestBuilder::new(&network.mixnodes, LOG_TARGET).unwrap();
	let keyring = test_keyring();
	let now = unix_time();
	let secret = keyring.current_secret(&mut rng, "default", now).unwrap();
	let surb = builder.build_surb(&mut rng, &secret, ALICE, 3, now + 3600).unwrap();

	// The reply block survives being armored and parsed back
	let surbs = Surb::parse_all(&format!("Use this:\n{}", surb.armor())).unwrap();
	assert_eq!(surbs.len(), 1);

	let message = random_bytes(100);
	let encoded = encode_payload(&mut rng, &message, &reply_delivery(), LOG_TARGET).unwrap();
	let packets = builder.build_reply_packets(&mut rng, &encoded, &surbs, 2).unwrap();
	assert_eq!(packets.len(), 1);

	let mut relay = Relay::new(network);
	let Delivery::Mail { address, text } = relay.process(packets[0].first_hop, &packets[0].packet)
	else {
		panic!("Reply should be mailed")
	};
	assert_eq!(relay.hops.len(), 5);
	assert_eq!(address, ALICE);
	assert!(text.contains("Message-type: encrypted"));

	let mut decoder = Decoder::new(&Config::default());
	assert_eq!(
		decoder.decode(&text, &keyring.secrets()).unwrap(),
		DecodeOutcome::Message(message)
	);
	assert_eq!(decoder.decode(&text, &keyring.secrets()).unwrap(), DecodeOutcome::Replayed);

	// Somebody else's keyring gets nothing out of it
	let other = test_keyring();
	other.mint_new_secret(&mut rng, "default", now).unwrap();
	let mut decoder = Decoder::new(&Config::default());
	assert_eq!(decoder.decode(&text, &other.secrets()).unwrap(), DecodeOutcome::NotForUs);
}

#[test]
fn reply_fragmented() {
	init_logging();
	let mut rng = rand::thread_rng();
	let network = network();
	let builder = RequestBuilder::new(&network.mixnodes, LOG_TARGET).unwrap();
	let keyring = test_keyring();
	let now = unix_time();
	let secret = keyring.current_secret(&mut rng, "default", now).unwrap();

	let message = random_bytes(40 * 1024);
	let encoded = encode_payload(&mut rng, &message, &reply_delivery(), LOG_TARGET).unwrap();
	assert_eq!(encoded.len(), 2);

	let one_surb = vec![builder.build_surb(&mut rng, &secret, ALICE, 2, now + 3600).unwrap()];
	assert!(matches!(
		builder.build_reply_packets(&mut rng, &encoded, &one_surb, 2),
		Err(Error::NotEnoughReplyBlocks { needed: 2, available: 1 })
	));

	let surbs: Vec<Surb> = (0..2)
		.map(|_| builder.build_surb(&mut rng, &secret, ALICE, 2, now + 3600).unwrap())
		.collect();
	let packets = builder.build_reply_packets(&mut rng, &encoded, &surbs, 2).unwrap();
	assert_eq!(packets.len(), 2);

	let mut relay = Relay::new(network);
	let mut decoder = Decoder::new(&Config::default());
	let mut outcomes = packets.iter().map(|packet| {
		let Delivery::Mail { text, .. } = relay.process(packet.first_hop, &packet.packet) else {
			panic!("Reply fragments should be mailed")
		};
		decoder.decode(&text, &keyring.secrets()).unwrap()
	});
	assert!(matches!(
		outcomes.next(),
		Some(DecodeOutcome::Incomplete { received: 1, expected: 2, .. })
	));
	assert_eq!(outcomes.next(), Some(DecodeOutcome::Message(message)));
}

#[test]
fn forward_singleton() {
	init_logging();
	let mut rng = rand::thread_rng();
	let network = network();
	let builder = RequestBuilder::new(&network.mixnodes, LOG_TARGET).unwrap();
	let text = "Subject: Hello\n\nThis is for Bob.";
	let delivery = Routing::smtp(&random_tag(&mut rng), BOB);
	let encoded = encode_payload(&mut rng, text.as_bytes(), &delivery, LOG_TARGET).unwrap();

	let mut relay = Relay::new(network);
	for num_hops in 2..=6 {
		let packets =
			builder.build_forward_packets(&mut rng, &encoded, &delivery, num_hops).unwrap();
		assert_eq!(packets.len(), 1);
		let Delivery::Mail { address, text: mailed } =
			relay.process(packets[0].first_hop, &packets[0].packet)
		else {
			panic!("Forward message should be mailed")
		};
		assert_eq!(relay.hops.len(), num_hops);
		assert_eq!(address, BOB);
		assert!(mailed.contains("Message-type: plaintext"));
		let mut decoder = Decoder::new(&Config::default());
		assert_eq!(
			decoder.decode(&mailed, &[]).unwrap(),
			DecodeOutcome::Message(text.as_bytes().to_vec())
		);
	}

	assert!(builder.build_forward_packets(&mut rng, &encoded, &delivery, 1).is_err());
}

#[test]
fn forward_fragmented() {
	init_logging();
	let mut rng = rand::thread_rng();
	let network = network();
	let builder = RequestBuilder::new(&network.mixnodes, LOG_TARGET).unwrap();
	let text = random_text(80 * 1024);
	let delivery = Routing::smtp(&random_tag(&mut rng), BOB);
	let encoded = encode_payload(&mut rng, text.as_bytes(), &delivery, LOG_TARGET).unwrap();
	assert!(encoded.len() >= 2);

	let packets = builder.build_forward_packets(&mut rng, &encoded, &delivery, 4).unwrap();
	assert_eq!(packets.len(), encoded.len());

	let mut relay = Relay::new(network);
	let mut exits = Vec::new();
	let mut deliveries = Vec::new();
	for packet in &packets {
		deliveries.push(relay.process(packet.first_hop, &packet.packet));
		exits.push(*relay.hops.last().unwrap());
	}
	assert!(exits.windows(2).all(|pair| pair[0] == pair[1]), "Fragments exit at one node");

	let Some(Delivery::Mail { address, text: mailed }) = deliveries.pop() else {
		panic!("Last fragment should complete the message")
	};
	assert!(deliveries.iter().all(|delivery| *delivery == Delivery::Stored));
	assert_eq!(address, BOB);
	let mut decoder = Decoder::new(&Config::default());
	assert_eq!(decoder.decode(&mailed, &[]).unwrap(), DecodeOutcome::Message(text.into_bytes()));
}

#[test]
fn forward_drop() {
	let mut rng = rand::thread_rng();
	let network = network();
	let builder = RequestBuilder::new(&network.mixnodes, LOG_TARGET).unwrap();
	let delivery = Routing::drop(&mut rng);
	let encoded = encode_payload(&mut rng, b"cover", &delivery, LOG_TARGET).unwrap();
	let packets = builder.build_forward_packets(&mut rng, &encoded, &delivery, 3).unwrap();
	let mut relay = Relay::new(network);
	assert_eq!(relay.process(packets[0].first_hop, &packets[0].packet), Delivery::Dropped);
}

#[test]
fn expired_reply_blocks() {
	let mut rng = rand::thread_rng();
	let network = network();
	let builder = RequestBuilder::new(&network.mixnodes, LOG_TARGET).unwrap();
	let keyring = test_keyring();
	let now = unix_time();
	let secret = keyring.current_secret(&mut rng, "default", now).unwrap();
	let surb = builder.build_surb(&mut rng, &secret, ALICE, 2, now - 10).unwrap();
	assert!(!surb.is_valid_at(now));
	assert!(surb.armor().contains(SURB_ARMOR_TITLE));
}
