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

//! Message orchestration. A [`Client`] turns [`Request`]s into packets for its
//! [`PacketSender`], and decoded messages into calls on its [`MessageSink`].

mod email;

pub use self::email::{DeliveryReport, Email, Outcome, Request, SendFailure};
use crate::{
	core::{
		encode_payload, random_tag, unix_time, AddressedPacket, Config, DecodeOutcome, Decoder,
		Error, Keyring, Mixnode, RequestBuilder, Routing, RoutingType, Surb,
	},
	traits::{Directory, KeyringStorage, MessageSink, PacketSender},
};
use log::{debug, trace, warn};
use rand::{CryptoRng, Rng};

fn send_packets(
	sender: &mut impl PacketSender,
	mixnodes: &[Mixnode],
	packets: Vec<AddressedPacket>,
	report: &mut DeliveryReport,
	log_target: &'static str,
) {
	for AddressedPacket { first_hop, packet } in packets {
		let mixnode = &mixnodes[first_hop];
		match sender.send_packet(mixnode, &packet) {
			Ok(()) => {
				trace!(target: log_target, "Sent packet to {}", mixnode.nickname);
				report.sent += 1;
			},
			Err(error) => {
				warn!(
					target: log_target,
					"Failed to send packet to {}: {}",
					mixnode.nickname,
					error
				);
				report.failures.push(SendFailure { first_hop: mixnode.nickname.clone(), error });
			},
		}
	}
}

/// Sends and receives messages for one keyring.
pub struct Client<D, P, M, K> {
	config: Config,
	directory: D,
	sender: P,
	sink: M,
	keyring: Keyring<K>,
	decoder: Decoder,
}

impl<D: Directory, P: PacketSender, M: MessageSink, K: KeyringStorage> Client<D, P, M, K> {
	pub fn new(config: Config, directory: D, sender: P, sink: M, keyring: Keyring<K>) -> Self {
		let decoder = Decoder::new(&config);
		Self { config, directory, sender, sink, keyring, decoder }
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn keyring(&self) -> &Keyring<K> {
		&self.keyring
	}

	pub fn sender(&self) -> &P {
		&self.sender
	}

	pub fn sender_mut(&mut self) -> &mut P {
		&mut self.sender
	}

	pub fn sink(&self) -> &M {
		&self.sink
	}

	pub fn handle(&mut self, request: Request) -> Result<Outcome, Error> {
		match request {
			Request::Decode { armored } => self.decode(&armored).map(Outcome::Decoded),
			Request::Forward(email) => self.send_forward(&email).map(Outcome::Sent),
			Request::Reply { reply_blocks, email } =>
				self.send_reply(&reply_blocks, &email).map(Outcome::Sent),
		}
	}

	/// Decode a delivered message against the keyring, handing any complete message to the
	/// sink.
	pub fn decode(&mut self, armored: &str) -> Result<DecodeOutcome, Error> {
		let secrets = self.keyring.secrets();
		let outcome = self.decoder.decode(armored, &secrets)?;
		if let DecodeOutcome::Message(message) = &outcome {
			self.sink.deliver(message);
		}
		Ok(outcome)
	}

	/// Expunge stale partial messages.
	pub fn cleanup(&mut self) {
		self.decoder.cleanup();
	}

	/// Build `count` reply blocks leading back to us, minting a keyring secret if needed.
	pub fn generate_surbs(
		&self,
		rng: &mut (impl Rng + CryptoRng),
		count: usize,
	) -> Result<Vec<Surb>, Error> {
		let address = self.config.reply_address.as_deref().ok_or(Error::NoReplyAddress)?;
		let now = unix_time();
		let secret = self.keyring.current_secret(rng, &self.config.identity, now)?;
		let lifetime = u32::try_from(self.config.surb_lifetime.as_secs()).unwrap_or(u32::MAX);
		let builder = RequestBuilder::new(self.directory.mixnodes(), self.config.log_target)?;
		(0..count)
			.map(|_| {
				builder.build_surb(
					rng,
					&secret,
					address,
					self.config.num_reply_hops,
					now.saturating_add(lifetime),
				)
			})
			.collect()
	}

	/// The text of `email` with the configured number of our reply blocks appended.
	fn compose(&self, rng: &mut (impl Rng + CryptoRng), email: &Email) -> Result<String, Error> {
		let mut text = email.to_text();
		if self.config.num_reply_blocks > 0 {
			for surb in self.generate_surbs(rng, self.config.num_reply_blocks)? {
				text.push('\n');
				text.push_str(&surb.armor());
			}
			debug!(
				target: self.config.log_target,
				"Attached {} reply blocks",
				self.config.num_reply_blocks
			);
		}
		Ok(text)
	}

	/// Send an independently routed copy of `email` to each recipient.
	pub fn send_forward(&mut self, email: &Email) -> Result<DeliveryReport, Error> {
		let mut rng = rand::thread_rng();
		let text = self.compose(&mut rng, email)?;
		let log_target = self.config.log_target;
		let builder = RequestBuilder::new(self.directory.mixnodes(), log_target)?;

		let deliveries: Vec<Routing> = if email.recipients.is_empty() {
			vec![Routing::drop(&mut rng)]
		} else {
			email
				.recipients
				.iter()
				.map(|address| Routing::smtp(&random_tag(&mut rng), address))
				.collect()
		};

		let mut report = DeliveryReport::default();
		for delivery in &deliveries {
			let encoded = encode_payload(&mut rng, text.as_bytes(), delivery, log_target)?;
			let packets =
				builder.build_forward_packets(&mut rng, &encoded, delivery, self.config.num_hops)?;
			send_packets(&mut self.sender, builder.mixnodes(), packets, &mut report, log_target);
		}
		debug!(
			target: log_target,
			"Forward message: {} of {} packets sent",
			report.sent,
			report.total()
		);
		Ok(report)
	}

	/// Send `email` using reply blocks parsed from `reply_blocks`. Expired blocks are skipped;
	/// each packet of the message uses a different block.
	pub fn send_reply(
		&mut self,
		reply_blocks: &str,
		email: &Email,
	) -> Result<DeliveryReport, Error> {
		let mut rng = rand::thread_rng();
		let log_target = self.config.log_target;
		let now = unix_time();
		let (usable, expired): (Vec<Surb>, Vec<Surb>) =
			Surb::parse_all(reply_blocks)?.into_iter().partition(|surb| surb.is_valid_at(now));
		if !expired.is_empty() {
			warn!(target: log_target, "Skipping {} expired reply blocks", expired.len());
		}

		// Reply blocks carried over from the message being answered are not sent back
		let email = Email { body: Surb::strip(&email.body)?, ..email.clone() };
		let text = self.compose(&mut rng, &email)?;
		// The reply block decides where the message goes
		let delivery = Routing { kind: RoutingType::SMTP, info: Vec::new() };
		let encoded = encode_payload(&mut rng, text.as_bytes(), &delivery, log_target)?;
		if usable.len() < encoded.len() {
			let (needed, available) = (encoded.len(), usable.len());
			return Err(Error::NotEnoughReplyBlocks { needed, available })
		}

		let builder = RequestBuilder::new(self.directory.mixnodes(), log_target)?;
		let packets =
			builder.build_reply_packets(&mut rng, &encoded, &usable, self.config.num_hops)?;
		let mut report = DeliveryReport::default();
		send_packets(&mut self.sender, builder.mixnodes(), packets, &mut report, log_target);
		debug!(target: log_target, "Reply: {} of {} packets sent", report.sent, report.total());
		Ok(report)
	}
}
