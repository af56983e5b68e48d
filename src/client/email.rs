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

//! User-facing request and result types.

use crate::{core::DecodeOutcome, traits::SendError};
use std::fmt;

/// A message to send through the mixnet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Email {
	/// Each recipient gets an independently routed copy. With no recipients the message is still
	/// sent, but dropped at the exit.
	pub recipients: Vec<String>,
	pub subject: Option<String>,
	pub body: String,
}

impl Email {
	/// Text carried in the payload.
	pub fn to_text(&self) -> String {
		match &self.subject {
			Some(subject) => format!("Subject: {}\n\n{}", subject, self.body),
			None => self.body.clone(),
		}
	}
}

/// Something for the [`Client`](super::Client) to do.
#[derive(Clone, Debug)]
pub enum Request {
	/// Decode a delivered message.
	Decode { armored: String },
	/// Send a message to its recipients.
	Forward(Email),
	/// Reply anonymously using the reply blocks found in `reply_blocks`. The recipients of the
	/// email are ignored.
	Reply { reply_blocks: String, email: Email },
}

/// A packet that could not be handed to its first hop.
pub struct SendFailure {
	/// Nickname of the first hop.
	pub first_hop: String,
	pub error: SendError,
}

impl fmt::Debug for SendFailure {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}: {}", self.first_hop, self.error)
	}
}

/// Per-packet results of a send. Failures are reported, not retried.
#[derive(Debug, Default)]
pub struct DeliveryReport {
	pub sent: usize,
	pub failures: Vec<SendFailure>,
}

impl DeliveryReport {
	pub fn total(&self) -> usize {
		self.sent + self.failures.len()
	}

	pub fn all_sent(&self) -> bool {
		self.failures.is_empty()
	}
}

#[derive(Debug)]
pub enum Outcome {
	Decoded(DecodeOutcome),
	Sent(DeliveryReport),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn email_text() {
		let mut email = Email { body: "Hello".into(), ..Default::default() };
		assert_eq!(email.to_text(), "Hello");
		email.subject = Some("Greetings".into());
		assert_eq!(email.to_text(), "Subject: Greetings\n\nHello");
	}

	#[test]
	fn report() {
		let mut report = DeliveryReport { sent: 2, ..Default::default() };
		assert!(report.all_sent());
		report.failures.push(SendFailure { first_hop: "mix1".into(), error: "refused".into() });
		assert!(!report.all_sent());
		assert_eq!(report.total(), 3);
		assert_eq!(format!("{:?}", report.failures[0]), "mix1: refused");
	}
}
