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

//! Error types.

use super::topology::TopologyErr;
use std::io;
use thiserror::Error;

/// Malformed input. Never worth retrying.
#[derive(Debug, Error)]
pub enum FormatError {
	/// No armored block with the expected title.
	#[error("No \"{0}\" block found")]
	MissingArmor(&'static str),
	/// An armored block is malformed.
	#[error("Malformed armored block: {0}")]
	BadArmor(&'static str),
	/// An armored block lacks a required header line.
	#[error("Missing \"{0}\" header")]
	MissingHeader(&'static str),
	/// Bad base64 in an armored block or header.
	#[error("Bad base64: {0}")]
	Base64(#[from] base64::DecodeError),
	/// Binary magic does not match.
	#[error("Bad magic")]
	BadMagic,
	/// Unsupported format version.
	#[error("Unsupported version {0}")]
	UnsupportedVersion(String),
	/// Some field or buffer has the wrong length.
	#[error("Bad {what} length: expected {expected}, got {actual}")]
	Length {
		/// What has the wrong length.
		what: &'static str,
		/// Expected length, or the minimum length for variable-sized items.
		expected: usize,
		/// Actual length.
		actual: usize,
	},
	/// XOR operands of different lengths.
	#[error("XOR operands differ in length ({left} vs {right})")]
	XorLengthMismatch {
		/// Length of the first operand.
		left: usize,
		/// Length of the second operand.
		right: usize,
	},
	/// Input shorter than the left side of the wide-block permutation.
	#[error("{0} bytes is too short for the wide-block permutation")]
	SprpInputTooShort(usize),
	/// Routing information cannot be parsed.
	#[error("Bad routing information")]
	BadRoutingInfo,
	/// Packet key is not usable.
	#[error("Bad packet key")]
	BadPublicKey,
	/// Delivered message is of a type we cannot decode.
	#[error("Unsupported message type {0:?}")]
	UnsupportedMessageType(String),
	/// Keyring item cannot be parsed.
	#[error("Bad keyring item")]
	BadKeyringItem,
	/// Fragment is inconsistent with the fragments already received for the same message.
	#[error("Bad fragment")]
	BadFragment,
	/// Reassembled message is malformed.
	#[error("Bad reassembled message")]
	BadReassembly,
}

/// The request does not fit the packet format.
#[derive(Debug, Error)]
pub enum CapacityError {
	/// Path has no hops.
	#[error("Empty path")]
	EmptyPath,
	/// Path has too many hops.
	#[error("Path of {hops} hops exceeds the maximum of {max}")]
	PathTooLong {
		/// Requested number of hops.
		hops: usize,
		/// Maximum number of hops.
		max: usize,
	},
	/// Path has too few hops.
	#[error("Path of {hops} hops is shorter than the minimum of {min}")]
	PathTooShort {
		/// Requested number of hops.
		hops: usize,
		/// Minimum number of hops.
		min: usize,
	},
	/// Subheaders do not fit in a header.
	#[error("Subheaders need {needed} bytes but only {available} are available")]
	HeaderOverflow {
		/// Bytes needed.
		needed: usize,
		/// Bytes available.
		available: usize,
	},
	/// Message is too large.
	#[error("Message of {size} bytes exceeds the maximum of {max}")]
	MessageTooLarge {
		/// Size of the message.
		size: usize,
		/// Maximum size.
		max: usize,
	},
}

/// Codec and client error.
#[derive(Debug, Error)]
pub enum Error {
	/// Malformed input.
	#[error("Format error: {0}")]
	Format(#[from] FormatError),
	/// The request does not fit the packet format.
	#[error("Capacity error: {0}")]
	Capacity(#[from] CapacityError),
	/// Keyring digest does not verify. A wrong password and a damaged keyring look the same.
	#[error("Wrong password or corrupt keyring")]
	WrongPasswordOrCorrupt,
	/// RSA encryption failed.
	#[error("Public-key operation failed: {0}")]
	PublicKey(#[from] rsa::Error),
	/// No suitable route.
	#[error("Topology error: {0}")]
	Topology(#[from] TopologyErr),
	/// Compression or decompression failed.
	#[error("Compression error: {0}")]
	Compression(io::Error),
	/// Keyring storage failed.
	#[error("Keyring storage error: {0}")]
	Storage(io::Error),
	/// A reply needs more usable reply blocks than were supplied.
	#[error("Need {needed} reply blocks, only {available} usable")]
	NotEnoughReplyBlocks {
		/// Number of packets in the reply.
		needed: usize,
		/// Number of unexpired reply blocks supplied.
		available: usize,
	},
	/// A reply block was requested without a reply address to deliver to.
	#[error("No reply address configured")]
	NoReplyAddress,
}
