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

//! Type III (Mixminion) anonymous remailer message codec.
//!
//! The [`core`](crate::core) module builds onion headers, payloads, packets and single-use reply
//! blocks, and decodes the messages delivered to the holder of a [`Keyring`]. [`Client`] ties the
//! codec to the collaborators in [`traits`]: a directory of mixnodes, a packet sender, a sink for
//! decoded messages and storage for the keyring.

pub mod client;
pub mod core;
pub mod traits;

pub use crate::client::{Client, DeliveryReport, Email, Outcome, Request, SendFailure};
pub use crate::core::{
	Capabilities, CapacityError, Config, DecodeOutcome, Decoder, Error, FormatError, Keyring,
	KeyringData, KeyringEntry, Mixnode, PacketKey, Routing, RoutingType, Surb, TopologyErr,
};
