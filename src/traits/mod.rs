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

//! Interfaces to the collaborators the client depends on.

use crate::core::{Mixnode, Packet};
use std::io;

/// Provide the current mixnode directory.
pub trait Directory {
	/// Snapshot of every known mixnode. Route selection only ever looks at this slice.
	fn mixnodes(&self) -> &[Mixnode];
}

/// Error returned by a [`PacketSender`].
pub type SendError = Box<dyn std::error::Error + Send + Sync>;

/// Transport for built packets.
pub trait PacketSender {
	/// Hand `packet` to `first_hop`. Called once per packet; failures are reported per packet
	/// and never retried.
	fn send_packet(&mut self, first_hop: &Mixnode, packet: &Packet) -> Result<(), SendError>;
}

/// Receives messages recovered by the decoder.
pub trait MessageSink {
	fn deliver(&mut self, message: &[u8]);
}

/// Persistent storage for the armored keyring.
pub trait KeyringStorage: Send {
	/// Load the stored keyring text. `None` if nothing has been stored yet.
	fn load(&self) -> io::Result<Option<String>>;

	/// Replace the stored keyring text.
	fn store(&self, text: &str) -> io::Result<()>;
}
