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

//! Codec and client configuration.

use std::time::Duration;

/// Default lifetime of keyring secrets and reply blocks: three months.
pub const DEFAULT_KEY_LIFETIME: Duration = Duration::from_secs(3 * 30 * 24 * 60 * 60);

/// Configuration for the encoder, the decoder and the keyring.
#[derive(Clone, Debug)]
pub struct Config {
	/// The target for log messages.
	pub log_target: &'static str,

	/// Number of hops for each packet. Forward packets split these between the two legs; replies
	/// use them all for the first leg. Must be at least 2.
	pub num_hops: usize,
	/// Number of hops in the reply blocks we create.
	pub num_reply_hops: usize,
	/// Number of reply blocks to attach to outgoing messages.
	pub num_reply_blocks: usize,
	/// Address that attached reply blocks deliver to. Required if `num_reply_blocks` is not 0.
	pub reply_address: Option<String>,
	/// Keyring entry name used for the secrets behind our reply blocks.
	pub identity: String,

	/// Lifetime of newly minted keyring secrets.
	pub key_lifetime: Duration,
	/// Expired keyring secrets are still written back for this long, so that late replies to old
	/// reply blocks can be decoded.
	pub keyring_grace: Duration,
	/// Lifetime of the reply blocks we create.
	pub surb_lifetime: Duration,

	/// Partially received messages are discarded after this long.
	pub fragment_ttl: Duration,
	/// Maximum number of partially received messages to keep. Must not be 0.
	pub max_pending_messages: usize,
	/// Maximum number of decoding handles remembered for replay detection. 0 disables it.
	pub consumed_handles_capacity: usize,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			log_target: "typeiii",

			num_hops: 4,
			num_reply_hops: 3,
			num_reply_blocks: 0,
			reply_address: None,
			identity: "default".into(),

			key_lifetime: DEFAULT_KEY_LIFETIME,
			keyring_grace: DEFAULT_KEY_LIFETIME,
			surb_lifetime: DEFAULT_KEY_LIFETIME,

			fragment_ttl: Duration::from_secs(7 * 24 * 60 * 60),
			max_pending_messages: 64,
			consumed_handles_capacity: 4096,
		}
	}
}
