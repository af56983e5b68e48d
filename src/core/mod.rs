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

//! Type III packet and message codec.
//!
//! Nothing in here performs I/O: packets are built from a directory snapshot and handed back to
//! the caller, and decoding works on the text of a delivered message plus a snapshot of keyring
//! secrets.

mod armor;
mod config;
mod crypto;
mod decoder;
mod error;
mod fragment;
mod header;
mod keyring;
mod packet;
mod payload;
mod replay_filter;
mod request_builder;
mod routing;
mod surb;
mod topology;
mod util;

pub use self::{
	armor::{encode as armor_encode, encode_text as armor_encode_text, first_block, scan, Block},
	config::Config,
	crypto::{
		apply_keystream, compress, decompress, hash, hash_parts, keystream, sprp_decrypt,
		sprp_encrypt, sprp_key, subkey, xor_in_place, Hash, Key, SprpKey, HEADER_ENCRYPT,
		HEADER_SECRET_KEY, HIDE_HEADER, HIDE_PAYLOAD, PAYLOAD_ENCRYPT, RANDOM_JUNK, SPRP_LEFT_LEN,
	},
	decoder::{
		encrypted_envelope, plaintext_envelope, DecodeOutcome, Decoder, MESSAGE_ARMOR_TITLE,
	},
	error::{CapacityError, Error, FormatError},
	fragment::{create_fragments, FragmentStatus, FragmentView, MessageCollection, MessageId},
	header::{
		build_header, Header, HopSecret, DIGEST_OFFSET, MIN_SUBHEADER_LEN, PK_ENC_LEN,
		PK_MAX_DATA_LEN, PK_OVERHEAD_LEN, SUBHEADER_VERSION,
	},
	keyring::{
		FileKeyringStorage, Keyring, KeyringData, KeyringEntry, MemoryKeyringStorage,
		KEYRING_ARMOR_TITLE,
	},
	packet::{build_forward_packet, build_reply_packet, headers_and_payload, Packet},
	payload::{
		decode_framed_message, decode_plaintext_payload, encode_payload, EncodedPayload, Payload,
		PlaintextPayload, FRAGMENT_CAPACITY, FRAGMENT_HEADER_LEN, SINGLETON_CAPACITY,
		SINGLETON_HEADER_LEN,
	},
	replay_filter::ReplayFilter,
	request_builder::{AddressedPacket, RequestBuilder},
	routing::{random_tag, HostInfo, Routing, RoutingType},
	surb::{build_surb, tag_accepted, tag_stream_key, Surb, SURB_ARMOR_TITLE},
	topology::{
		oaep_padding, Capabilities, Mixnode, MixnodeIndex, PacketKey, RouteGenerator, TopologyErr,
		OAEP_LABEL,
	},
	util::unix_time,
};

/// Size in bytes of a digest.
pub const HASH_LEN: usize = 20;
/// Size in bytes of a keystream key.
pub const KEY_LEN: usize = 16;
/// Size in bytes of each of the two headers in a packet.
pub const HEADER_LEN: usize = 2048;
/// Size in bytes of the payload of a packet.
pub const PAYLOAD_LEN: usize = 28 * 1024;
/// Size in bytes of a packet.
pub const PACKET_LEN: usize = 2 * HEADER_LEN + PAYLOAD_LEN;
/// Maximum number of hops in one header. This is also the number of layers the decoder will try
/// to remove from a reply.
pub const MAX_HOPS: usize = 20;
/// Size in bytes of a keyring secret.
pub const USER_SECRET_LEN: usize = 20;
/// Size in bytes of a decoding handle.
pub const TAG_LEN: usize = HASH_LEN;
/// Upper bound on the size of a decompressed message.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Long-lived secret from which reply blocks are derived.
pub type UserSecret = [u8; USER_SECRET_LEN];
/// Decoding handle carried in the exit routing information of a message.
pub type Tag = [u8; TAG_LEN];
