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

//! Password-protected store of keyring secrets.
//!
//! The stored form is an armored, encrypted item stream. Items are padded to a multiple of
//! [`PAD_BLOCK`] bytes so the file size reveals little about the number of secrets held.

use super::{
	armor,
	crypto::{apply_keystream, hash_parts, Key},
	error::{Error, FormatError},
	util::{div_ceil, read_u16, read_u32},
	Config, UserSecret, HASH_LEN, KEY_LEN, USER_SECRET_LEN,
};
use crate::traits::KeyringStorage;
use arrayref::array_ref;
use log::{debug, trace};
use parking_lot::Mutex;
use rand::{CryptoRng, Rng};
use std::{fmt, fs, io, path::PathBuf, time::Duration};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

pub const KEYRING_ARMOR_TITLE: &str = "TYPE III KEYRING";
const ARMOR_VERSION: &str = "0.1";
const MAGIC: &[u8; 8] = b"KEYRING2";
const SALT_LEN: usize = 8;
const PAD_BLOCK: usize = 1024;
const ITEM_HEADER_LEN: usize = 3;
/// Item type for a reply block secret.
const ITEM_SURB_SECRET: u8 = 0x00;

/// A secret and the time it stops being used for new reply blocks.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyringEntry {
	pub name: String,
	pub secret: Zeroizing<UserSecret>,
	pub expires: u32,
}

impl fmt::Debug for KeyringEntry {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("KeyringEntry")
			.field("name", &self.name)
			.field("expires", &self.expires)
			.finish_non_exhaustive()
	}
}

impl KeyringEntry {
	fn encode_value(&self) -> Zeroizing<Vec<u8>> {
		let mut value =
			Zeroizing::new(Vec::with_capacity(4 + self.name.len() + 1 + USER_SECRET_LEN));
		value.extend_from_slice(&self.expires.to_be_bytes());
		value.extend_from_slice(self.name.as_bytes());
		value.push(0);
		value.extend_from_slice(&self.secret[..]);
		value
	}

	fn decode_value(value: &[u8]) -> Result<Self, FormatError> {
		if value.len() < 4 + 1 + USER_SECRET_LEN {
			return Err(FormatError::BadKeyringItem)
		}
		let expires = read_u32(array_ref![value, 0, 4]);
		let (name, secret) = value[4..].split_at(value.len() - 4 - USER_SECRET_LEN);
		let name = match name.split_last() {
			Some((0, name)) => name,
			_ => return Err(FormatError::BadKeyringItem),
		};
		let name = String::from_utf8(name.to_vec()).map_err(|_| FormatError::BadKeyringItem)?;
		let secret = Zeroizing::new(*array_ref![secret, 0, USER_SECRET_LEN]);
		Ok(Self { name, secret, expires })
	}
}

/// Decrypted keyring contents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyringData {
	pub entries: Vec<KeyringEntry>,
	/// Items of types this version does not understand, kept so they are written back.
	unknown: Vec<(u8, Vec<u8>)>,
}

fn keyring_key(salt: &[u8], password: &str) -> Key {
	let h = hash_parts(&[salt, password.as_bytes(), salt]);
	*array_ref![h, 0, KEY_LEN]
}

fn push_item(items: &mut Vec<u8>, kind: u8, value: &[u8]) -> Result<(), FormatError> {
	let len: u16 = value.len().try_into().map_err(|_| FormatError::BadKeyringItem)?;
	items.push(kind);
	items.extend_from_slice(&len.to_be_bytes());
	items.extend_from_slice(value);
	Ok(())
}

impl KeyringData {
	pub fn unknown_items(&self) -> &[(u8, Vec<u8>)] {
		&self.unknown
	}

	/// Encrypt and armor the contents. Entries with `expires + grace <= now` are left out.
	pub fn pack(
		&self,
		rng: &mut (impl Rng + CryptoRng),
		password: &str,
		now: u32,
		grace: Duration,
	) -> Result<String, Error> {
		let mut items = Zeroizing::new(Vec::new());
		for entry in &self.entries {
			if u64::from(entry.expires) + grace.as_secs() <= u64::from(now) {
				continue
			}
			push_item(&mut items, ITEM_SURB_SECRET, &entry.encode_value())?;
		}
		for (kind, value) in &self.unknown {
			push_item(&mut items, *kind, value)?;
		}

		let padded_len = PAD_BLOCK * div_ceil(items.len(), PAD_BLOCK).max(1);
		let mut body = Zeroizing::new(Vec::with_capacity(4 + padded_len + HASH_LEN));
		body.extend_from_slice(&(items.len() as u32).to_be_bytes());
		body.extend_from_slice(&items);
		let unpadded_len = body.len();
		body.resize(4 + padded_len, 0);
		rng.fill_bytes(&mut body[unpadded_len..]);

		let mut salt = [0; SALT_LEN];
		rng.fill_bytes(&mut salt);
		let digest = hash_parts(&[&body[..], &salt, MAGIC]);
		body.extend_from_slice(&digest);
		apply_keystream(&mut body, &keyring_key(&salt, password));

		let mut contents = Vec::with_capacity(MAGIC.len() + SALT_LEN + body.len());
		contents.extend_from_slice(MAGIC);
		contents.extend_from_slice(&salt);
		contents.extend_from_slice(&body);
		Ok(armor::encode(KEYRING_ARMOR_TITLE, &[("Version", ARMOR_VERSION)], &contents))
	}

	/// Reverse of [`pack`](Self::pack). A digest mismatch, which is what a wrong password looks
	/// like, is reported as [`Error::WrongPasswordOrCorrupt`] and nothing is returned.
	pub fn unpack(text: &str, password: &str) -> Result<Self, Error> {
		let block = armor::first_block(text, KEYRING_ARMOR_TITLE)?;
		match block.header("Version") {
			Some(ARMOR_VERSION) => (),
			Some(version) => return Err(FormatError::UnsupportedVersion(version.into()).into()),
			None => return Err(FormatError::MissingHeader("Version").into()),
		}
		let contents = block.decode_body()?;
		let min_len = MAGIC.len() + SALT_LEN + 4 + HASH_LEN;
		if contents.len() < min_len {
			return Err(FormatError::Length {
				what: "keyring",
				expected: min_len,
				actual: contents.len(),
			}
			.into())
		}
		let (magic, rest) = contents.split_at(MAGIC.len());
		if magic != MAGIC {
			return Err(FormatError::BadMagic.into())
		}
		let (salt, encrypted) = rest.split_at(SALT_LEN);
		let mut body = Zeroizing::new(encrypted.to_vec());
		apply_keystream(&mut body, &keyring_key(salt, password));
		let (data, digest) = body.split_at(body.len() - HASH_LEN);
		if !bool::from(hash_parts(&[data, salt, MAGIC])[..].ct_eq(digest)) {
			return Err(Error::WrongPasswordOrCorrupt)
		}

		let items_len = read_u32(array_ref![data, 0, 4]) as usize;
		let mut items = data.get(4..4 + items_len).ok_or(FormatError::Length {
			what: "keyring items",
			expected: items_len,
			actual: data.len() - 4,
		})?;
		let mut keyring = Self::default();
		while !items.is_empty() {
			if items.len() < ITEM_HEADER_LEN {
				return Err(FormatError::BadKeyringItem.into())
			}
			let kind = items[0];
			let len = read_u16(array_ref![items, 1, 2]) as usize;
			let value = items
				.get(ITEM_HEADER_LEN..ITEM_HEADER_LEN + len)
				.ok_or(FormatError::BadKeyringItem)?;
			match kind {
				ITEM_SURB_SECRET => keyring.entries.push(KeyringEntry::decode_value(value)?),
				_ => keyring.unknown.push((kind, value.to_vec())),
			}
			items = &items[ITEM_HEADER_LEN + len..];
		}
		Ok(keyring)
	}
}

struct State {
	data: KeyringData,
	password: Zeroizing<String>,
}

/// Keyring bound to a storage backend. All mutation goes through one lock, and every mutation is
/// written back to storage before the lock is released.
pub struct Keyring<S> {
	storage: S,
	state: Mutex<State>,
	key_lifetime: Duration,
	grace: Duration,
	log_target: &'static str,
}

impl<S: KeyringStorage> Keyring<S> {
	/// Open the keyring held by `storage`, or start an empty one if nothing is stored.
	pub fn open(storage: S, password: &str, config: &Config) -> Result<Self, Error> {
		let data = match storage.load().map_err(Error::Storage)? {
			Some(text) => KeyringData::unpack(&text, password)?,
			None => {
				debug!(target: config.log_target, "No stored keyring; starting with an empty one");
				KeyringData::default()
			},
		};
		debug!(target: config.log_target, "Keyring holds {} secrets", data.entries.len());
		Ok(Self {
			storage,
			state: Mutex::new(State { data, password: Zeroizing::new(password.into()) }),
			key_lifetime: config.key_lifetime,
			grace: config.keyring_grace,
			log_target: config.log_target,
		})
	}

	pub fn storage(&self) -> &S {
		&self.storage
	}

	/// Snapshot of every secret, for a decoding pass.
	pub fn secrets(&self) -> Zeroizing<Vec<UserSecret>> {
		let state = self.state.lock();
		Zeroizing::new(state.data.entries.iter().map(|entry| *entry.secret).collect())
	}

	pub fn entries(&self) -> Vec<KeyringEntry> {
		self.state.lock().data.entries.clone()
	}

	/// Write `data` sealed with `password` to storage. Callers update the locked state only once
	/// this succeeds.
	fn persist(
		&self,
		rng: &mut (impl Rng + CryptoRng),
		data: &KeyringData,
		password: &str,
		now: u32,
	) -> Result<(), Error> {
		let text = data.pack(rng, password, now, self.grace)?;
		self.storage.store(&text).map_err(Error::Storage)?;
		trace!(target: self.log_target, "Saved keyring");
		Ok(())
	}

	fn mint_locked(
		&self,
		rng: &mut (impl Rng + CryptoRng),
		state: &mut State,
		name: &str,
		now: u32,
	) -> Result<Zeroizing<UserSecret>, Error> {
		let mut secret = Zeroizing::new([0; USER_SECRET_LEN]);
		rng.fill_bytes(&mut secret[..]);
		let lifetime = u32::try_from(self.key_lifetime.as_secs()).unwrap_or(u32::MAX);
		let mut data = state.data.clone();
		data.entries.push(KeyringEntry {
			name: name.into(),
			secret: secret.clone(),
			expires: now.saturating_add(lifetime),
		});
		self.persist(rng, &data, &state.password, now)?;
		state.data = data;
		debug!(target: self.log_target, "Minted new secret for {:?}", name);
		Ok(secret)
	}

	/// Add a fresh secret for `name`, valid for the configured key lifetime, and save.
	pub fn mint_new_secret(
		&self,
		rng: &mut (impl Rng + CryptoRng),
		name: &str,
		now: u32,
	) -> Result<Zeroizing<UserSecret>, Error> {
		let mut state = self.state.lock();
		self.mint_locked(rng, &mut state, name, now)
	}

	/// The newest unexpired secret for `name`, minting one if there is none.
	pub fn current_secret(
		&self,
		rng: &mut (impl Rng + CryptoRng),
		name: &str,
		now: u32,
	) -> Result<Zeroizing<UserSecret>, Error> {
		let mut state = self.state.lock();
		let current = state
			.data
			.entries
			.iter()
			.filter(|entry| entry.name == name && now < entry.expires)
			.max_by_key(|entry| entry.expires)
			.map(|entry| entry.secret.clone());
		match current {
			Some(secret) => Ok(secret),
			None => self.mint_locked(rng, &mut state, name, now),
		}
	}

	pub fn change_password(
		&self,
		rng: &mut (impl Rng + CryptoRng),
		password: &str,
		now: u32,
	) -> Result<(), Error> {
		let mut state = self.state.lock();
		self.persist(rng, &state.data, password, now)?;
		state.password = Zeroizing::new(password.into());
		Ok(())
	}

	pub fn save(&self, rng: &mut (impl Rng + CryptoRng), now: u32) -> Result<(), Error> {
		let state = self.state.lock();
		self.persist(rng, &state.data, &state.password, now)
	}
}

/// Keyring stored in a file. The file is replaced atomically on every save.
pub struct FileKeyringStorage {
	path: PathBuf,
}

impl FileKeyringStorage {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl KeyringStorage for FileKeyringStorage {
	fn load(&self) -> io::Result<Option<String>> {
		match fs::read_to_string(&self.path) {
			Ok(text) => Ok(Some(text)),
			Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(err) => Err(err),
		}
	}

	fn store(&self, text: &str) -> io::Result<()> {
		let tmp = self.path.with_extension("tmp");
		fs::write(&tmp, text)?;
		fs::rename(&tmp, &self.path)
	}
}

/// Keyring kept in memory only.
#[derive(Default)]
pub struct MemoryKeyringStorage {
	text: Mutex<Option<String>>,
}

impl MemoryKeyringStorage {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_contents(text: String) -> Self {
		Self { text: Mutex::new(Some(text)) }
	}

	pub fn contents(&self) -> Option<String> {
		self.text.lock().clone()
	}
}

impl KeyringStorage for MemoryKeyringStorage {
	fn load(&self) -> io::Result<Option<String>> {
		Ok(self.contents())
	}

	fn store(&self, text: &str) -> io::Result<()> {
		*self.text.lock() = Some(text.into());
		Ok(())
	}
}
