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

//! Record of consumed decoding handles.

use super::Tag;
use hashlink::LinkedHashSet;
use log::debug;

/// Bounded set of decoding handles that have already produced a message. Once full, the oldest
/// handle is forgotten to make room for a new one.
pub struct ReplayFilter {
	capacity: usize,
	handles: LinkedHashSet<Tag>,
}

impl ReplayFilter {
	pub fn new(capacity: usize) -> Self {
		Self { capacity, handles: LinkedHashSet::with_capacity(capacity) }
	}

	pub fn len(&self) -> usize {
		self.handles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.handles.is_empty()
	}

	pub fn contains(&self, tag: &Tag) -> bool {
		self.handles.contains(tag)
	}

	/// Record `tag` as consumed. Returns `false` if it was already recorded.
	pub fn insert(&mut self, tag: Tag, log_target: &str) -> bool {
		if self.capacity == 0 {
			return true
		}
		if !self.handles.insert(tag) {
			return false
		}
		if self.handles.len() > self.capacity {
			if let Some(oldest) = self.handles.pop_front() {
				debug!(
					target: log_target,
					"Replay filter full; forgetting handle {:02x?}",
					&oldest[..4]
				);
			}
		}
		true
	}
}
