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

use std::time::{SystemTime, UNIX_EPOCH};

pub fn default_boxed_array<T: Default + Copy, const N: usize>() -> Box<[T; N]> {
	vec![T::default(); N]
		.into_boxed_slice()
		.try_into()
		.unwrap_or_else(|_| unreachable!("Vec has the right size"))
}

/// Current time in seconds since the Unix epoch, as stored in keyrings and reply blocks.
pub fn unix_time() -> u32 {
	let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
	secs.try_into().unwrap_or(u32::MAX)
}

pub fn read_u16(bytes: &[u8; 2]) -> u16 {
	u16::from_be_bytes(*bytes)
}

pub fn read_u32(bytes: &[u8; 4]) -> u32 {
	u32::from_be_bytes(*bytes)
}

/// `ceil(n / d)`.
pub fn div_ceil(n: usize, d: usize) -> usize {
	(n + d - 1) / d
}
