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

//! ASCII armor: `-----BEGIN <TITLE>-----`, optional `Name: value` header lines, a blank line,
//! the body, and a matching end marker.

use super::error::FormatError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::{borrow::Cow, ops::Range};

/// Base64 line length when encoding.
const LINE_LEN: usize = 64;

fn marker(kind: &str, title: &str) -> String {
	format!("-----{} {}-----", kind, title)
}

/// If `line` is a marker, possibly behind mail quoting (`> `), return the quoting.
fn quote_prefix<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
	line.trim_end()
		.strip_suffix(marker)
		.filter(|prefix| prefix.chars().all(|c| c == '>' || c == ' '))
}

/// One armored block found in some text.
#[derive(Debug)]
pub struct Block<'a> {
	/// Byte range of the block, markers included, in the scanned text.
	pub span: Range<usize>,
	/// The block was quoted, ie it is part of an earlier message being replied to.
	pub quoted: bool,
	source: &'a str,
	headers: Vec<(&'a str, &'a str)>,
	/// Body lines with the quoting removed.
	body: Vec<&'a str>,
	/// Byte range of the body in the scanned text, up to the start of the end marker line.
	body_span: Range<usize>,
	/// No quoting or indentation was removed from the lines.
	verbatim: bool,
}

impl<'a> Block<'a> {
	/// `lines` holds the offset and unquoted content of each line between the markers.
	fn parse(
		source: &'a str,
		span: Range<usize>,
		prefix: &str,
		lines: Vec<(usize, &'a str)>,
		end_start: usize,
	) -> Self {
		let mut headers = Vec::new();
		let mut rest = &lines[..];
		while let Some((&(_, line), tail)) = rest.split_first() {
			match line.split_once(": ") {
				Some((name, value)) if !name.is_empty() && !name.contains(' ') => {
					headers.push((name, value.trim_end()));
					rest = tail;
				},
				_ => break,
			}
		}
		if let Some((&(_, line), tail)) = rest.split_first() {
			if line.trim().is_empty() {
				rest = tail;
			}
		}
		let body_start = rest.first().map_or(end_start, |(offset, _)| *offset);
		Self {
			span,
			quoted: prefix.contains('>'),
			source,
			headers,
			body: rest.iter().map(|(_, line)| *line).collect(),
			body_span: body_start..end_start,
			verbatim: prefix.is_empty(),
		}
	}

	/// Value of the first header line with the given name (compared case-insensitively).
	pub fn header(&self, name: &str) -> Option<&'a str> {
		self.headers
			.iter()
			.find(|(n, _)| n.eq_ignore_ascii_case(name))
			.map(|(_, value)| *value)
	}

	/// The body as text. For an unquoted block this is exactly the text between the blank line
	/// after the headers and the line break before the end marker.
	pub fn text(&self) -> Cow<'a, str> {
		if !self.verbatim {
			return Cow::Owned(self.body.join("\n"))
		}
		let body = &self.source[self.body_span.clone()];
		let body = match body.strip_suffix('\n') {
			Some(body) => body.strip_suffix('\r').unwrap_or(body),
			None => body,
		};
		Cow::Borrowed(body)
	}

	/// The body decoded as base64.
	pub fn decode_body(&self) -> Result<Vec<u8>, FormatError> {
		let encoded: String =
			self.body.iter().flat_map(|line| line.chars()).filter(|c| !c.is_whitespace()).collect();
		Ok(STANDARD.decode(encoded)?)
	}
}

struct Pending<'a> {
	start: usize,
	prefix: &'a str,
	lines: Vec<(usize, &'a str)>,
}

/// Find every block with the given title in `text`, quoted or not. Quoting is recognised by the
/// begin marker and removed from the lines of that block only.
pub fn scan<'a>(text: &'a str, title: &str) -> Result<Vec<Block<'a>>, FormatError> {
	let begin = marker("BEGIN", title);
	let end = marker("END", title);
	let mut blocks = Vec::new();
	let mut pending: Option<Pending<'a>> = None;
	let mut offset = 0;
	for raw in text.split_inclusive('\n') {
		let start = offset;
		offset += raw.len();
		let line = raw.trim_end_matches(|c| c == '\n' || c == '\r');
		match pending.take() {
			Some(mut p) => {
				let unquoted = line
					.strip_prefix(p.prefix)
					.or_else(|| line.strip_prefix(p.prefix.trim_end()))
					.unwrap_or(line);
				if unquoted.trim_end() == end {
					blocks.push(Block::parse(text, p.start..offset, p.prefix, p.lines, start));
				} else {
					p.lines.push((start, unquoted));
					pending = Some(p);
				}
			},
			None =>
				if let Some(prefix) = quote_prefix(line, &begin) {
					pending = Some(Pending { start, prefix, lines: Vec::new() });
				},
		}
	}
	if pending.is_some() {
		return Err(FormatError::BadArmor("missing end marker"))
	}
	Ok(blocks)
}

/// The first unquoted block with the given title in `text`.
pub fn first_block<'a>(text: &'a str, title: &'static str) -> Result<Block<'a>, FormatError> {
	scan(text, title)?
		.into_iter()
		.find(|block| !block.quoted)
		.ok_or(FormatError::MissingArmor(title))
}

fn encode_with(title: &str, headers: &[(&str, &str)], body_lines: &[&str]) -> String {
	let mut out = marker("BEGIN", title);
	out.push('\n');
	for (name, value) in headers {
		out.push_str(name);
		out.push_str(": ");
		out.push_str(value);
		out.push('\n');
	}
	out.push('\n');
	for line in body_lines {
		out.push_str(line);
		out.push('\n');
	}
	out.push_str(&marker("END", title));
	out.push('\n');
	out
}

/// Armor binary data, base64 encoded.
pub fn encode(title: &str, headers: &[(&str, &str)], body: &[u8]) -> String {
	let encoded = STANDARD.encode(body);
	// Base64 output is ASCII, so splitting on byte boundaries is fine
	let lines: Vec<&str> = encoded
		.as_bytes()
		.chunks(LINE_LEN)
		.map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
		.collect();
	encode_with(title, headers, &lines)
}

/// Armor text as is. [`Block::text`] gives back exactly `text`.
pub fn encode_text(title: &str, headers: &[(&str, &str)], text: &str) -> String {
	encode_with(title, headers, &[text])
}
