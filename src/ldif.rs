//! LDIF output for entries, as described in RFC 2849.
use std::io::{self, Write};

use base64::Engine;

use crate::entry::Entry;

/// Lines longer than this are folded.
const MAX_LINE_LENGTH: usize = 76;

/// Whether a value can be written as-is, i.e. is a SAFE-STRING. Trailing
/// spaces are encoded as well since readers tend to strip them.
fn is_safe(value: &[u8]) -> bool {
	match (value.first(), value.last()) {
		(None, _) => true,
		(Some(b' ' | b':' | b'<'), _) | (_, Some(b' ')) => false,
		_ => value.iter().all(|&byte| byte.is_ascii() && !matches!(byte, b'\0' | b'\n' | b'\r')),
	}
}

/// Render one `name: value` line, base64 encoding the value if needed.
fn line(name: &str, value: &[u8]) -> String {
	if is_safe(value) {
		// safe strings are ASCII
		format!("{name}: {}", String::from_utf8_lossy(value))
	} else {
		format!("{name}:: {}", base64::engine::general_purpose::STANDARD.encode(value))
	}
}

/// Split `line` after at most `max_bytes` octets, backing off to the closest
/// character boundary.
fn cut_str_to_max(line: &str, mut max_bytes: usize) -> (&str, &str) {
	if line.len() <= max_bytes {
		return (line, "");
	}
	while !line.is_char_boundary(max_bytes) {
		max_bytes -= 1;
	}
	line.split_at(max_bytes)
}

/// Write a line, folding it so no physical line exceeds [`MAX_LINE_LENGTH`]
/// octets. Continuation lines start with a single space.
fn write_folded(writer: &mut impl Write, line: &str) -> io::Result<()> {
	let (first, mut rest) = cut_str_to_max(line, MAX_LINE_LENGTH);
	writeln!(writer, "{first}")?;
	while !rest.is_empty() {
		let (chunk, tail) = cut_str_to_max(rest, MAX_LINE_LENGTH - 1);
		writeln!(writer, " {chunk}")?;
		rest = tail;
	}
	Ok(())
}

impl Entry {
	/// Write the entry as an LDIF record, followed by an empty line.
	/// Attributes are written in name order, values in their stored order.
	pub fn write_ldif(&self, writer: &mut impl Write) -> io::Result<()> {
		write_folded(writer, &line("dn", self.dn().as_bytes()))?;
		for (name, values) in self.attributes() {
			for value in values {
				write_folded(writer, &line(name, value.as_bytes()))?;
			}
		}
		writeln!(writer)
	}

	/// The entry as an LDIF record.
	#[must_use]
	pub fn to_ldif(&self) -> String {
		let mut buffer = Vec::new();
		// writing to a Vec never fails
		let _ = self.write_ldif(&mut buffer);
		String::from_utf8_lossy(&buffer).into_owned()
	}
}
