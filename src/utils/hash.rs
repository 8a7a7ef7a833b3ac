use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Lowercase hex SHA-256 of `text`'s UTF-8 bytes.
///
/// Only used for stable identity keys, never for anything security-relevant.
#[must_use]
pub fn sha256(text: &str) -> String {
	let digest = Sha256::digest(text.as_bytes());
	let mut hex = String::with_capacity(64);
	for byte in digest.iter() {
		let _ = write!(hex, "{:02x}", byte);
	}
	hex
}

/// The first `len` hex digits of [`sha256`].
#[must_use]
pub fn sha256_trim_l(text: &str, len: usize) -> String {
	let mut hex = sha256(text);
	hex.truncate(len);
	hex
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn known_digests() {
		assert_eq!(sha256(""), "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
		assert_eq!(sha256("abc"), "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
	}

	#[test]
	fn trimmed() {
		assert_eq!(sha256_trim_l("abc", 16), "ba7816bf8f01cfea");
		assert_eq!(sha256_trim_l("abc", 100).len(), 64);
	}
}
