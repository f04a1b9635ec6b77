// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tells Azure AD object identifiers apart from cluster-native group names.
//!
//! Kubernetes reports both kinds of group in the same `user.groups` list. Only
//! strings in the canonical version-4 UUID shape
//! (`xxxxxxxx-xxxx-4xxx-Vxxx-xxxxxxxxxxxx`, `V` one of `8 9 a b`, any case) are
//! sent to the directory; everything else is used as-is.

const GUID_LEN: usize = 36;
const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];
const VERSION_POSITION: usize = 14;
const VARIANT_POSITION: usize = 19;

/// Returns true iff `s` is a hyphenated version-4 UUID.
pub fn is_directory_identifier(s: &str) -> bool {
	let bytes = s.as_bytes();
	if bytes.len() != GUID_LEN {
		return false;
	}

	bytes.iter().enumerate().all(|(i, &b)| match i {
		_ if HYPHEN_POSITIONS.contains(&i) => b == b'-',
		VERSION_POSITION => b == b'4',
		VARIANT_POSITION => matches!(b, b'8' | b'9' | b'a' | b'b' | b'A' | b'B'),
		_ => b.is_ascii_hexdigit(),
	})
}
