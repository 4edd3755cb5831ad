//! Slug codec: deterministic mapping between storage-assigned ids and short
//! human-safe strings, plus validation for user-chosen custom slugs.
//!
//! Generated slugs never need a collision check: the codec is injective,
//! every id is assigned uniquely by storage, and custom slugs in generated
//! form are refused up front.

/// Alphabet without visually confusable characters: no `0`/`o`, no `1`/`l`.
const ALPHABET: &[u8; 32] = b"abcdefghijkmnpqrstuvwxyz23456789";

const BASE: i64 = ALPHABET.len() as i64;

/// Minimum slug length; shorter encodings are left-padded with `ALPHABET[0]`.
pub const MIN_LENGTH: usize = 4;

/// Encode a non-negative id. `encode(0) == "aaaa"`.
pub fn encode(mut id: i64) -> String {
    debug_assert!(id >= 0, "link ids are storage-assigned and non-negative");

    // Worst case for i64 in base 32 is 13 digits.
    let mut buf = [0u8; 16];
    let mut i = buf.len();
    loop {
        i -= 1;
        buf[i] = ALPHABET[(id % BASE) as usize];
        id /= BASE;
        if id == 0 {
            break;
        }
    }
    while buf.len() - i < MIN_LENGTH {
        i -= 1;
        buf[i] = ALPHABET[0];
    }
    String::from_utf8(buf[i..].to_vec()).expect("alphabet is ascii")
}

/// Inverse of `encode`. Not used on the lookup path (lookups are by slug),
/// kept invertible as an invariant. Returns `None` for characters outside
/// the alphabet.
pub fn decode(slug: &str) -> Option<i64> {
    let mut id: i64 = 0;
    for b in slug.bytes() {
        let digit = ALPHABET.iter().position(|&c| c == b)? as i64;
        id = id.checked_mul(BASE)?.checked_add(digit)?;
    }
    Some(id)
}

/// True when `slug` is exactly what `encode` produces for some id. Such
/// slugs are reserved: letting a custom slug occupy one would make the
/// matching generated insert fail forever, since the codec always re-derives
/// the same string for that id.
pub fn is_generated_form(slug: &str) -> bool {
    decode(slug).is_some_and(|id| encode(id) == slug)
}

/// Custom slugs bypass the codec entirely: lowercase alphanumeric plus
/// hyphen, non-empty. Uniqueness is enforced by the storage constraint, not
/// here.
pub fn is_valid_custom(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_encodes_to_padded_first_digit() {
        assert_eq!(encode(0), "aaaa");
        assert_eq!(encode(1), "aaab");
    }

    #[test]
    fn min_length_padding() {
        assert_eq!(encode(31), "aaa9");
        assert_eq!(encode(32), "aaba");
        // First id that needs no padding: 32^3
        assert_eq!(encode(32 * 32 * 32).len(), 4);
        assert_eq!(encode(32_i64.pow(4)).len(), 5);
    }

    #[test]
    fn alphabet_excludes_confusables() {
        for forbidden in [b'0', b'1', b'l', b'o'] {
            assert!(!ALPHABET.contains(&forbidden));
        }
        assert_eq!(ALPHABET.len(), 32);
    }

    #[test]
    fn roundtrip() {
        for id in (0..100_000).step_by(7) {
            assert_eq!(decode(&encode(id)), Some(id));
        }
        assert_eq!(decode(&encode(i64::MAX)), Some(i64::MAX));
    }

    #[test]
    fn decode_rejects_foreign_characters() {
        assert_eq!(decode("a0aa"), None);
        assert_eq!(decode("aal-"), None);
    }

    #[test]
    fn generated_form_detection() {
        assert!(is_generated_form("aaaa"));
        assert!(is_generated_form("aaad"));
        assert!(is_generated_form(&encode(12_345)));
        // Shorter than any codec output.
        assert!(!is_generated_form("go"));
        // Redundant leading padding never comes out of encode.
        assert!(!is_generated_form("aaaaa"));
        // Characters outside the alphabet.
        assert!(!is_generated_form("promo-2024"));
    }

    #[test]
    fn custom_slug_charset() {
        assert!(is_valid_custom("promo"));
        assert!(is_valid_custom("promo-2024"));
        assert!(!is_valid_custom(""));
        assert!(!is_valid_custom("Promo"));
        assert!(!is_valid_custom("pro mo"));
        assert!(!is_valid_custom("pro/mo"));
    }
}
