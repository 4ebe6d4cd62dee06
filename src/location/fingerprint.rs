//! Content fingerprint
//!
//! A short rolling hash over the first [`FINGERPRINT_WINDOW`] characters of a
//! node's whitespace-normalized text. Generator and Validator must agree on
//! this exact computation.

/// Number of characters covered by a fingerprint
pub const FINGERPRINT_WINDOW: usize = 100;

/// Compute the fingerprint of `text`
pub fn fingerprint(text: &str) -> String {
    let mut hash: u32 = 0;
    let mut taken = 0;

    for word in text.split_whitespace() {
        if taken > 0 {
            if taken >= FINGERPRINT_WINDOW {
                break;
            }
            hash = roll(hash, ' ');
            taken += 1;
        }
        for ch in word.chars() {
            if taken >= FINGERPRINT_WINDOW {
                break;
            }
            hash = roll(hash, ch);
            taken += 1;
        }
    }

    to_base36(hash)
}

fn roll(hash: u32, ch: char) -> u32 {
    hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(ch as u32)
}

fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
