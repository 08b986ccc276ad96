//! # Hex Rendering Utilities
//!
//! NBE frames are mostly ASCII text framed by a few control bytes, so a plain
//! hex dump hides what matters. [`escape_frame`] keeps the text readable and
//! only spells out the non-printable bytes.
//!
//! ```rust
//! use pbm_rs::util::hex::{encode_hex, escape_frame};
//!
//! assert_eq!(encode_hex(&[0x02, 0x04]), "0204");
//! assert_eq!(escape_frame(b"ab\x02cd\x04"), "ab<02>cd<04>");
//! ```

/// Encode bytes to lowercase hex string
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Renders printable ASCII verbatim and every other byte as `<xx>`.
pub fn escape_frame(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    for &byte in data {
        if byte.is_ascii_graphic() || byte == b' ' {
            out.push(byte as char);
        } else {
            out.push('<');
            out.push_str(&hex::encode([byte]));
            out.push('>');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_hex() {
        assert_eq!(encode_hex(&[]), "");
        assert_eq!(encode_hex(&[0xde, 0xad]), "dead");
    }

    #[test]
    fn test_escape_frame() {
        assert_eq!(escape_frame(b"DeliciousABC"), "DeliciousABC");
        assert_eq!(escape_frame(b"a b"), "a b");
        assert_eq!(escape_frame(&[0x02, b'0', 0x04, 0xff]), "<02>0<04><ff>");
    }
}
