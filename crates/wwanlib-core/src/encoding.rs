//! Character-set helpers: UCS-2 hex transport encoding and the GSM 03.38
//! default alphabet.
//!
//! Modems configured with `AT+CSCS="UCS2"` exchange all string parameters
//! as hex-encoded UTF-16BE. Unpacking is always an explicit caller step;
//! the response matcher returns strings exactly as the modem sent them.
//!
//! The GSM-7 alphabet tables live here so both the SMS PDU codec and the
//! wrapper's "does this text need UCS-2" decisions use one source of truth.

use crate::error::{Error, Result};

/// Encode text as UCS-2 hex (UTF-16BE, uppercase hex digits), the format
/// modems expect for string parameters when the UCS2 charset is selected.
pub fn pack_ucs2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 4);
    for unit in text.encode_utf16() {
        out.push_str(&format!("{unit:04X}"));
    }
    out
}

/// Decode UCS-2 hex back to text.
///
/// Fails if the input is not valid hex, not a multiple of four hex digits,
/// or decodes to invalid UTF-16.
pub fn unpack_ucs2(hex: &str) -> Result<String> {
    if hex.len() % 4 != 0 {
        return Err(Error::InvalidParameter(format!(
            "UCS-2 hex length {} is not a multiple of 4",
            hex.len()
        )));
    }
    let mut units = Vec::with_capacity(hex.len() / 4);
    for chunk in hex.as_bytes().chunks(4) {
        let s = std::str::from_utf8(chunk)
            .map_err(|_| Error::InvalidParameter("UCS-2 hex is not ASCII".into()))?;
        let unit = u16::from_str_radix(s, 16)
            .map_err(|_| Error::InvalidParameter(format!("invalid UCS-2 hex digits: {s:?}")))?;
        units.push(unit);
    }
    String::from_utf16(&units)
        .map_err(|_| Error::InvalidParameter("UCS-2 hex decodes to invalid UTF-16".into()))
}

/// Heuristic: does this string look like UCS-2 hex rather than plain text?
///
/// Used when normalizing operator names from `+COPS?`, where some firmwares
/// report hex regardless of the selected charset.
pub fn looks_like_ucs2(s: &str) -> bool {
    !s.is_empty() && s.len() % 4 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// A character's position in the GSM 03.38 default alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gsm7Char {
    /// A septet from the basic table.
    Plain(u8),
    /// A septet from the extension table, sent as 0x1B + septet.
    Extended(u8),
}

/// GSM 03.38 basic character table, indexed by septet value. Position 27 is
/// the escape to the extension table and never decodes to a character on
/// its own; it is mapped to a replacement here and special-cased by the
/// decoder.
pub const GSM7_BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å', 'Δ', '_',
    'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{FFFD}', 'Æ', 'æ', 'ß', 'É', ' ', '!', '"',
    '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', '0', '1', '2', '3', '4',
    '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?', '¡', 'A', 'B', 'C', 'D', 'E', 'F',
    'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X',
    'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§', '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j',
    'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö',
    'ñ', 'ü', 'à',
];

/// GSM 03.38 extension table (septet value after the 0x1B escape).
pub const GSM7_EXTENSION: &[(u8, char)] = &[
    (0x0A, '\u{0C}'),
    (0x14, '^'),
    (0x28, '{'),
    (0x29, '}'),
    (0x2F, '\\'),
    (0x3C, '['),
    (0x3D, '~'),
    (0x3E, ']'),
    (0x40, '|'),
    (0x65, '€'),
];

/// The escape septet that switches one character to the extension table.
pub const GSM7_ESCAPE: u8 = 0x1B;

/// Look up a character in the GSM-7 alphabet. `None` means the character
/// cannot be encoded in GSM-7 and the text needs UCS-2.
pub fn gsm7_from_char(c: char) -> Option<Gsm7Char> {
    if let Some(pos) = GSM7_BASIC.iter().position(|&b| b == c) {
        if pos as u8 != GSM7_ESCAPE {
            return Some(Gsm7Char::Plain(pos as u8));
        }
    }
    GSM7_EXTENSION
        .iter()
        .find(|(_, ec)| *ec == c)
        .map(|(septet, _)| Gsm7Char::Extended(*septet))
}

/// Decode a septet back to a character. `extended` selects the extension
/// table (the septet followed an escape). Unassigned extension septets
/// decode per spec as the basic-table character.
pub fn gsm7_to_char(septet: u8, extended: bool) -> char {
    if extended {
        if let Some((_, c)) = GSM7_EXTENSION.iter().find(|(s, _)| *s == septet) {
            return *c;
        }
    }
    GSM7_BASIC[(septet & 0x7F) as usize]
}

/// Returns `true` if every character of `text` fits the GSM-7 alphabet
/// (basic or extension table).
pub fn is_gsm7(text: &str) -> bool {
    text.chars().all(|c| gsm7_from_char(c).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- UCS-2 ----

    #[test]
    fn pack_ucs2_ascii() {
        assert_eq!(pack_ucs2("hola"), "0068006F006C0061");
    }

    #[test]
    fn pack_ucs2_non_ascii() {
        assert_eq!(pack_ucs2("中"), "4E2D");
    }

    #[test]
    fn unpack_ucs2_round_trip() {
        for text in ["hola", "Mövenpick", "中文短信", ""] {
            assert_eq!(unpack_ucs2(&pack_ucs2(text)).unwrap(), text);
        }
    }

    #[test]
    fn unpack_ucs2_rejects_bad_length() {
        assert!(unpack_ucs2("006").is_err());
        assert!(unpack_ucs2("00680").is_err());
    }

    #[test]
    fn unpack_ucs2_rejects_non_hex() {
        assert!(unpack_ucs2("00ZZ").is_err());
    }

    #[test]
    fn looks_like_ucs2_heuristic() {
        assert!(looks_like_ucs2("0056006F006400610066006F006E0065"));
        assert!(!looks_like_ucs2("Vodafone"));
        assert!(!looks_like_ucs2(""));
        assert!(!looks_like_ucs2("00680")); // wrong length
    }

    // ---- GSM-7 ----

    #[test]
    fn gsm7_basic_characters() {
        assert_eq!(gsm7_from_char('@'), Some(Gsm7Char::Plain(0)));
        assert_eq!(gsm7_from_char('A'), Some(Gsm7Char::Plain(65)));
        assert_eq!(gsm7_from_char('a'), Some(Gsm7Char::Plain(97)));
        assert_eq!(gsm7_from_char(' '), Some(Gsm7Char::Plain(32)));
        assert_eq!(gsm7_from_char('é'), Some(Gsm7Char::Plain(5)));
    }

    #[test]
    fn gsm7_extension_characters() {
        assert_eq!(gsm7_from_char('€'), Some(Gsm7Char::Extended(0x65)));
        assert_eq!(gsm7_from_char('{'), Some(Gsm7Char::Extended(0x28)));
        assert_eq!(gsm7_from_char('['), Some(Gsm7Char::Extended(0x3C)));
    }

    #[test]
    fn gsm7_unencodable_characters() {
        assert_eq!(gsm7_from_char('中'), None);
        assert_eq!(gsm7_from_char('€'), Some(Gsm7Char::Extended(0x65)));
        assert_eq!(gsm7_from_char('\u{1F600}'), None);
    }

    #[test]
    fn gsm7_decode_round_trip() {
        for c in ['@', 'Z', 'z', '9', 'Ñ', 'à'] {
            match gsm7_from_char(c) {
                Some(Gsm7Char::Plain(s)) => assert_eq!(gsm7_to_char(s, false), c),
                other => panic!("{c}: expected plain septet, got {other:?}"),
            }
        }
        for c in ['€', '}', '~', '|'] {
            match gsm7_from_char(c) {
                Some(Gsm7Char::Extended(s)) => assert_eq!(gsm7_to_char(s, true), c),
                other => panic!("{c}: expected extension septet, got {other:?}"),
            }
        }
    }

    #[test]
    fn is_gsm7_classification() {
        assert!(is_gsm7("hello world 123 {ok}"));
        assert!(is_gsm7("100€"));
        assert!(!is_gsm7("中文"));
        assert!(!is_gsm7("emoji \u{1F600}"));
    }
}
