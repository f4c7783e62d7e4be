//! SMS TPDU encoding and decoding (3GPP TS 23.040).
//!
//! Encodes SMS-SUBMIT PDUs for `AT+CMGS`/`AT+CMGW` and decodes SMS-DELIVER
//! PDUs from `AT+CMGR`/`AT+CMGL`. Text is carried as GSM-7 packed septets
//! when every character fits the default alphabet, UCS-2 otherwise:
//!
//! - GSM-7: 160 characters single-part, 153 per part when concatenated
//! - UCS-2: 70 UTF-16 units single-part, 67 per part
//!
//! Concatenated parts carry the 6-octet concatenation header (information
//! element 0x00: reference, total, sequence) in the user-data header. The
//! header costs 7 septets in GSM-7 (48 bits rounded up to a septet
//! boundary, one fill bit) and 6 octets in UCS-2.

use wwanlib_core::encoding::{gsm7_from_char, gsm7_to_char, is_gsm7, Gsm7Char, GSM7_ESCAPE};
use wwanlib_core::error::{Error, Result};

/// GSM-7 capacity of a single-part message, in septets.
const GSM7_SINGLE: usize = 160;
/// GSM-7 text capacity per concatenated part (160 minus the 7-septet UDH).
const GSM7_PART: usize = 153;
/// UCS-2 capacity of a single-part message, in UTF-16 units.
const UCS2_SINGLE: usize = 70;
/// UCS-2 text capacity per concatenated part ((140 - 6) / 2).
const UCS2_PART: usize = 67;

/// One encoded SUBMIT PDU, ready for `AT+CMGS=<len>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduPart {
    /// TPDU length in octets, excluding the SMSC field. This is the
    /// argument to `+CMGS`/`+CMGW`.
    pub len: usize,
    /// The PDU as uppercase hex, including the empty SMSC field.
    pub hex: String,
}

/// Concatenation info from a DELIVER user-data header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcatInfo {
    /// Message reference shared by all parts.
    pub reference: u16,
    /// Total number of parts.
    pub total: u8,
    /// This part's 1-based sequence number.
    pub sequence: u8,
}

/// A decoded SMS-DELIVER.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deliver {
    /// Originating address, `+`-prefixed when international.
    pub sender: String,
    /// Service-centre timestamp, `YY/MM/DD HH:MM:SS`.
    pub scts: String,
    /// Decoded text (this part only, for concatenated messages).
    pub text: String,
    /// Present when this is one part of a concatenated message.
    pub concat: Option<ConcatInfo>,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `text` to `recipient` as one or more SUBMIT PDUs.
///
/// `concat_ref` identifies the parts of a multipart message to the
/// receiving side; it is only used when the text does not fit one PDU.
/// Parts come back in sequence order and must be submitted in that order.
pub fn encode_submit(recipient: &str, text: &str, concat_ref: u8) -> Result<Vec<PduPart>> {
    let address = encode_address(recipient)?;

    if is_gsm7(text) {
        let septets = text_to_septets(text);
        if septets.len() <= GSM7_SINGLE {
            return Ok(vec![build_submit(&address, None, 0x00, septets.len(), &pack_septets(&septets, 0))]);
        }
        let chunks = split_gsm7(text, GSM7_PART);
        let total = chunk_count(chunks.len())?;
        let parts = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let septets = text_to_septets(chunk);
                let udh = concat_udh(concat_ref, total, i as u8 + 1);
                // The 6-octet header occupies 7 septets; packing resumes
                // after 1 fill bit.
                let mut ud = udh;
                ud.extend_from_slice(&pack_septets(&septets, 1));
                build_submit(&address, Some(7 + septets.len()), 0x00, 0, &ud)
            })
            .collect();
        return Ok(parts);
    }

    // UCS-2 path.
    let units: Vec<u16> = text.encode_utf16().collect();
    if units.len() <= UCS2_SINGLE {
        return Ok(vec![build_submit(
            &address,
            None,
            0x08,
            units.len() * 2,
            &units_to_bytes(&units),
        )]);
    }
    let chunks = split_ucs2(text, UCS2_PART);
    let total = chunk_count(chunks.len())?;
    let parts = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let units: Vec<u16> = chunk.encode_utf16().collect();
            let mut ud = concat_udh(concat_ref, total, i as u8 + 1);
            ud.extend_from_slice(&units_to_bytes(&units));
            build_submit(&address, Some(6 + units.len() * 2), 0x08, 0, &ud)
        })
        .collect();
    Ok(parts)
}

fn chunk_count(n: usize) -> Result<u8> {
    u8::try_from(n).map_err(|_| Error::InvalidParameter(format!("message needs {n} parts, limit is 255")))
}

/// Assemble the TPDU. `udl_override` carries the UDL for parts with a
/// header (where it is not simply the payload length); `udl_plain` is used
/// otherwise.
fn build_submit(
    address: &[u8],
    udl_override: Option<usize>,
    dcs: u8,
    udl_plain: usize,
    user_data: &[u8],
) -> PduPart {
    let mut tpdu: Vec<u8> = Vec::with_capacity(16 + user_data.len());
    let udhi = if udl_override.is_some() { 0x40 } else { 0x00 };
    tpdu.push(0x01 | udhi); // SMS-SUBMIT, no validity period
    tpdu.push(0x00); // message reference, assigned by the modem
    tpdu.extend_from_slice(address);
    tpdu.push(0x00); // protocol identifier
    tpdu.push(dcs);
    tpdu.push(udl_override.unwrap_or(udl_plain) as u8);
    tpdu.extend_from_slice(user_data);

    let mut hex = String::from("00"); // empty SMSC: use the modem's default
    for byte in &tpdu {
        hex.push_str(&format!("{byte:02X}"));
    }
    PduPart {
        len: tpdu.len(),
        hex,
    }
}

/// Encode a destination address: digit count, type octet, swapped
/// semi-octets.
fn encode_address(number: &str) -> Result<Vec<u8>> {
    let (digits, toa) = match number.strip_prefix('+') {
        Some(rest) => (rest, 0x91u8),
        None => (number, 0x81u8),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidParameter(format!(
            "invalid recipient number: {number:?}"
        )));
    }
    let mut out = vec![digits.len() as u8, toa];
    out.extend_from_slice(&swap_semi_octets(digits));
    Ok(out)
}

/// Swap digit pairs into semi-octets, padding odd lengths with F.
fn swap_semi_octets(digits: &str) -> Vec<u8> {
    let bytes = digits.as_bytes();
    let mut out = Vec::with_capacity((bytes.len() + 1) / 2);
    for pair in bytes.chunks(2) {
        let low = pair[0] - b'0';
        let high = if pair.len() == 2 { pair[1] - b'0' } else { 0x0F };
        out.push((high << 4) | low);
    }
    out
}

/// The 6-octet concatenation user-data header (UDHL + IE 0x00).
fn concat_udh(reference: u8, total: u8, sequence: u8) -> Vec<u8> {
    vec![0x05, 0x00, 0x03, reference, total, sequence]
}

fn units_to_bytes(units: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(units.len() * 2);
    for unit in units {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

/// Expand text into GSM-7 septet values, escape pairs included.
fn text_to_septets(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match gsm7_from_char(c) {
            Some(Gsm7Char::Plain(s)) => out.push(s),
            Some(Gsm7Char::Extended(s)) => {
                out.push(GSM7_ESCAPE);
                out.push(s);
            }
            // encode_submit only reaches here after an is_gsm7 check;
            // substitute rather than fail on a race with the caller.
            None => out.push(b'?' & 0x7F),
        }
    }
    out
}

/// Split text into chunks of at most `budget` septets, never splitting an
/// escape pair.
fn split_gsm7(text: &str, budget: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut used = 0usize;
    for c in text.chars() {
        let cost = match gsm7_from_char(c) {
            Some(Gsm7Char::Extended(_)) => 2,
            _ => 1,
        };
        if used + cost > budget {
            chunks.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push(c);
        used += cost;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split text into chunks of at most `budget` UTF-16 units, never splitting
/// a surrogate pair.
fn split_ucs2(text: &str, budget: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut used = 0usize;
    for c in text.chars() {
        let cost = c.len_utf16();
        if used + cost > budget {
            chunks.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push(c);
        used += cost;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Pack septets LSB-first with `fill_bits` zero bits in front (the padding
/// that realigns text after an odd-length header).
fn pack_septets(septets: &[u8], fill_bits: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(septets.len() * 7 / 8 + 1);
    let mut acc: u32 = 0;
    let mut nbits: u32 = fill_bits;
    for &septet in septets {
        acc |= u32::from(septet & 0x7F) << nbits;
        nbits += 7;
        while nbits >= 8 {
            out.push((acc & 0xFF) as u8);
            acc >>= 8;
            nbits -= 8;
        }
    }
    if nbits > 0 {
        out.push((acc & 0xFF) as u8);
    }
    out
}

/// Unpack `count` septets, discarding `fill_bits` leading bits.
fn unpack_septets(data: &[u8], count: usize, fill_bits: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(count);
    let mut acc: u32 = 0;
    let mut nbits: u32 = 0;
    let mut fill = fill_bits;
    for &byte in data {
        acc |= u32::from(byte) << nbits;
        nbits += 8;
        if fill > 0 {
            let drop = fill.min(nbits);
            acc >>= drop;
            nbits -= drop;
            fill -= drop;
        }
        while nbits >= 7 && out.len() < count {
            out.push((acc & 0x7F) as u8);
            acc >>= 7;
            nbits -= 7;
        }
    }
    out
}

fn septets_to_text(septets: &[u8]) -> String {
    let mut out = String::with_capacity(septets.len());
    let mut escaped = false;
    for &septet in septets {
        if septet == GSM7_ESCAPE && !escaped {
            escaped = true;
            continue;
        }
        out.push(gsm7_to_char(septet, escaped));
        escaped = false;
    }
    out
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Cursor over PDU octets with typed read errors.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> Result<u8> {
        let byte = self
            .data
            .get(self.pos)
            .copied()
            .ok_or_else(|| truncated(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        let slice = self.data.get(self.pos..end).ok_or_else(|| truncated(end))?;
        self.pos = end;
        Ok(slice)
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }
}

fn truncated(at: usize) -> Error {
    Error::MalformedResponse {
        raw: format!("PDU truncated at octet {at}"),
    }
}

/// Decode an SMS-DELIVER PDU from the hex `AT+CMGR`/`AT+CMGL` payload.
pub fn decode_deliver(hex: &str) -> Result<Deliver> {
    let bytes = hex_to_bytes(hex)?;
    let mut r = Reader {
        data: &bytes,
        pos: 0,
    };

    // SMSC field: length in octets, skipped entirely.
    let smsc_len = r.u8()? as usize;
    r.take(smsc_len)?;

    let first = r.u8()?;
    if first & 0x03 != 0x00 {
        return Err(Error::MalformedResponse {
            raw: format!("not an SMS-DELIVER (first octet {first:#04X})"),
        });
    }
    let has_udh = first & 0x40 != 0;

    // Originating address: length is in digits (semi-octets).
    let oa_digits = r.u8()? as usize;
    let oa_type = r.u8()?;
    let oa_octets = (oa_digits + 1) / 2;
    let oa_raw = r.take(oa_octets)?;
    let sender = decode_address(oa_raw, oa_digits, oa_type);

    let _pid = r.u8()?;
    let dcs = r.u8()?;
    let scts = decode_scts(r.take(7)?);
    let udl = r.u8()? as usize;

    let mut concat = None;
    let mut udh_octets = 0usize;
    let mut body = r.rest();
    if has_udh {
        let mut ur = Reader { data: body, pos: 0 };
        let udhl = ur.u8()? as usize;
        let mut ies = Reader {
            data: ur.take(udhl)?,
            pos: 0,
        };
        while let Ok(iei) = ies.u8() {
            let ie_len = ies.u8()? as usize;
            let ie = ies.take(ie_len)?;
            match (iei, ie_len) {
                (0x00, 3) => {
                    concat = Some(ConcatInfo {
                        reference: u16::from(ie[0]),
                        total: ie[1],
                        sequence: ie[2],
                    });
                }
                (0x08, 4) => {
                    concat = Some(ConcatInfo {
                        reference: u16::from_be_bytes([ie[0], ie[1]]),
                        total: ie[2],
                        sequence: ie[3],
                    });
                }
                _ => {}
            }
        }
        udh_octets = udhl + 1;
        body = &body[udh_octets..];
    }

    let text = match dcs & 0x0C {
        0x08 => {
            // UCS-2.
            let take = (udl.saturating_sub(udh_octets)) & !1;
            let units: Vec<u16> = body
                .get(..take.min(body.len()))
                .unwrap_or(body)
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        0x04 => {
            // 8-bit data: surface as hex.
            body.iter().map(|b| format!("{b:02X}")).collect()
        }
        _ => {
            // GSM-7. With a header, the UDL counts the header's septets
            // and packing starts after fill bits.
            let udh_bits = udh_octets * 8;
            let udh_septets = (udh_bits + 6) / 7;
            let fill = (udh_septets * 7 - udh_bits) as u32;
            let count = udl.saturating_sub(udh_septets);
            septets_to_text(&unpack_septets(body, count, fill))
        }
    };

    Ok(Deliver {
        sender,
        scts,
        text,
        concat,
    })
}

fn decode_address(raw: &[u8], digits: usize, toa: u8) -> String {
    // Alphanumeric addresses (TON 101) are GSM-7 packed.
    if toa & 0x70 == 0x50 {
        let count = digits * 4 / 7;
        return septets_to_text(&unpack_septets(raw, count, 0));
    }
    let mut number = String::with_capacity(digits + 1);
    if toa & 0x70 == 0x10 {
        number.push('+');
    }
    for byte in raw {
        let low = byte & 0x0F;
        let high = byte >> 4;
        number.push(char::from(b'0' + low));
        if high != 0x0F {
            number.push(char::from(b'0' + high));
        }
    }
    number
}

fn decode_scts(raw: &[u8]) -> String {
    let nibbles: Vec<u8> = raw.iter().map(|b| ((b & 0x0F) * 10) + (b >> 4)).collect();
    format!(
        "{:02}/{:02}/{:02} {:02}:{:02}:{:02}",
        nibbles[0], nibbles[1], nibbles[2], nibbles[3], nibbles[4], nibbles[5]
    )
}

fn hex_to_bytes(hex: &str) -> Result<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return Err(Error::MalformedResponse {
            raw: format!("odd-length PDU hex ({} digits)", hex.len()),
        });
    }
    hex.as_bytes()
        .chunks_exact(2)
        .map(|pair| {
            let s = std::str::from_utf8(pair).map_err(|_| Error::MalformedResponse {
                raw: "PDU hex is not ASCII".into(),
            })?;
            u8::from_str_radix(s, 16).map_err(|_| Error::MalformedResponse {
                raw: format!("invalid PDU hex digits: {s:?}"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Septet packing
    // ---------------------------------------------------------------

    #[test]
    fn pack_hello() {
        let septets = text_to_septets("hello");
        assert_eq!(pack_septets(&septets, 0), [0xE8, 0x32, 0x9B, 0xFD, 0x06]);
    }

    #[test]
    fn pack_hellohello() {
        let septets = text_to_septets("hellohello");
        assert_eq!(
            pack_septets(&septets, 0),
            [0xE8, 0x32, 0x9B, 0xFD, 0x46, 0x97, 0xD9, 0xEC, 0x37]
        );
    }

    #[test]
    fn unpack_inverts_pack() {
        let septets = text_to_septets("hello world");
        let packed = pack_septets(&septets, 0);
        assert_eq!(unpack_septets(&packed, septets.len(), 0), septets);
        let packed = pack_septets(&septets, 1);
        assert_eq!(unpack_septets(&packed, septets.len(), 1), septets);
    }

    #[test]
    fn escape_pairs_cost_two_septets() {
        let septets = text_to_septets("a€b");
        assert_eq!(septets, [97, GSM7_ESCAPE, 0x65, 98]);
    }

    // ---------------------------------------------------------------
    // Address encoding
    // ---------------------------------------------------------------

    #[test]
    fn semi_octet_swap() {
        assert_eq!(
            swap_semi_octets("46708251358"),
            [0x64, 0x07, 0x28, 0x51, 0x53, 0xF8]
        );
    }

    #[test]
    fn international_address() {
        let addr = encode_address("+34654123456").unwrap();
        assert_eq!(addr[0], 11); // digit count
        assert_eq!(addr[1], 0x91);
        assert_eq!(&addr[2..], [0x43, 0x56, 0x14, 0x32, 0x54, 0xF6]);
    }

    #[test]
    fn national_address() {
        let addr = encode_address("654123456").unwrap();
        assert_eq!(addr[0], 9);
        assert_eq!(addr[1], 0x81);
    }

    #[test]
    fn bad_address_rejected() {
        assert!(encode_address("").is_err());
        assert!(encode_address("+34abc").is_err());
    }

    // ---------------------------------------------------------------
    // SUBMIT encoding
    // ---------------------------------------------------------------

    #[test]
    fn submit_single_gsm7() {
        let parts = encode_submit("+34654123456", "hola", 0).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].hex, "0001000B914356143254F6000004E8373B0C");
        assert_eq!(parts[0].len, 17);
    }

    #[test]
    fn submit_single_ucs2() {
        let parts = encode_submit("+34654123456", "中文", 0).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].hex, "0001000B914356143254F60008044E2D6587");
        assert_eq!(parts[0].len, 17);
    }

    #[test]
    fn submit_160_chars_is_single_part() {
        let text = "a".repeat(160);
        let parts = encode_submit("+34654123456", &text, 7).unwrap();
        assert_eq!(parts.len(), 1);
        // No UDHI bit on the first TPDU octet.
        assert!(parts[0].hex.starts_with("0001"));
    }

    #[test]
    fn submit_161_chars_splits_into_two() {
        let text = "a".repeat(161);
        let parts = encode_submit("+34654123456", &text, 0x2A).unwrap();
        assert_eq!(parts.len(), 2);
        for (i, part) in parts.iter().enumerate() {
            // UDHI set on every part.
            assert!(part.hex.starts_with("0041"), "part {i}: {}", part.hex);
            // Concat header: 05 00 03 ref=2A total=02 seq.
            let udh = format!("0500032A02{:02X}", i + 1);
            assert!(part.hex.contains(&udh), "part {i} lacks UDH {udh}");
        }
        // First part carries a full 153-septet payload: UDL = 153 + 7.
        let udl = u8::from_str_radix(&parts[0].hex[26..28], 16).unwrap();
        assert_eq!(udl, 160);
    }

    #[test]
    fn submit_multipart_ucs2_budget() {
        let text = "中".repeat(71);
        let parts = encode_submit("+34654123456", &text, 1).unwrap();
        assert_eq!(parts.len(), 2);
        // 67 units in the first part, 4 in the second.
        let udl = u8::from_str_radix(&parts[0].hex[26..28], 16).unwrap();
        assert_eq!(udl as usize, 6 + 67 * 2);
    }

    #[test]
    fn euro_sign_stays_gsm7() {
        let parts = encode_submit("+34654123456", "100€", 0).unwrap();
        // DCS octet (offset 24..26 for this address length) must be 00.
        assert_eq!(&parts[0].hex[24..26], "00");
    }

    // ---------------------------------------------------------------
    // DELIVER decoding
    // ---------------------------------------------------------------

    const DELIVER_HOLA: &str = "07914306073011F0040B914316709807F2000070203121543280";

    #[test]
    fn decode_plain_deliver() {
        let hex = format!("{DELIVER_HOLA}04E8373B0C");
        let d = decode_deliver(&hex).unwrap();
        assert_eq!(d.sender, "+34610789702");
        assert_eq!(d.text, "hola");
        assert_eq!(d.scts, "07/02/13 12:45:23");
        assert_eq!(d.concat, None);
    }

    #[test]
    fn decode_concatenated_deliver_part() {
        let hex = "07914306073011F0440B914316709807F20000702031215432800B0500032A0201D06F7618";
        let d = decode_deliver(hex).unwrap();
        assert_eq!(d.text, "hola");
        assert_eq!(
            d.concat,
            Some(ConcatInfo {
                reference: 0x2A,
                total: 2,
                sequence: 1,
            })
        );
    }

    #[test]
    fn decode_ucs2_deliver() {
        let hex = "07914306073011F0040B914316709807F2000870203121543280044E2D6587";
        let d = decode_deliver(hex).unwrap();
        assert_eq!(d.text, "中文");
    }

    #[test]
    fn decode_rejects_truncated_pdu() {
        assert!(decode_deliver("0791430607").is_err());
    }

    #[test]
    fn decode_rejects_bad_hex() {
        assert!(decode_deliver("zz91").is_err());
        assert!(decode_deliver("079").is_err());
    }

    #[test]
    fn decode_own_multipart_text_boundary() {
        // The split point must not lose or duplicate characters across
        // parts: 161 'a's become 153 + 8.
        let text = "a".repeat(161);
        let chunks = split_gsm7(&text, GSM7_PART);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 153);
        assert_eq!(chunks[1].len(), 8);
    }

    #[test]
    fn split_never_divides_escape_pair() {
        // '€' costs two septets; with budget 3 the pair moves whole.
        let chunks = split_gsm7("ab€cd", 3);
        assert_eq!(chunks, ["ab", "€c", "d"]);
    }
}
