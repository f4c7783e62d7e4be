//! Named response-pattern table.
//!
//! Commands name the pattern their response must satisfy; the engine looks
//! the pattern up by name and extracts named fields from the accumulated
//! data lines. A default table covers the generic 3GPP command set; vendor
//! capability records override individual entries (an override replaces the
//! whole entry, it never merges).
//!
//! Matched strings come back exactly as the modem sent them: no UCS-2
//! unpacking, no trimming beyond line framing. Decoding hex or UCS-2 is an
//! explicit caller step.

use std::collections::HashMap;

use regex::Regex;

use wwanlib_core::error::{Error, Result};

/// Named captures extracted from a matched response.
#[derive(Debug, Clone, Default)]
pub struct Fields {
    caps: HashMap<String, String>,
}

impl Fields {
    /// A capture by name, or `None` when the group did not participate.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.caps.get(name).map(String::as_str)
    }

    /// A capture that must be present.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name).ok_or_else(|| Error::MalformedResponse {
            raw: format!("missing capture {name:?}"),
        })
    }

    /// A required capture parsed as base-10.
    pub fn get_u32(&self, name: &str) -> Result<u32> {
        self.get_u32_radix(name, 10)
    }

    /// A required capture parsed with an explicit radix. Numeric fields are
    /// never auto-detected; vendors that report hex get radix 16 from their
    /// call sites.
    pub fn get_u32_radix(&self, name: &str, radix: u32) -> Result<u32> {
        let value = self.require(name)?;
        u32::from_str_radix(value, radix).map_err(|_| Error::MalformedResponse {
            raw: format!("{name}={value:?} is not a base-{radix} integer"),
        })
    }
}

/// The pattern table: response name to compiled regex.
///
/// Patterns are matched against the transaction's data lines joined with
/// `\n`, so `(?m)^...$` anchors work per-line and multi-line entries (like
/// `+CMGL` header + PDU) can span lines.
#[derive(Debug)]
pub struct ResponseTable {
    patterns: HashMap<&'static str, Regex>,
}

impl ResponseTable {
    /// Build the default table for the generic 3GPP command set.
    pub fn with_defaults() -> ResponseTable {
        let mut table = ResponseTable {
            patterns: HashMap::new(),
        };
        for (name, pattern) in DEFAULT_PATTERNS {
            table.must(name, pattern);
        }
        table
    }

    /// Insert a built-in pattern. Panics on a bad pattern: the built-in
    /// tables are constants and a failure is a programming error caught by
    /// the table construction tests.
    fn must(&mut self, name: &'static str, pattern: &str) {
        match Regex::new(pattern) {
            Ok(re) => {
                self.patterns.insert(name, re);
            }
            Err(e) => panic!("built-in pattern {name:?} does not compile: {e}"),
        }
    }

    /// Register or override an entry. An override replaces the previous
    /// pattern entirely.
    pub fn register(&mut self, name: &'static str, pattern: &str) -> Result<()> {
        let re = Regex::new(pattern).map_err(|e| {
            Error::InvalidParameter(format!("pattern {name:?} does not compile: {e}"))
        })?;
        self.patterns.insert(name, re);
        Ok(())
    }

    /// Match a response against the named pattern.
    ///
    /// Returns the extracted fields, or `None` if the text does not match.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not in the table. Every command names a pattern
    /// registered at table construction; an unknown name is a programming
    /// error, not a runtime condition.
    pub fn match_response(&self, name: &str, text: &str) -> Option<Fields> {
        let re = self.pattern(name);
        re.captures(text).map(|caps| fields_from(re, &caps))
    }

    /// Match every occurrence of the named pattern, for list responses
    /// (`+CPBR`, `+CMGL`, `+CGDCONT`, ...). Same panic contract as
    /// [`match_response`](Self::match_response).
    pub fn match_each(&self, name: &str, text: &str) -> Vec<Fields> {
        let re = self.pattern(name);
        re.captures_iter(text)
            .map(|caps| fields_from(re, &caps))
            .collect()
    }

    fn pattern(&self, name: &str) -> &Regex {
        match self.patterns.get(name) {
            Some(re) => re,
            None => panic!("unknown response pattern {name:?}"),
        }
    }
}

fn fields_from(re: &Regex, caps: &regex::Captures<'_>) -> Fields {
    let mut out = HashMap::new();
    for group in re.capture_names().flatten() {
        if let Some(m) = caps.name(group) {
            out.insert(group.to_string(), m.as_str().to_string());
        }
    }
    Fields { caps: out }
}

/// Matches any response, including an empty one. Used by list commands,
/// which extract entries afterwards with [`ResponseTable::match_each`].
pub const ANY: &str = "any";

/// Matches the empty response of plain set commands.
pub const OK: &str = "ok";

const DEFAULT_PATTERNS: &[(&str, &str)] = &[
    (ANY, r"(?s).*"),
    (OK, r"^\s*$"),
    ("get_imei", r"(?m)^(?P<imei>\d{14,17})\s*$"),
    ("get_imsi", r"(?m)^(?P<imsi>\d{14,15})\s*$"),
    ("get_manufacturer", r"(?m)^(?P<manufacturer>[^+].*?)\s*$"),
    ("get_model", r"(?m)^(?P<model>[^+].*?)\s*$"),
    ("get_version", r"(?m)^(?P<version>[^+].*?)\s*$"),
    (
        "get_charset",
        r#"(?m)^\+CSCS:\s*"(?P<charset>[^"]*)"\s*$"#,
    ),
    ("get_charsets", r#""(?P<charset>[A-Za-z0-9/\-]+)""#),
    ("check_pin", r"(?m)^\+CPIN:\s*(?P<status>.+?)\s*$"),
    ("get_pin_status", r"(?m)^\+CLCK:\s*(?P<enabled>\d)"),
    (
        "get_netreg_status",
        r"(?m)^\+CREG:\s*(?P<mode>\d+),\s*(?P<status>\d+)",
    ),
    (
        "get_network_info",
        r#"(?m)^\+COPS:\s*(?P<mode>\d+)(?:,\s*(?P<format>\d+),\s*"?(?P<operator>[^",\r\n]*)"?(?:,\s*(?P<act>\d+))?)?"#,
    ),
    (
        "get_network_names",
        r#"\((?P<status>\d+),"(?P<long>[^"]*)","(?P<short>[^"]*)","(?P<netid>\d+)""#,
    ),
    (
        "get_signal_quality",
        r"(?m)^\+CSQ:\s*(?P<rssi>\d+),\s*(?P<ber>\d+)",
    ),
    (
        "get_phonebook_size",
        r"(?m)^\+CPBR:\s*\(\s*\d+\s*-\s*(?P<size>\d+)\s*\)",
    ),
    (
        "list_contacts",
        r#"(?m)^\+CPBR:\s*(?P<index>\d+),\s*"(?P<number>[^"]*)",\s*(?P<category>\d+),\s*"(?P<name>[^"]*)""#,
    ),
    (
        "find_contacts",
        r#"(?m)^\+CPBF:\s*(?P<index>\d+),\s*"(?P<number>[^"]*)",\s*(?P<category>\d+),\s*"(?P<name>[^"]*)""#,
    ),
    (
        "get_smsc",
        r#"(?m)^\+CSCA:\s*"(?P<smsc>[^"]*)"(?:,\s*(?P<toa>\d+))?"#,
    ),
    ("get_sms_format", r"(?m)^\+CMGF:\s*(?P<format>\d)"),
    ("send_sms", r"(?m)^\+CMGS:\s*(?P<index>\d+)"),
    ("save_sms", r"(?m)^\+CMGW:\s*(?P<index>\d+)"),
    ("send_sms_from_storage", r"(?m)^\+CMSS:\s*(?P<index>\d+)"),
    (
        "list_sms",
        r"(?m)^\+CMGL:\s*(?P<index>\d+),\s*(?P<status>\d+),[^,]*,\s*(?P<length>\d+)\s*\n(?P<pdu>[0-9A-Fa-f]+)",
    ),
    (
        "get_sms",
        r"(?m)^\+CMGR:\s*(?P<status>\d+),[^,]*,\s*(?P<length>\d+)\s*\n(?P<pdu>[0-9A-Fa-f]+)",
    ),
    (
        "get_apns",
        r#"(?m)^\+CGDCONT:\s*(?P<context>\d+),\s*"(?P<pdp_type>[^"]*)",\s*"(?P<apn>[^"]*)""#,
    ),
    ("get_radio_status", r"(?m)^\+CFUN:\s*(?P<status>\d+)"),
];

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Table construction & override semantics
    // ---------------------------------------------------------------

    #[test]
    fn defaults_compile() {
        // with_defaults panics if any built-in pattern is broken.
        let _ = ResponseTable::with_defaults();
    }

    #[test]
    fn override_replaces_entry() {
        let mut table = ResponseTable::with_defaults();
        table
            .register("get_imei", r"(?m)^(?P<imei>\d+)!!\s*$")
            .unwrap();
        assert!(table.match_response("get_imei", "357123456789012").is_none());
        assert!(table
            .match_response("get_imei", "357123456789012!!")
            .is_some());
    }

    #[test]
    fn register_rejects_bad_pattern() {
        let mut table = ResponseTable::with_defaults();
        assert!(table.register("broken", r"(?P<oops").is_err());
    }

    #[test]
    #[should_panic(expected = "unknown response pattern")]
    fn unknown_name_panics() {
        let table = ResponseTable::with_defaults();
        table.match_response("no_such_pattern", "OK");
    }

    // ---------------------------------------------------------------
    // Field extraction
    // ---------------------------------------------------------------

    #[test]
    fn imei_extraction() {
        let table = ResponseTable::with_defaults();
        let f = table
            .match_response("get_imei", "357123456789012")
            .unwrap();
        assert_eq!(f.get("imei"), Some("357123456789012"));
    }

    #[test]
    fn signal_quality_extraction() {
        let table = ResponseTable::with_defaults();
        let f = table
            .match_response("get_signal_quality", "+CSQ: 17,99")
            .unwrap();
        assert_eq!(f.get_u32("rssi").unwrap(), 17);
        assert_eq!(f.get_u32("ber").unwrap(), 99);
    }

    #[test]
    fn creg_extraction() {
        let table = ResponseTable::with_defaults();
        let f = table
            .match_response("get_netreg_status", "+CREG: 0,1")
            .unwrap();
        assert_eq!(f.get_u32("mode").unwrap(), 0);
        assert_eq!(f.get_u32("status").unwrap(), 1);
    }

    #[test]
    fn cpin_extraction() {
        let table = ResponseTable::with_defaults();
        let f = table.match_response("check_pin", "+CPIN: SIM PIN").unwrap();
        assert_eq!(f.get("status"), Some("SIM PIN"));
    }

    #[test]
    fn cops_with_operator() {
        let table = ResponseTable::with_defaults();
        let f = table
            .match_response("get_network_info", "+COPS: 0,0,\"vodafone ES\",2")
            .unwrap();
        assert_eq!(f.get("operator"), Some("vodafone ES"));
        assert_eq!(f.get_u32("act").unwrap(), 2);
    }

    #[test]
    fn cops_no_operator() {
        let table = ResponseTable::with_defaults();
        let f = table.match_response("get_network_info", "+COPS: 0").unwrap();
        assert_eq!(f.get("operator"), None);
    }

    #[test]
    fn ucs2_operator_comes_back_raw() {
        // Strings are returned exactly as sent; unpacking is the caller's
        // explicit step.
        let table = ResponseTable::with_defaults();
        let f = table
            .match_response(
                "get_network_info",
                "+COPS: 0,0,\"0056006F006400610066006F006E0065\",2",
            )
            .unwrap();
        assert_eq!(f.get("operator"), Some("0056006F006400610066006F006E0065"));
    }

    #[test]
    fn phonebook_size_range() {
        let table = ResponseTable::with_defaults();
        let f = table
            .match_response("get_phonebook_size", "+CPBR: (1-250),40,24")
            .unwrap();
        assert_eq!(f.get_u32("size").unwrap(), 250);
    }

    #[test]
    fn contact_list_match_each() {
        let table = ResponseTable::with_defaults();
        let text = "+CPBR: 1,\"+34654123456\",145,\"Juan\"\n+CPBR: 3,\"666777888\",129,\"Eva\"";
        let entries = table.match_each("list_contacts", text);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].get_u32("index").unwrap(), 1);
        assert_eq!(entries[0].get("name"), Some("Juan"));
        assert_eq!(entries[1].get_u32("index").unwrap(), 3);
        assert_eq!(entries[1].get("number"), Some("666777888"));
    }

    #[test]
    fn sms_list_spans_lines() {
        let table = ResponseTable::with_defaults();
        let text = "+CMGL: 1,1,,24\n07914306073011F0040B914316709807F2\n+CMGL: 2,1,,20\n07914306073011F0040B914316709807F1";
        let entries = table.match_each("list_sms", text);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].get_u32("index").unwrap(), 1);
        assert_eq!(
            entries[0].get("pdu"),
            Some("07914306073011F0040B914316709807F2")
        );
        assert_eq!(entries[1].get_u32("index").unwrap(), 2);
    }

    #[test]
    fn send_sms_reference() {
        let table = ResponseTable::with_defaults();
        let f = table.match_response("send_sms", "+CMGS: 143").unwrap();
        assert_eq!(f.get_u32("index").unwrap(), 143);
    }

    #[test]
    fn apn_list() {
        let table = ResponseTable::with_defaults();
        let text = "+CGDCONT: 1,\"IP\",\"internet\",\"\",0,0\n+CGDCONT: 2,\"IP\",\"ac.vodafone.es\",\"\",0,0";
        let entries = table.match_each("get_apns", text);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].get("apn"), Some("ac.vodafone.es"));
        assert_eq!(entries[1].get_u32("context").unwrap(), 2);
    }

    #[test]
    fn ok_matches_only_empty() {
        let table = ResponseTable::with_defaults();
        assert!(table.match_response(OK, "").is_some());
        assert!(table.match_response(OK, "+CSQ: 17,99").is_none());
    }

    #[test]
    fn any_matches_everything() {
        let table = ResponseTable::with_defaults();
        assert!(table.match_response(ANY, "").is_some());
        assert!(table.match_response(ANY, "line1\nline2").is_some());
    }

    #[test]
    fn radix_parsing() {
        let table = ResponseTable::with_defaults();
        let mut t = table;
        t.register("hexfield", r"^(?P<code>[0-9A-F]+)$").unwrap();
        let f = t.match_response("hexfield", "3FFFFFFF").unwrap();
        assert_eq!(f.get_u32_radix("code", 16).unwrap(), 0x3FFF_FFFF);
        assert!(f.get_u32("code").is_err()); // base 10 rejects it
    }
}
