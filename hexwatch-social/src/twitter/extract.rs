//! Address extraction over tweet text.
//!
//! An address is the literal prefix `0x` followed by exactly 40 hex digits, either
//! case. Longer hex runs (transaction hashes, calldata) are not addresses and are
//! skipped rather than truncated. No checksum validation happens here.
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

const ADDRESS_HEX_LEN: usize = 40;

// Match the whole hex run so the length check below can reject longer ones.
static HEX_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x[0-9a-fA-F]+").expect("hex run pattern compiles"));

/// Return the distinct address-like substrings in `text`.
///
/// ```
/// use hexwatch_social::twitter::extract_addresses;
///
/// let text = "send to 0x52908400098527886E0F7030069857D2E4169EE7 please";
/// let found = extract_addresses(text);
/// assert_eq!(found.len(), 1);
/// assert!(extract_addresses("no addresses here").is_empty());
/// ```
pub fn extract_addresses(text: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let mut pos = 0;
    while let Some(m) = HEX_RUN.find_at(text, pos) {
        if m.len() == ADDRESS_HEX_LEN + 2 {
            found.insert(m.as_str().to_owned());
            pos = m.end();
        } else {
            // A rejected run may hide another `0x` (e.g. `0x0x…`); resume one byte in.
            pos = m.start() + 1;
        }
    }
    found
}

/// True when `candidate` is exactly one address and nothing else.
pub fn is_address(candidate: &str) -> bool {
    candidate.len() == ADDRESS_HEX_LEN + 2
        && candidate.starts_with("0x")
        && candidate[2..].bytes().all(|b| b.is_ascii_hexdigit())
}
