//! INI-like config codec
//!
//! Answers section/key queries straight from the text without building a
//! document model. Section names match case-sensitively, keys match
//! case-insensitively, and `#`/`;` comment lines are skipped.

/// Leading comment that tags a block with its owning VPN (and peer)
pub const MANAGED_TAG_PREFIX: &str = "# bp-managed:";

/// Ownership tag line for a VPN interface block or one of its peers
pub fn ownership_tag(vpn: &str, peer: Option<&str>) -> String {
    match peer {
        Some(peer) => format!("{} vpn={},peer={}", MANAGED_TAG_PREFIX, vpn, peer),
        None => format!("{} vpn={}", MANAGED_TAG_PREFIX, vpn),
    }
}

/// True for blank lines and `#`/`;` comments (expects a trimmed line)
pub fn is_blank_or_comment(line: &str) -> bool {
    line.is_empty() || line.starts_with('#') || line.starts_with(';')
}

/// True for `[Name]` lines (expects a trimmed line)
pub fn is_section_header(line: &str) -> bool {
    line.starts_with('[') && line.ends_with(']')
}

/// Split `key = value` on the first `=`, trimming both sides
pub fn split_kv(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

/// One `key = value` entry together with the section it sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
    pub section: &'a str,
    pub key: &'a str,
    pub value: &'a str,
}

/// Iterator over every key/value entry in the text, top to bottom
pub struct Entries<'a> {
    lines: std::str::Split<'a, char>,
    section: &'a str,
}

impl<'a> Iterator for Entries<'a> {
    type Item = Entry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for raw in self.lines.by_ref() {
            let line = raw.trim();
            if is_blank_or_comment(line) {
                continue;
            }
            if is_section_header(line) {
                self.section = line.trim_matches(|c: char| c == '[' || c == ']').trim();
                continue;
            }
            if let Some((key, value)) = split_kv(line) {
                return Some(Entry {
                    section: self.section,
                    key,
                    value,
                });
            }
        }
        None
    }
}

pub fn entries(content: &str) -> Entries<'_> {
    Entries {
        lines: content.split('\n'),
        section: "",
    }
}

/// First value of `key` inside `section`; empty values count as missing
pub fn first_value<'a>(content: &'a str, section: &str, key: &str) -> Option<&'a str> {
    entries(content)
        .find(|e| e.section == section && e.key.eq_ignore_ascii_case(key))
        .map(|e| e.value)
        .filter(|v| !v.is_empty())
}

/// Every value of `key` inside any `section` of that name, in file order
pub fn all_values<'a>(content: &'a str, section: &str, key: &str) -> Vec<&'a str> {
    entries(content)
        .filter(|e| e.section == section && e.key.eq_ignore_ascii_case(key))
        .map(|e| e.value)
        .collect()
}
