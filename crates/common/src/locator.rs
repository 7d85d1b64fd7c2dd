//! Peer block locator/remover
//!
//! Works on the VPN file as an ordered list of lines. A `[Peer]` block runs
//! from its header up to the next section header; the comment line right
//! above the header is its ownership tag. Only whole matching blocks are
//! cut, everything else in the file is left byte for byte.

use crate::codec::{is_blank_or_comment, is_section_header, split_kv, MANAGED_TAG_PREFIX};
use crate::PeerRef;
use tracing::debug;

/// Remove the `[Peer]` block(s) owned by `peer_ref`
///
/// A block matches when its tag names both the vpn and the peer, or else
/// when one of its `AllowedIPs` equals `probe_address` (already CIDR
/// normalised). Returns the rewritten text, or `None` when nothing matched.
///
/// The tag check is a substring test on `vpn=<vpn>` and `peer=<peer>`, not an
/// exact key match: `home:lap` also removes a block tagged `peer=laptop`.
pub fn remove_peer_block(content: &str, peer_ref: &PeerRef, probe_address: Option<&str>) -> Option<String> {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    let mut removed = false;

    let mut i = 0;
    while i < lines.len() {
        if lines[i].trim() != "[Peer]" {
            out.push(lines[i]);
            i += 1;
            continue;
        }

        let tag = i
            .checked_sub(1)
            .map(|prev| lines[prev].trim())
            .filter(|prev| prev.starts_with(MANAGED_TAG_PREFIX));

        let end = lines[i + 1..]
            .iter()
            .position(|line| is_section_header(line.trim()))
            .map_or(lines.len(), |offset| i + 1 + offset);
        let block = &lines[i..end];

        if !block_matches(block, tag, peer_ref, probe_address) {
            out.push(lines[i]);
            i += 1;
            continue;
        }

        debug!("Removing peer block for {} at line {}", peer_ref, i + 1);
        removed = true;
        if let Some(tag) = tag {
            if out.last().map(|l| l.trim()) == Some(tag) {
                out.pop();
            }
        }
        if out.last().is_some_and(|l| l.trim().is_empty()) {
            out.pop();
        }

        // blank/comment lines at the tail lead into the next block
        let tail_start = (i + 1..end)
            .rev()
            .take_while(|&k| is_blank_or_comment(lines[k].trim()))
            .last()
            .unwrap_or(end);
        out.extend_from_slice(&lines[tail_start..end]);

        i = end;
    }

    if !removed {
        return None;
    }

    let joined = out.join("\n");
    let trimmed = joined.trim_end_matches('\n');
    if trimmed.is_empty() {
        Some(String::new())
    } else {
        Some(format!("{}\n", trimmed))
    }
}

fn block_matches(block: &[&str], tag: Option<&str>, peer_ref: &PeerRef, probe_address: Option<&str>) -> bool {
    if let Some(tag) = tag {
        if tag.contains(&format!("vpn={}", peer_ref.vpn))
            && tag.contains(&format!("peer={}", peer_ref.peer))
        {
            return true;
        }
    }

    let Some(probe) = probe_address.map(str::trim).filter(|p| !p.is_empty()) else {
        return false;
    };
    block
        .iter()
        .filter_map(|raw| split_kv(raw.trim()))
        .any(|(key, value)| key.eq_ignore_ascii_case("AllowedIPs") && value == probe)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PEERS: &str = "# bp-managed: vpn=home,peer=laptop
[Peer]
PublicKey = AAA
AllowedIPs = 69.0.1.2/32

# bp-managed: vpn=home,peer=phone
[Peer]
PublicKey = BBB
AllowedIPs = 69.0.1.3/32
";

    const FULL_VPN: &str = "# bp-managed: vpn=home
[Interface]
PrivateKey = KEY
ListenPort = 55107
Address = 69.0.1.1/24

# bp-managed: vpn=home,peer=laptop
[Peer]
PublicKey = AAA
PresharedKey = PSK1
AllowedIPs = 69.0.1.2/32

# bp-managed: vpn=home,peer=phone
[Peer]
PublicKey = BBB
PresharedKey = PSK2
AllowedIPs = 69.0.1.3/32
";

    fn peer(s: &str) -> PeerRef {
        s.parse().unwrap()
    }

    #[test]
    fn test_remove_by_managed_comment() {
        let out = remove_peer_block(TWO_PEERS, &peer("home:laptop"), Some("69.0.1.2/32")).unwrap();
        assert!(!out.contains("peer=laptop"));
        assert!(!out.contains("AAA"));
        assert!(out.contains("# bp-managed: vpn=home,peer=phone\n[Peer]\nPublicKey = BBB"));
    }

    #[test]
    fn test_remove_first_of_two_keeps_layout() {
        let out = remove_peer_block(FULL_VPN, &peer("home:laptop"), None).unwrap();
        assert_eq!(
            out,
            "# bp-managed: vpn=home
[Interface]
PrivateKey = KEY
ListenPort = 55107
Address = 69.0.1.1/24

# bp-managed: vpn=home,peer=phone
[Peer]
PublicKey = BBB
PresharedKey = PSK2
AllowedIPs = 69.0.1.3/32
"
        );
    }

    #[test]
    fn test_remove_last_peer_restores_interface_only() {
        let out = remove_peer_block(FULL_VPN, &peer("home:phone"), None).unwrap();
        let expected_tail = "# bp-managed: vpn=home,peer=laptop
[Peer]
PublicKey = AAA
PresharedKey = PSK1
AllowedIPs = 69.0.1.2/32
";
        assert!(out.ends_with(expected_tail));
        assert!(!out.contains("phone"));

        let out = remove_peer_block(&out, &peer("home:laptop"), None).unwrap();
        assert_eq!(
            out,
            "# bp-managed: vpn=home
[Interface]
PrivateKey = KEY
ListenPort = 55107
Address = 69.0.1.1/24
"
        );
    }

    #[test]
    fn test_tag_match_is_substring_based() {
        let out = remove_peer_block(TWO_PEERS, &peer("home:lap"), None).unwrap();
        assert!(!out.contains("peer=laptop"));
        assert!(out.contains("peer=phone"));

        assert!(remove_peer_block(TWO_PEERS, &peer("home:tablet"), None).is_none());
    }

    #[test]
    fn test_fallback_to_allowed_ips_when_tag_missing() {
        let text = "[Interface]
Address = 69.0.1.1/24

[Peer]
PublicKey = AAA
AllowedIPs = 69.0.1.2/32

# bp-managed: vpn=home,peer=phone
[Peer]
PublicKey = BBB
AllowedIPs = 69.0.1.3/32
";
        let out = remove_peer_block(text, &peer("home:laptop"), Some("69.0.1.2/32")).unwrap();
        assert!(!out.contains("AAA"));
        assert!(out.contains("BBB"));
        assert!(out.contains("peer=phone"));
    }

    #[test]
    fn test_tag_wins_over_address() {
        // laptop's tag is present even though its address was reused by phone
        let text = "# bp-managed: vpn=home,peer=phone
[Peer]
PublicKey = BBB
AllowedIPs = 69.0.1.9/32

# bp-managed: vpn=home,peer=laptop
[Peer]
PublicKey = AAA
AllowedIPs = 69.0.1.2/32
";
        let out = remove_peer_block(text, &peer("home:laptop"), Some("69.0.1.5/32")).unwrap();
        assert!(out.contains("BBB"));
        assert!(!out.contains("AAA"));
    }

    #[test]
    fn test_no_match_leaves_content_alone() {
        assert!(remove_peer_block(FULL_VPN, &peer("home:tablet"), Some("69.0.1.7/32")).is_none());
        assert!(remove_peer_block(FULL_VPN, &peer("work:laptop"), None).is_none());
        assert!(remove_peer_block("", &peer("home:laptop"), None).is_none());
    }

    #[test]
    fn test_untagged_trailing_comment_moves_to_next_block() {
        let text = "[Interface]
Address = 69.0.1.1/24

# bp-managed: vpn=home,peer=laptop
[Peer]
AllowedIPs = 69.0.1.2/32

; keep me
[Peer]
AllowedIPs = 69.0.1.3/32
";
        let out = remove_peer_block(text, &peer("home:laptop"), None).unwrap();
        assert_eq!(
            out,
            "[Interface]
Address = 69.0.1.1/24

; keep me
[Peer]
AllowedIPs = 69.0.1.3/32
"
        );
    }

    #[test]
    fn test_removing_only_content_yields_empty() {
        let text = "# bp-managed: vpn=home,peer=laptop\n[Peer]\nAllowedIPs = 69.0.1.2/32\n\n\n";
        assert_eq!(remove_peer_block(text, &peer("home:laptop"), None).unwrap(), "");
    }
}
