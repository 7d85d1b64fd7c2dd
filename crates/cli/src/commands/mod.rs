//! CLI Commands

pub mod peer;
pub mod server;
pub mod vpn;

use bypasser_common::Error;

/// Point at the matching list command when the named entity is missing
pub fn with_list_hint(err: Error, noun: &str) -> anyhow::Error {
    if err.is_not_found() {
        anyhow::anyhow!("{} (see `bp {} list`)", err, noun)
    } else {
        err.into()
    }
}
