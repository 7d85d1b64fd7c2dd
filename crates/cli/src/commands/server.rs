//! Server preparation command

use anyhow::Result;
use bypasser_common::Manager;

use crate::output::{print_report, print_serialized, print_success, OutputFormat};

pub async fn execute(manager: &Manager, format: OutputFormat) -> Result<()> {
    let report = manager.setup_server().await?;
    if format.is_structured() {
        return print_serialized(&report, format);
    }
    print_success("Server base files prepared (directories + forwarding sysctl config)");
    print_report(&report);
    Ok(())
}
