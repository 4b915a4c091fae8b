pub mod config;
pub mod sweep;
pub mod sync;

use colored::Colorize;
use hcsync_sync::SyncResult;

pub(crate) fn print_result(label: &str, result: &SyncResult) {
    println!(
        "{} {} ({} created)",
        "✓".green().bold(),
        label.cyan(),
        result.created_ids.len()
    );
}
