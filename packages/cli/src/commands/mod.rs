pub mod init;
pub mod inspect;
pub mod replay;

pub use init::{init, InitArgs};
pub use inspect::{inspect, InspectArgs};
pub use replay::{replay, ReplayArgs};

use colored::Colorize;
use screenplay_editor::DirtyReport;

/// Human-readable breakdown of the unsaved-changes decision
pub(crate) fn print_dirty_report(report: &DirtyReport) {
    let mark = |on: bool| if on { "yes".yellow() } else { "no".dimmed() };

    if report.has_unsaved_changes() {
        println!("{}", "Unsaved changes".yellow().bold());
    } else {
        println!("{} {}", "✓".green(), "No unsaved changes".green());
    }
    println!("   New elements:          {}", mark(report.any_new));
    println!("   Structural deletions:  {}", mark(report.any_structural_deletion));
    println!("   Pending modifications: {}", mark(report.tracked_modification_pending));
    println!("   Count differs:         {}", mark(report.count_differs));
    println!("   Content modified:      {}", mark(report.content_modified));
}
