use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::sync::SyncReport;

// Styling helpers

fn dim(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).dim()
}

fn magenta_bold(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

// Banner

pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔀 cibridge"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("GitHub to GitLab CI bridge")
    );
}

// Summary rendering

pub fn print_run_summary(report: &SyncReport) {
    println!("{}", render_run_summary(report));
}

fn render_run_summary(report: &SyncReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Sync result", "Count"]);

    let rows = [
        ("Open PRs", report.open_prs),
        ("Pushed this run", report.active_prs),
        ("Backlogged", report.backlogged_prs),
        ("Already mirrored", report.already_synced_prs),
        ("Unmergeable", report.unmergeable_prs),
        ("Protected branches", report.protected_branches),
        ("Tags", report.tags),
        ("Pruned mirror refs", report.pruned_refs),
        ("Statuses posted", report.statuses_posted),
        ("Status failures", report.status_failures),
    ];
    for (label, count) in rows {
        table.add_row(vec![label.to_string(), count.to_string()]);
    }

    table
}
