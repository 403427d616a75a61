// src/pipeline/report.rs

//! Operator-facing summary output.

use std::io::{self, Write};

use crate::models::{DiffRecord, DiffSummary};

/// Write one line per member: `name,contributions,posts,+delta_c,+delta_p`.
pub fn write_members<W: Write + ?Sized>(out: &mut W, diffs: &[DiffRecord]) -> io::Result<()> {
    for diff in diffs {
        writeln!(
            out,
            "{},{},{},{:+},{:+}",
            diff.name, diff.contributions, diff.posts, diff.delta_contributions, diff.delta_posts
        )?;
    }
    out.flush()
}

/// Log the aggregate counts of a diff.
pub fn log_summary(summary: &DiffSummary) {
    log::info!(
        "Members: {} ({} new, {} departed, {} changed)",
        summary.members,
        summary.new_members,
        summary.departed_members,
        summary.changed_members
    );
    log::info!(
        "Total delta: {:+} contributions, {:+} posts",
        summary.total_delta_contributions,
        summary.total_delta_posts
    );
}
