//! Human-readable run summaries

use crate::crawler::RunOutcome;

/// Renders the outcome of a run as plain text
pub fn format_run_summary(outcome: &RunOutcome) -> String {
    let summary = outcome.summary();
    let mut out = String::new();

    let heading = match outcome {
        RunOutcome::Completed(_) => "Completed".to_string(),
        RunOutcome::Cancelled(_) => "Cancelled".to_string(),
        RunOutcome::Failed { cause, .. } => format!("Failed: {}", cause),
    };
    out.push_str(&format!("=== Sweep {} ===\n\n", heading));

    if summary.dry_run {
        out.push_str("Dry run: no block requests were sent\n\n");
    }

    let verb = if summary.dry_run { "would block" } else { "blocked" };
    out.push_str(&format!("  Users {}: {}\n", verb, summary.blocked));
    if summary.block_failures > 0 {
        out.push_str(&format!("  Failed blocks: {}\n", summary.block_failures));
    }
    out.push_str(&format!("  Users evaluated: {}\n", summary.users_evaluated));
    out.push_str(&format!("  Pages fetched: {}\n", summary.pages_fetched));

    let rate = if summary.users_evaluated > 0 {
        (summary.blocked as f64 / summary.users_evaluated as f64) * 100.0
    } else {
        0.0
    };
    out.push_str(&format!("  Match rate: {:.1}%\n", rate));
    out
}

/// Prints the outcome of a run to stdout
pub fn print_run_summary(outcome: &RunOutcome) {
    print!("{}", format_run_summary(outcome));
}
