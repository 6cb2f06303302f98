//! Color/tag-coded status lines
//!
//! Green for progress and success, red for anything that makes the session
//! fail. Colors are dropped when `NO_COLOR` is set.

use crossterm::style::{style, StyledContent, Stylize};

use crate::orchestrator::{SessionReport, SessionState};

/// Progress line: `<label>: <message>` with a green label
pub fn info(label: &str, message: &str) {
    println!("{}: {message}", style(label).green());
}

/// Failure line on stderr with a red label
pub fn failure(label: &str, message: &str) {
    eprintln!("{}: {message}", style(label).red());
}

/// Short tag identifying a terminal state
#[must_use]
pub fn tag(state: &SessionState) -> StyledContent<&'static str> {
    match state {
        SessionState::Succeeded => "[ OK ]".green(),
        SessionState::TimedOut { .. } => "[TIME]".red(),
        SessionState::OrderViolation => "[ORDR]".red(),
        SessionState::Failed => "[FAIL]".red(),
    }
}

/// Print the outcome of a session, with both exit statuses on failure
pub fn report(report: &SessionReport) {
    if report.is_success() {
        println!("{} PROMPT finished successfully", tag(&report.state));
    } else {
        eprintln!("{} PROMPT {} on channel {}", tag(&report.state), report.state, report.channel);
        eprintln!("  consumer: {}", describe(report.consumer.as_ref()));
        eprintln!("  producer: {}", describe(report.producer.as_ref()));
    }
    info("Run time", &format!("{:.3}s", report.run_time.as_secs_f64()));
}

fn describe(exit: Option<&crate::domain::ExitInfo>) -> String {
    exit.map_or_else(|| "not run".to_string(), ToString::to_string)
}
