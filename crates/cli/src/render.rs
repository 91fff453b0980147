// crates/cli/src/render.rs
//! Terminal rendering of the summary panel and failures.

use applytrack_core::{RecoveryAction, SummaryView, SyncFailure};
use applytrack_types::SummaryStatus;

pub fn recovery_hint(action: RecoveryAction) -> &'static str {
    match action {
        RecoveryAction::Retry => "Run `applytrack sync` to try again.",
        RecoveryAction::Reconnect => "Reconnect Gmail in the web app, then sync again.",
        RecoveryAction::Connect => "Connect a Gmail account in the web app first.",
    }
}

fn status_mark(status: SummaryStatus) -> &'static str {
    match status {
        SummaryStatus::Success => "\u{2713}",
        SummaryStatus::Failed | SummaryStatus::NotConnected => "\u{2717}",
        SummaryStatus::Idle | SummaryStatus::Running => "\u{2022}",
    }
}

/// Lines of the summary panel. Empty while the panel is suppressed.
pub fn summary_lines(view: &SummaryView) -> Vec<String> {
    let SummaryView::Panel(panel) = view else {
        return Vec::new();
    };
    let mut lines = vec![format!("  {} {}", status_mark(panel.status), panel.headline)];
    if let Some(metrics) = &panel.metrics_line {
        lines.push(format!("    {metrics}"));
    }
    match &panel.detail {
        Some(detail) => {
            lines.push("    Details:".to_string());
            lines.extend(detail.lines().map(|l| format!("    \u{2502} {l}")));
        }
        None if !panel.details_open => {
            lines.push("    (run `applytrack details --open` to show details)".to_string());
        }
        None => {}
    }
    lines
}

pub fn failure_lines(failure: &SyncFailure) -> Vec<String> {
    let mut lines = vec![format!("  \u{2717} Sync failed: {}", failure.message)];
    if let Some(detail) = &failure.detail {
        lines.push(format!("    {detail}"));
    }
    lines.push(format!("  \u{2192} {}", recovery_hint(failure.recovery())));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use applytrack_core::{FailureKind, SummaryPanel};
    use pretty_assertions::assert_eq;

    fn panel(details_open: bool, detail: Option<&str>) -> SummaryView {
        SummaryView::Panel(SummaryPanel {
            status: SummaryStatus::Success,
            headline: "Last sync succeeded".to_string(),
            metrics_line: Some("120 emails scanned · 1 page".to_string()),
            details_open,
            detail: detail.map(str::to_string),
        })
    }

    #[test]
    fn test_suppressed_renders_nothing() {
        assert!(summary_lines(&SummaryView::Suppressed).is_empty());
    }

    #[test]
    fn test_closed_panel_hints_at_details() {
        assert_eq!(
            summary_lines(&panel(false, None)),
            vec![
                "  \u{2713} Last sync succeeded".to_string(),
                "    120 emails scanned · 1 page".to_string(),
                "    (run `applytrack details --open` to show details)".to_string(),
            ]
        );
    }

    #[test]
    fn test_open_panel_shows_detail_lines() {
        let lines = summary_lines(&panel(true, Some("page 1: 100\npage 2: 20")));
        assert_eq!(lines[2], "    Details:");
        assert_eq!(lines[3], "    \u{2502} page 1: 100");
        assert_eq!(lines[4], "    \u{2502} page 2: 20");
    }

    #[test]
    fn test_failure_includes_recovery_hint() {
        let failure = SyncFailure {
            kind: FailureKind::ReconnectRequired,
            message: "Gmail access has expired".to_string(),
            detail: None,
        };
        let lines = failure_lines(&failure);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("Reconnect Gmail"));
    }
}
