//! Annotated text listings (disasm, source, peek)

use crate::error::ReportError;
use crate::report::Report;

/// Write the report's listing entries into one text buffer, stopping after
/// `max_entries` entries.
pub fn render_listing(report: &Report, max_entries: usize) -> Result<String, ReportError> {
    let entries = report.listing()?;
    let mut text = String::new();
    for entry in entries.iter().take(max_entries) {
        text.push_str(entry);
    }
    if entries.len() > max_entries {
        text.push_str(&format!(
            "... {} more entries not shown\n",
            entries.len() - max_entries
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Command, ValueFormat};

    fn report(entries: Vec<String>) -> Report {
        Report {
            command: Command::Disasm("main".into()),
            sample_index: 0,
            total: 0,
            graph: None,
            labels: Vec::new(),
            format: ValueFormat {
                unit: "count".into(),
                mean: false,
            },
            listing: Some(entries),
        }
    }

    #[test]
    fn test_entries_are_concatenated() {
        let r = report(vec!["a\n".into(), "b\n".into()]);
        assert_eq!(render_listing(&r, 10).unwrap(), "a\nb\n");
    }

    #[test]
    fn test_cap_on_entries() {
        let r = report((0..5).map(|i| format!("{}\n", i)).collect());
        assert_eq!(
            render_listing(&r, 2).unwrap(),
            "0\n1\n... 3 more entries not shown\n"
        );
    }

    #[test]
    fn test_graph_report_has_no_listing() {
        let mut r = report(Vec::new());
        r.listing = None;
        assert!(render_listing(&r, 10).is_err());
    }
}
