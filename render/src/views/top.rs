//! Top table

use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::report::Report;

/// One row of the top table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopItem {
    pub name: String,
    /// `(inline)` when every frame of the node was inlined
    pub inline_label: String,
    pub flat: i64,
    pub flat_format: String,
    pub flat_percent: String,
    /// Running total of `flat_percent` down to this row
    pub sum_percent: String,
    pub cum: i64,
    pub cum_format: String,
    pub cum_percent: String,
}

/// Rows for the report's graph nodes in report order, at most `node_count`.
pub fn top_items(report: &Report, node_count: Option<usize>) -> Result<Vec<TopItem>, ReportError> {
    let graph = report.graph()?;
    let limit = node_count.unwrap_or(usize::MAX);
    let mut running = 0i64;
    Ok(graph
        .nodes
        .iter()
        .take(limit)
        .map(|node| {
            running = running.saturating_add(node.flat);
            TopItem {
                name: node.info.printable_name(),
                inline_label: if node.inlined { "(inline)" } else { "" }.to_string(),
                flat: node.flat,
                flat_format: report.format_value(node.flat),
                flat_percent: report.percentage(node.flat).trim().to_string(),
                sum_percent: report.percentage(running).trim().to_string(),
                cum: node.cum,
                cum_format: report.format_value(node.cum),
                cum_percent: report.percentage(node.cum).trim().to_string(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Command, ValueFormat};
    use sightline_shared::{Graph, NodeInfo};

    fn report() -> Report {
        let mut graph = Graph::new();
        for (name, flat, cum) in [("B", 2, 2), ("C", 1, 1), ("A", 0, 3)] {
            let id = graph.add_node(NodeInfo::named(name));
            graph.nodes[id].flat = flat;
            graph.nodes[id].cum = cum;
        }
        graph.nodes[1].inlined = true;
        Report {
            command: Command::Top,
            sample_index: 0,
            total: 3,
            graph: Some(graph),
            labels: Vec::new(),
            format: ValueFormat {
                unit: "count".into(),
                mean: false,
            },
            listing: None,
        }
    }

    #[test]
    fn test_rows_follow_report_order() {
        let items = top_items(&report(), None).unwrap();
        let rows: Vec<(&str, i64, &str, &str)> = items
            .iter()
            .map(|i| {
                (
                    i.name.as_str(),
                    i.flat,
                    i.flat_percent.as_str(),
                    i.sum_percent.as_str(),
                )
            })
            .collect();
        assert_eq!(
            rows,
            vec![
                ("B", 2, "66.67%", "66.67%"),
                ("C", 1, "33.33%", "100%"),
                ("A", 0, "0%", "100%"),
            ]
        );
        assert_eq!(items[1].inline_label, "(inline)");
        assert_eq!(items[0].inline_label, "");
        assert_eq!(items[2].cum_format, "3");
    }

    #[test]
    fn test_node_count_caps_rows() {
        assert_eq!(top_items(&report(), Some(2)).unwrap().len(), 2);
    }

    #[test]
    fn test_listing_report_has_no_rows() {
        let mut r = report();
        r.graph = None;
        assert!(matches!(
            top_items(&r, None),
            Err(ReportError::MissingOutput { missing: "graph", .. })
        ));
    }
}
