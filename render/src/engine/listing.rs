//! Annotated text listings: peek, disasm and weblist

use regex::Regex;
use sightline_shared::utils::measurement::percentage;
use sightline_shared::{Frame, Graph, Node};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::graph::{build_graph, Selected};
use crate::config::EffectiveConfig;
use crate::error::ReportError;
use crate::report::ValueFormat;

const PEEK_RULE: &str =
    "----------------------------------------------------------+-------------";

fn value_or_dot(value: i64, format: &ValueFormat) -> String {
    if value == 0 {
        ".".to_string()
    } else {
        format.format(value)
    }
}

// ── peek ─────────────────────────────────────────────────────────────────────

fn peek_entry(graph: &Graph, node: &Node, total: i64, format: &ValueFormat) -> String {
    let mut out = String::new();
    for edge in node.in_edges.iter() {
        out += &format!(
            "{:>50} {:>7} |   {}\n",
            format.format(edge.weight),
            percentage(edge.weight, node.cum),
            graph.nodes[edge.src].info.printable_name()
        );
    }
    out += &format!(
        "{:>10} {:>7} {:>10} {:>7} {:>13} | {}\n",
        format.format(node.flat),
        percentage(node.flat, total),
        format.format(node.cum),
        percentage(node.cum, total),
        "",
        node.info.printable_name()
    );
    for edge in node.out_edges.iter() {
        out += &format!(
            "{:>50} {:>7} |   {}\n",
            format.format(edge.weight),
            percentage(edge.weight, node.cum),
            graph.nodes[edge.dest].info.printable_name()
        );
    }
    out += PEEK_RULE;
    out.push('\n');
    out
}

/// Callers and callees of every node matching `re`.
pub(crate) fn peek(
    samples: &[Selected<'_>],
    re: &Regex,
    cfg: &EffectiveConfig,
    total: i64,
    format: &ValueFormat,
) -> Result<Vec<String>, ReportError> {
    let graph = build_graph(samples, cfg.granularity, false, cfg.mean);
    let mut entries: Vec<String> = graph
        .nodes
        .iter()
        .filter(|n| re.is_match(&n.info.printable_name()))
        .map(|n| peek_entry(&graph, n, total, format))
        .collect();
    if entries.is_empty() {
        return Err(ReportError::NoMatches(re.as_str().to_string()));
    }
    let header = format!(
        "{rule}\n{:>10} {:>7} {:>10} {:>7} {:>13} + context\n{rule}\n",
        "flat",
        "flat%",
        "cum",
        "cum%",
        "calls calls%",
        rule = PEEK_RULE
    );
    entries.insert(0, header);
    Ok(entries)
}

// ── disasm / weblist ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Row {
    flat: i64,
    cum: i64,
}

struct Routine {
    name: String,
    file: Option<String>,
    flat: i64,
    cum: i64,
    rows: HashMap<u64, Row>,
}

/// Per-function totals keyed by `key` (address or line), in first-seen
/// function order.
fn collect_routines<K>(samples: &[Selected<'_>], re: &Regex, key: K) -> Vec<Routine>
where
    K: Fn(&Frame) -> Option<u64>,
{
    let mut routines: Vec<Routine> = Vec::new();
    let mut index: HashMap<(String, Option<String>), usize> = HashMap::new();

    for sample in samples {
        let mut seen_routines = HashSet::new();
        let mut seen_rows = HashSet::new();
        for (depth, frame) in sample.frames.iter().enumerate() {
            let Some(function) = frame.function.as_deref() else {
                continue;
            };
            if !re.is_match(function) {
                continue;
            }
            let Some(k) = key(frame) else { continue };
            let routine_key = (function.to_string(), frame.file.clone());
            let r = *index.entry(routine_key).or_insert_with(|| {
                routines.push(Routine {
                    name: function.to_string(),
                    file: frame.file.clone(),
                    flat: 0,
                    cum: 0,
                    rows: HashMap::new(),
                });
                routines.len() - 1
            });
            let routine = &mut routines[r];
            let leaf = depth == 0;
            if seen_routines.insert(r) {
                routine.cum = routine.cum.saturating_add(sample.value);
            }
            if leaf {
                routine.flat = routine.flat.saturating_add(sample.value);
            }
            let row = routine.rows.entry(k).or_default();
            if seen_rows.insert((r, k)) {
                row.cum = row.cum.saturating_add(sample.value);
            }
            if leaf {
                row.flat = row.flat.saturating_add(sample.value);
            }
        }
    }
    routines
}

fn routine_header(title: String, routine: &Routine, total: i64, format: &ValueFormat) -> String {
    format!(
        "ROUTINE ======================== {}\n{:>10} {:>10} (flat, cum) {} of Total\n",
        title,
        format.format(routine.flat),
        format.format(routine.cum),
        percentage(routine.cum, total).trim()
    )
}

fn sorted_rows(routine: &Routine) -> Vec<(u64, &Row)> {
    let mut rows: Vec<(u64, &Row)> = routine.rows.iter().map(|(&k, r)| (k, r)).collect();
    rows.sort_by_key(|(k, _)| *k);
    rows
}

/// Sampled addresses of every function matching `re`.
pub(crate) fn disasm(
    samples: &[Selected<'_>],
    re: &Regex,
    total: i64,
    format: &ValueFormat,
) -> Result<Vec<String>, ReportError> {
    let routines = collect_routines(samples, re, |f| Some(f.address));
    if routines.is_empty() {
        return Err(ReportError::NoMatches(re.as_str().to_string()));
    }
    Ok(routines
        .iter()
        .map(|routine| {
            let mut out = routine_header(routine.name.clone(), routine, total, format);
            for (address, row) in sorted_rows(routine) {
                out += &format!(
                    "{:>10} {:>10} {:>16x}\n",
                    value_or_dot(row.flat, format),
                    value_or_dot(row.cum, format),
                    address
                );
            }
            out
        })
        .collect())
}

/// Source lines of `file`, when it can be read.
fn read_source(root: &Path, file: &str) -> Option<Vec<String>> {
    let path = Path::new(file);
    let path = if path.is_relative() {
        root.join(path)
    } else {
        path.to_path_buf()
    };
    std::fs::read_to_string(path)
        .ok()
        .map(|text| text.lines().map(str::to_string).collect())
}

/// Per-line values of every function matching `re`, with source text when
/// the file is readable under `root`.
pub(crate) fn weblist(
    samples: &[Selected<'_>],
    re: &Regex,
    total: i64,
    format: &ValueFormat,
    root: &Path,
) -> Result<Vec<String>, ReportError> {
    let routines = collect_routines(samples, re, |f| f.line.map(u64::from));
    if routines.is_empty() {
        return Err(ReportError::NoMatches(re.as_str().to_string()));
    }

    let mut sources: HashMap<String, Option<Vec<String>>> = HashMap::new();
    Ok(routines
        .iter()
        .map(|routine| {
            let file = routine.file.as_deref().unwrap_or("<unknown>");
            let title = format!("{} in {}", routine.name, file);
            let mut out = routine_header(title, routine, total, format);
            let source = sources
                .entry(file.to_string())
                .or_insert_with(|| read_source(root, file));
            for (line, row) in sorted_rows(routine) {
                let text = source
                    .as_ref()
                    .and_then(|lines| lines.get((line as usize).wrapping_sub(1)))
                    .map(String::as_str)
                    .unwrap_or("");
                out += &format!(
                    "{:>10} {:>10} {:>5}: {}\n",
                    value_or_dot(row.flat, format),
                    value_or_dot(row.cum, format),
                    line,
                    text
                );
            }
            out
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(function: &str, address: u64, line: u32) -> Frame {
        Frame {
            address,
            function: Some(function.to_string()),
            file: Some("lib.rs".to_string()),
            line: Some(line),
            module: None,
            inlined: false,
        }
    }

    fn format() -> ValueFormat {
        ValueFormat {
            unit: "count".into(),
            mean: false,
        }
    }

    #[test]
    fn test_disasm_groups_addresses() {
        let stacks = [
            vec![frame("work", 0x20, 3), frame("main", 0x10, 1)],
            vec![frame("work", 0x24, 4), frame("main", 0x10, 1)],
            vec![frame("work", 0x20, 3), frame("main", 0x10, 1)],
        ];
        let samples: Vec<Selected<'_>> = stacks
            .iter()
            .map(|s| Selected {
                frames: s.iter().collect(),
                value: 1,
                div: 0,
            })
            .collect();
        let re = Regex::new("^work$").unwrap();
        let entries = disasm(&samples, &re, 3, &format()).unwrap();
        assert_eq!(entries.len(), 1);
        let lines: Vec<&str> = entries[0].lines().collect();
        assert_eq!(lines[0], "ROUTINE ======================== work");
        assert_eq!(lines[1], "         3          3 (flat, cum) 100% of Total");
        assert_eq!(lines[2], "         2          2               20");
        assert_eq!(lines[3], "         1          1               24");
    }

    #[test]
    fn test_weblist_reads_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "fn main() {\n    work();\n}\n").unwrap();
        let stack = vec![frame("main", 0x10, 2)];
        let samples = vec![Selected {
            frames: stack.iter().collect(),
            value: 5,
            div: 0,
        }];
        let re = Regex::new("main").unwrap();
        let entries = weblist(&samples, &re, 5, &format(), dir.path()).unwrap();
        assert!(entries[0].starts_with("ROUTINE ======================== main in lib.rs\n"));
        assert!(entries[0].contains("         5          5     2:     work();\n"));
    }

    #[test]
    fn test_peek_lists_context() {
        let stacks = [
            vec![frame("b", 0, 1), frame("a", 0, 1)],
            vec![frame("c", 0, 1), frame("b", 0, 1)],
        ];
        let samples: Vec<Selected<'_>> = stacks
            .iter()
            .map(|s| Selected {
                frames: s.iter().collect(),
                value: 1,
                div: 0,
            })
            .collect();
        let re = Regex::new("^b$").unwrap();
        let entries = peek(&samples, &re, &EffectiveConfig::default(), 2, &format()).unwrap();
        assert_eq!(entries.len(), 2);
        let body: Vec<&str> = entries[1].lines().collect();
        assert!(body[0].ends_with("|   a"));
        assert!(body[1].ends_with("| b"));
        assert!(body[2].ends_with("|   c"));
    }

    #[test]
    fn test_no_matches() {
        let re = Regex::new("x").unwrap();
        assert!(matches!(
            disasm(&[], &re, 0, &format()),
            Err(ReportError::NoMatches(_))
        ));
    }
}
