//! Help text shown next to commands and configuration options

use std::collections::BTreeMap;

const HELP: &[(&str, &str)] = &[
    // Views and commands
    ("top", "Outputs top entries in text form"),
    ("graph", "Outputs a graph in DOT format, rendered as SVG"),
    ("flamegraph", "Outputs the call tree as a flame graph"),
    ("peek", "Outputs callers and callees of functions matching a regexp"),
    ("list", "Outputs annotated source for functions matching a regexp"),
    ("disasm", "Outputs sampled addresses of functions matching a regexp"),
    ("weblist", "Displays annotated source in a web page"),
    // Configuration
    ("focus", "Restricts to samples going through a node matching the regexp"),
    ("ignore", "Skips samples going through a node matching the regexp"),
    ("hide", "Removes nodes matching the regexp from every sample"),
    ("show", "Only shows nodes matching the regexp"),
    (
        "show_from",
        "Drops functions above the highest matched frame",
    ),
    ("sample_index", "Sample value to report (0-based index or name)"),
    (
        "granularity",
        "Aggregation level: functions, filefunctions, files, lines or addresses",
    ),
    ("call_tree", "Creates a context-sensitive call tree"),
    ("trim", "Honors nodefraction/edgefraction/nodecount defaults"),
    ("normalize", "Scales the profile to match the base profile"),
    ("mean", "Averages sample value over the first value (count)"),
    ("node_count", "Max number of nodes to show"),
    ("node_fraction", "Hides nodes below <f>*total"),
    ("edge_fraction", "Hides edges below <f>*total"),
    ("drop_negative", "Ignores negative differences"),
    // Page chrome
    (
        "details",
        "Shows the profile legend: binary, sample type, time and totals",
    ),
    ("reset", "Shows the entire profile"),
    ("save_config", "Saves the current view settings as a named configuration"),
];

/// Map from command or option name to its one-line description.
pub fn help_text() -> BTreeMap<String, String> {
    HELP.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_covers_commands_and_options() {
        let help = help_text();
        for key in [
            "top", "graph", "flamegraph", "peek", "list", "disasm", "weblist", "focus",
            "ignore", "hide", "show", "show_from", "sample_index", "granularity",
            "call_tree", "trim", "normalize", "mean", "node_count", "node_fraction",
            "edge_fraction", "drop_negative", "details", "reset", "save_config",
        ] {
            assert!(help.contains_key(key), "missing help for {}", key);
        }
    }
}
