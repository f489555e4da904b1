//! Formatted output helpers for CLI commands.

use sonar_graph::resource::EdgeKind;

/// Length of an abbreviated fingerprint.
const SHORT_HASH_LEN: usize = 12;

/// Horizontal rule of `width` box-drawing characters.
#[must_use]
pub fn rule(width: usize) -> String {
    "\u{2550}".repeat(width)
}

/// Formats `count` with `noun`, adding an `s` unless the count is one.
#[must_use]
pub fn pluralize(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Formats one dependency line, e.g. `-> SonarVPC`, `=> Secret [grant]`.
#[must_use]
pub fn format_edge(dependency: &str, edge: EdgeKind) -> String {
    match edge {
        EdgeKind::Reference => format!("-> {dependency}"),
        EdgeKind::Grant | EdgeKind::Attachment => format!("=> {dependency} [{edge}]"),
    }
}

/// First characters of a hex fingerprint.
#[must_use]
pub fn short_hash(hex: &str) -> &str {
    hex.get(..SHORT_HASH_LEN).unwrap_or(hex)
}
