//! Per-file declaration permissions.
//!
//! Each config file is governed by the first restriction whose `path` glob
//! matches the file's logical path. A restriction controls which kinds of
//! declarations the file may make: users, channels matching a pattern list,
//! user groups matching a pattern list, and the channel template.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use regex::Regex;
use serde::Deserialize;

/// `*` must not cross path separators; `**` still spans directories.
const PATH_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A single restriction rule.
///
/// The original pattern strings are retained so errors can cite them; the
/// compiled forms are attached once when the restriction list is merged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Restriction {
    /// Doublestar glob matched against a file's logical path.
    pub path: String,
    /// Reserved. Parsed for forward compatibility, never consulted.
    pub deny: bool,
    /// Whether the file may declare user mappings.
    pub users: bool,
    /// Patterns for channel names the file may declare.
    #[serde(rename = "channels")]
    pub channel_patterns: Vec<String>,
    /// Patterns for user-group handles the file may declare.
    #[serde(rename = "usergroups")]
    pub usergroup_patterns: Vec<String>,
    /// Whether the file may set the channel template.
    pub template: bool,

    #[serde(skip)]
    pub channels: Vec<Regex>,
    #[serde(skip)]
    pub usergroups: Vec<Regex>,
}

impl Restriction {
    /// Compile the declared pattern strings into the regex lists.
    pub fn compile(&mut self) -> Result<()> {
        self.channels = compile_patterns(&self.channel_patterns, "channel", &self.path)?;
        self.usergroups = compile_patterns(&self.usergroup_patterns, "usergroup", &self.path)?;
        Ok(())
    }
}

fn compile_patterns(patterns: &[String], kind: &str, path: &str) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p)
                .with_context(|| format!("failed to parse {kind} pattern {p:?} for path {path:?}"))
        })
        .collect()
}

/// The restriction applied when no declared rule matches: everything is
/// permitted.
pub fn default_restriction() -> &'static Restriction {
    static DEFAULT: OnceLock<Restriction> = OnceLock::new();
    DEFAULT.get_or_init(|| {
        let match_all = Regex::new("").expect("empty pattern is a valid regex");
        Restriction {
            path: "*".to_string(),
            users: true,
            channels: vec![match_all.clone()],
            usergroups: vec![match_all],
            template: true,
            ..Restriction::default()
        }
    })
}

/// Return the first restriction whose path glob matches `logical_path`, or
/// the default restriction.
///
/// Matching is in declaration order and first-wins; callers rely on this to
/// place narrow rules before broad ones. An unparsable path glob never
/// matches.
pub fn resolve<'a>(restrictions: &'a [Restriction], logical_path: &str) -> &'a Restriction {
    for r in restrictions {
        if let Ok(pattern) = Pattern::new(&r.path) {
            if pattern.matches_with(logical_path, PATH_MATCH) {
                return r;
            }
        }
    }
    default_restriction()
}

/// True if `s` matches at least one pattern in `tests`.
pub fn matches_regex_list(s: &str, tests: &[Regex]) -> bool {
    tests.iter().any(|r| r.is_match(s))
}
