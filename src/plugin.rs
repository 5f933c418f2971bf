use anyhow::{bail, Result};
use chrono::{DateTime, Local};
use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashSet;

pub const UPPERCASE_HEADINGS: &str = "Uppercase Headings";
pub const ADD_TIMESTAMP: &str = "Add Timestamp";

// en-US style "1/5/2024, 2:03:09 PM"
const TIMESTAMP_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(#+)([ \t]*)(.+)$").expect("valid heading regex"));

/// Text-to-text transformation. Must be total: every input yields an output.
pub type Transform = fn(&str) -> String;

/// Behavioural properties a plugin declares about its transform.
///
/// The pipeline does not rely on these; they exist so callers (and tests)
/// can tell a pure, idempotent entry apart from one that reads the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginProperties {
    /// Output depends only on the input text.
    pub pure: bool,
    /// `f(f(x)) == f(x)` for every input.
    pub idempotent: bool,
}

impl PluginProperties {
    pub const PURE_IDEMPOTENT: Self = Self {
        pure: true,
        idempotent: true,
    };
    pub const CLOCK_DEPENDENT: Self = Self {
        pure: false,
        idempotent: false,
    };
}

#[derive(Debug, Clone)]
pub struct Plugin {
    name: &'static str,
    description: &'static str,
    transform: Transform,
    properties: PluginProperties,
}

impl Plugin {
    pub fn new(
        name: &'static str,
        description: &'static str,
        transform: Transform,
        properties: PluginProperties,
    ) -> Self {
        Self {
            name,
            description,
            transform,
            properties,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn properties(&self) -> PluginProperties {
        self.properties
    }

    pub fn run(&self, input: &str) -> String {
        (self.transform)(input)
    }
}

/// Fixed, ordered plugin catalog. Its order is the composition order.
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    plugins: Vec<Plugin>,
}

impl PluginRegistry {
    pub fn new(plugins: Vec<Plugin>) -> Result<Self> {
        let mut seen = HashSet::new();
        for plugin in &plugins {
            if !seen.insert(plugin.name()) {
                bail!("duplicate plugin name: {}", plugin.name());
            }
        }
        debug!("event=registry_init count={}", plugins.len());
        Ok(Self { plugins })
    }

    /// The shipped plugins, in the order they run.
    pub fn builtin() -> Result<Self> {
        Self::new(vec![
            Plugin::new(
                UPPERCASE_HEADINGS,
                "Upper-case the text of every markdown heading",
                uppercase_headings,
                PluginProperties::PURE_IDEMPOTENT,
            ),
            Plugin::new(
                ADD_TIMESTAMP,
                "Prepend a \"Last edited\" banner with the current time",
                prepend_timestamp,
                PluginProperties::CLOCK_DEPENDENT,
            ),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plugin> {
        self.plugins.iter()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }
}

pub fn uppercase_headings(input: &str) -> String {
    HEADING_RE
        .replace_all(input, |caps: &Captures| {
            format!("{}{}{}", &caps[1], &caps[2], caps[3].to_uppercase())
        })
        .into_owned()
}

/// Not idempotent: every call stacks another banner on top.
pub fn prepend_timestamp(input: &str) -> String {
    format!("{}{input}", timestamp_banner(&Local::now()))
}

pub fn timestamp_banner(at: &DateTime<Local>) -> String {
    format!("Last edited: {}\n\n", at.format(TIMESTAMP_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn shout(input: &str) -> String {
        input.to_uppercase()
    }

    #[test]
    fn uppercase_headings_only_touches_heading_text() {
        assert_eq!(uppercase_headings("# hello\nworld"), "# HELLO\nworld");
    }

    #[test]
    fn uppercase_headings_preserves_marker_run_and_spacing() {
        let input = "intro\n###   deep dive\n#\ttabbed\n#tight\nplain # not heading";
        let expected = "intro\n###   DEEP DIVE\n#\tTABBED\n#TIGHT\nplain # not heading";
        assert_eq!(uppercase_headings(input), expected);
    }

    #[test]
    fn uppercase_headings_does_not_join_lines() {
        assert_eq!(uppercase_headings("#\nbody"), "#\nbody");
        assert_eq!(uppercase_headings("##\n\ntext"), "##\n\ntext");
    }

    #[test]
    fn uppercase_headings_is_idempotent() {
        let samples = [
            "",
            "# a\n## b c\ntext",
            "#Straße\n  # indented",
            "### mixed Case ü\r\nnext",
        ];
        for sample in samples {
            let once = uppercase_headings(sample);
            assert_eq!(uppercase_headings(&once), once, "input {sample:?}");
        }
    }

    #[test]
    fn timestamp_banner_uses_locale_style_format() {
        let at = Local.with_ymd_and_hms(2024, 1, 5, 14, 3, 9).unwrap();
        assert_eq!(timestamp_banner(&at), "Last edited: 1/5/2024, 2:03:09 PM\n\n");
    }

    #[test]
    fn prepend_timestamp_stacks_banners() {
        let once = prepend_timestamp("body");
        assert!(once.starts_with("Last edited: "));
        assert!(once.ends_with("\n\nbody"));

        let twice = prepend_timestamp(&once);
        assert_eq!(twice.matches("Last edited: ").count(), 2);
        assert_ne!(twice, once);
    }

    #[test]
    fn builtin_registry_is_ordered_and_flags_clock_plugin() {
        let registry = PluginRegistry::builtin().unwrap();
        let names: Vec<_> = registry.iter().map(Plugin::name).collect();
        assert_eq!(names, vec![UPPERCASE_HEADINGS, ADD_TIMESTAMP]);

        let timestamp = registry.get(ADD_TIMESTAMP).unwrap();
        assert!(!timestamp.properties().pure);
        assert!(!timestamp.properties().idempotent);
        assert!(registry.get(UPPERCASE_HEADINGS).unwrap().properties().idempotent);
    }

    #[test]
    fn lookup_of_unknown_name_is_none() {
        assert!(PluginRegistry::builtin().unwrap().get("Spellcheck").is_none());
    }

    #[test]
    fn registry_rejects_duplicate_names() {
        let plugins = vec![
            Plugin::new("Shout", "", shout, PluginProperties::PURE_IDEMPOTENT),
            Plugin::new("Shout", "", shout, PluginProperties::PURE_IDEMPOTENT),
        ];
        assert!(PluginRegistry::new(plugins).is_err());
    }

    #[test]
    fn builtin_names_are_unique() {
        let registry = PluginRegistry::builtin().unwrap();
        let names: HashSet<_> = registry.iter().map(Plugin::name).collect();
        assert_eq!(names.len(), registry.len());
    }
}
