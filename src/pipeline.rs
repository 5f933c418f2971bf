use crate::plugin::{Plugin, PluginRegistry};
use crate::selection::PluginSelection;

/// One registry slot resolved against the current selection.
#[derive(Debug, Clone, Copy)]
pub enum Stage<'a> {
    Run(&'a Plugin),
    Identity,
}

impl Stage<'_> {
    fn apply(self, input: String) -> String {
        match self {
            Stage::Run(plugin) => plugin.run(&input),
            Stage::Identity => input,
        }
    }
}

/// Composition of the enabled plugins in registry order.
///
/// Borrows its inputs and resolves every stage on each `apply`, so a toggle
/// is visible on the very next call.
pub struct Pipeline<'a> {
    registry: &'a PluginRegistry,
    selection: &'a PluginSelection,
}

impl<'a> Pipeline<'a> {
    pub fn new(registry: &'a PluginRegistry, selection: &'a PluginSelection) -> Self {
        Self {
            registry,
            selection,
        }
    }

    pub fn stage(&self, plugin: &'a Plugin) -> Stage<'a> {
        if self.selection.is_active(plugin.name()) {
            Stage::Run(plugin)
        } else {
            Stage::Identity
        }
    }

    pub fn apply(&self, content: &str) -> String {
        self.registry
            .iter()
            .map(|plugin| self.stage(plugin))
            .fold(content.to_string(), |acc, stage| stage.apply(acc))
    }

    /// Enabled plugins in the order they will run.
    pub fn active(&self) -> impl Iterator<Item = &'a Plugin> + '_ {
        self.registry
            .iter()
            .filter(|plugin| self.selection.is_active(plugin.name()))
    }

    /// Selected names with no registry entry; they contribute nothing.
    pub fn unresolved(&self) -> Vec<&'a str> {
        self.selection
            .names()
            .filter(|name| self.registry.get(name).is_none())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::Pipeline;
    use crate::plugin::{
        Plugin, PluginProperties, PluginRegistry, ADD_TIMESTAMP, UPPERCASE_HEADINGS,
    };
    use crate::selection::PluginSelection;

    fn append_a(input: &str) -> String {
        format!("{input}a")
    }

    fn append_b(input: &str) -> String {
        format!("{input}b")
    }

    fn letters() -> PluginRegistry {
        PluginRegistry::new(vec![
            Plugin::new("A", "", append_a, PluginProperties::PURE_IDEMPOTENT),
            Plugin::new("B", "", append_b, PluginProperties::PURE_IDEMPOTENT),
        ])
        .unwrap()
    }

    #[test]
    fn empty_selection_is_identity() {
        let registry = PluginRegistry::builtin().unwrap();
        let selection = PluginSelection::new();
        let pipeline = Pipeline::new(&registry, &selection);
        for content in ["", "# hi", "plain\n\n## two\n"] {
            assert_eq!(pipeline.apply(content), content);
        }
    }

    #[test]
    fn uppercase_headings_example() {
        let registry = PluginRegistry::builtin().unwrap();
        let mut selection = PluginSelection::new();
        selection.toggle(UPPERCASE_HEADINGS);
        let pipeline = Pipeline::new(&registry, &selection);
        assert_eq!(pipeline.apply("# hello\nworld"), "# HELLO\nworld");
    }

    #[test]
    fn registry_order_wins_over_toggle_order() {
        let registry = letters();
        let mut forward = PluginSelection::new();
        forward.toggle("A");
        forward.toggle("B");
        let mut backward = PluginSelection::new();
        backward.toggle("B");
        backward.toggle("A");

        let a = Pipeline::new(&registry, &forward).apply("x");
        let b = Pipeline::new(&registry, &backward).apply("x");
        assert_eq!(a, "xab");
        assert_eq!(a, b);
    }

    #[test]
    fn builtin_toggle_order_does_not_change_output_shape() {
        let registry = PluginRegistry::builtin().unwrap();
        let mut forward = PluginSelection::new();
        forward.toggle(ADD_TIMESTAMP);
        forward.toggle(UPPERCASE_HEADINGS);
        let mut backward = PluginSelection::new();
        backward.toggle(UPPERCASE_HEADINGS);
        backward.toggle(ADD_TIMESTAMP);

        let a = Pipeline::new(&registry, &forward).apply("# title\nbody");
        let b = Pipeline::new(&registry, &backward).apply("# title\nbody");
        assert!(a.starts_with("Last edited: ") && b.starts_with("Last edited: "));
        assert!(a.ends_with("\n\n# TITLE\nbody") && b.ends_with("\n\n# TITLE\nbody"));
    }

    #[test]
    fn unknown_names_contribute_identity() {
        let registry = letters();
        let mut selection = PluginSelection::new();
        selection.toggle("Ghost");
        selection.toggle("B");
        let pipeline = Pipeline::new(&registry, &selection);
        assert_eq!(pipeline.apply("x"), "xb");
        assert_eq!(pipeline.unresolved(), vec!["Ghost"]);
        assert_eq!(
            pipeline.active().map(Plugin::name).collect::<Vec<_>>(),
            vec!["B"]
        );
    }

    #[test]
    fn pure_selection_is_deterministic() {
        let registry = PluginRegistry::builtin().unwrap();
        let mut selection = PluginSelection::new();
        selection.toggle(UPPERCASE_HEADINGS);
        let pipeline = Pipeline::new(&registry, &selection);
        let content = "# one\n## two\ntext";
        assert_eq!(pipeline.apply(content), pipeline.apply(content));
    }
}
