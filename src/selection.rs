use log::debug;
use std::collections::BTreeSet;

/// Names of the currently enabled plugins.
///
/// Membership only; toggle order is never recorded. Names that no registry
/// entry carries are accepted and simply never resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginSelection {
    active: BTreeSet<String>,
}

impl PluginSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips membership of `name` and returns whether it is now active.
    pub fn toggle(&mut self, name: &str) -> bool {
        let active = if self.active.remove(name) {
            false
        } else {
            self.active.insert(name.to_string());
            true
        };
        debug!("event=plugin_toggle name={name:?} active={active}");
        active
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.active.iter().map(String::as_str)
    }
}
