use crate::document::{DocumentStore, Note, NoteId};
use crate::markdown::MarkdownRenderer;
use crate::pipeline::Pipeline;
use crate::plugin::PluginRegistry;
use crate::selection::PluginSelection;
use crate::theme::{Theme, ThemeState};
use anyhow::Result;
use log::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Edit,
    Preview,
}

impl RenderMode {
    pub fn toggled(self) -> Self {
        match self {
            RenderMode::Edit => RenderMode::Preview,
            RenderMode::Preview => RenderMode::Edit,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RenderMode::Edit => "edit",
            RenderMode::Preview => "preview",
        }
    }
}

/// What the main pane shows for the current state.
#[derive(Debug, Clone, PartialEq)]
pub enum View<T> {
    /// No note selected.
    Empty,
    /// Editable source text.
    Source(String),
    /// Renderer output of the transformed text.
    Rendered(T),
    /// Renderer failed; the untransformed source is shown read-only.
    Fallback(String),
}

/// All session state, behind the only mutation surface the UI gets.
///
/// Every field is private: notes, plugin toggles, render mode and theme can
/// only change through the methods below.
pub struct Workspace {
    registry: PluginRegistry,
    store: DocumentStore,
    selection: PluginSelection,
    mode: RenderMode,
    theme: ThemeState,
    plugin_panel_open: bool,
}

impl Workspace {
    pub fn new(registry: PluginRegistry, store: DocumentStore, theme: Theme) -> Self {
        Self {
            registry,
            store,
            selection: PluginSelection::new(),
            mode: RenderMode::default(),
            theme: ThemeState::new(theme),
            plugin_panel_open: false,
        }
    }

    /// Fresh-start workspace: built-in plugins, seeded notes, nothing enabled.
    pub fn seeded(theme: Theme) -> Result<Self> {
        Ok(Self::new(PluginRegistry::builtin()?, DocumentStore::seeded(), theme))
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(&self.registry, &self.selection)
    }

    pub fn notes(&self) -> &[Note] {
        self.store.notes()
    }

    pub fn selected_note(&self) -> Option<&Note> {
        self.store.selected()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.store.selected_index()
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn theme(&self) -> Theme {
        self.theme.current()
    }

    pub fn theme_generation(&self) -> u64 {
        self.theme.generation()
    }

    pub fn plugin_panel_open(&self) -> bool {
        self.plugin_panel_open
    }

    pub fn create_note(&mut self, title: &str) -> Option<NoteId> {
        self.store.create(title)
    }

    pub fn import_note(&mut self, title: &str, content: String) -> Option<NoteId> {
        self.store.import(title, content)
    }

    pub fn update_content(&mut self, id: NoteId, content: String) -> bool {
        self.store.update_content(id, content)
    }

    pub fn select_note(&mut self, id: Option<NoteId>) -> bool {
        self.store.select(id)
    }

    /// Moves the selection `delta` places through the note list.
    ///
    /// With nothing selected, a forward step lands on the first note and a
    /// backward step on the last.
    pub fn select_relative(&mut self, delta: isize) -> bool {
        let len = self.store.len();
        if len == 0 {
            return false;
        }
        let target = match self.store.selected_index() {
            Some(idx) => idx.saturating_add_signed(delta).min(len - 1),
            None if delta < 0 => len - 1,
            None => 0,
        };
        let id = self.store.notes()[target].id();
        self.select_note(Some(id))
    }

    pub fn toggle_plugin(&mut self, name: &str) -> bool {
        let active = self.selection.toggle(name);
        if self.registry.get(name).is_none() {
            warn!("event=plugin_toggle status=unresolved name={name:?}");
        }
        active
    }

    pub fn is_plugin_active(&self, name: &str) -> bool {
        self.selection.is_active(name)
    }

    pub fn toggle_mode(&mut self) -> RenderMode {
        self.set_mode(self.mode.toggled())
    }

    pub fn set_mode(&mut self, mode: RenderMode) -> RenderMode {
        self.mode = mode;
        debug!("event=mode_set mode={}", mode.label());
        mode
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme.set_theme(theme);
    }

    pub fn open_plugin_panel(&mut self) {
        self.plugin_panel_open = true;
    }

    pub fn close_plugin_panel(&mut self) {
        self.plugin_panel_open = false;
    }

    /// Computes the main-pane view from the authoritative store entry.
    ///
    /// A renderer error never escapes: it is logged and the raw content is
    /// returned in its place.
    pub fn view<R: MarkdownRenderer>(&self, renderer: &R) -> View<R::Output> {
        let Some(note) = self.store.selected() else {
            return View::Empty;
        };
        match self.mode {
            RenderMode::Edit => View::Source(note.content().to_string()),
            RenderMode::Preview => {
                let transformed = self.pipeline().apply(note.content());
                match renderer.render(&transformed) {
                    Ok(output) => View::Rendered(output),
                    Err(err) => {
                        warn!("event=render status=failed id={} error={err:#}", note.id());
                        View::Fallback(note.content().to_string())
                    }
                }
            }
        }
    }
}
