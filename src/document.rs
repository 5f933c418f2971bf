use log::{debug, info};
use std::fmt;

const WELCOME_CONTENT: &str = "# Welcome\n\n\
This is your markdown notebook. Pick a note on the left and start typing.\n\n\
- Press `p` to switch between editing and the rendered preview.\n\
- Press `P` to choose which plugins transform the preview.\n\
- Press `t` to pick a theme.\n";

const FEATURES_CONTENT: &str = "# Features\n\n\
## Editing\n\n\
Notes are plain markdown. Every keystroke updates the note in place.\n\n\
## Plugins\n\n\
Plugins rewrite the text before it is rendered. They always run in the \
same order, whatever order you enabled them in.\n\n\
## Themes\n\n\
A theme restyles the whole workspace.\n";

/// Opaque note identity, unique for the life of a [`DocumentStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId(u64);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "note-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    id: NoteId,
    title: String,
    content: String,
}

impl Note {
    pub fn id(&self) -> NoteId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

pub fn starter_content(title: &str) -> String {
    format!("# {title}\n\nStart writing your note here...")
}

/// Sole owner of every note plus the "selected" pointer.
///
/// The selection is stored as an id, never as a copy of the note, so reads of
/// the selected note always see the latest content.
#[derive(Debug)]
pub struct DocumentStore {
    notes: Vec<Note>,
    selected: Option<NoteId>,
    next_id: u64,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            notes: Vec::new(),
            selected: None,
            next_id: 1,
        }
    }

    /// Store as it looks on a fresh start: two example notes, none selected.
    pub fn seeded() -> Self {
        let mut store = Self::new();
        store.push("Welcome", WELCOME_CONTENT.to_string());
        store.push("Features", FEATURES_CONTENT.to_string());
        store
    }

    /// Creates a note seeded from [`starter_content`] and selects it.
    ///
    /// Returns `None` and changes nothing when the title is blank.
    pub fn create(&mut self, title: &str) -> Option<NoteId> {
        let title = title.trim();
        if title.is_empty() {
            debug!("event=note_create status=rejected reason=blank_title");
            return None;
        }
        let id = self.push(title, starter_content(title));
        self.selected = Some(id);
        info!("event=note_create status=ok id={id}");
        Some(id)
    }

    /// Adds a note with caller-supplied content and selects it.
    pub fn import(&mut self, title: &str, content: String) -> Option<NoteId> {
        let title = title.trim();
        if title.is_empty() {
            return None;
        }
        let id = self.push(title, content);
        self.selected = Some(id);
        info!("event=note_import status=ok id={id}");
        Some(id)
    }

    /// Replaces the content of the selected note wholesale.
    ///
    /// Ignored unless `id` is the currently selected note.
    pub fn update_content(&mut self, id: NoteId, content: String) -> bool {
        if self.selected != Some(id) {
            debug!("event=note_update status=ignored id={id} reason=not_selected");
            return false;
        }
        match self.notes.iter_mut().find(|note| note.id == id) {
            Some(note) => {
                note.content = content;
                true
            }
            None => false,
        }
    }

    /// Points the selection at `id`, or clears it with `None`.
    ///
    /// An id this store never issued leaves the selection untouched.
    pub fn select(&mut self, id: Option<NoteId>) -> bool {
        if let Some(id) = id {
            if self.get(id).is_none() {
                debug!("event=note_select status=ignored id={id} reason=unknown");
                return false;
            }
        }
        self.selected = id;
        true
    }

    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn selected(&self) -> Option<&Note> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn selected_index(&self) -> Option<usize> {
        let id = self.selected?;
        self.notes.iter().position(|note| note.id == id)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    fn push(&mut self, title: &str, content: String) -> NoteId {
        let id = NoteId(self.next_id);
        self.next_id += 1;
        self.notes.push(Note {
            id,
            title: title.to_string(),
            content,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn seeded_store_has_welcome_and_features_unselected() {
        let store = DocumentStore::seeded();
        let titles: Vec<_> = store.notes().iter().map(Note::title).collect();
        assert_eq!(titles, vec!["Welcome", "Features"]);
        assert!(store.selected().is_none());
    }

    #[test]
    fn create_seeds_template_and_selects() {
        let mut store = DocumentStore::seeded();
        let id = store.create("Ideas").unwrap();
        let selected = store.selected().unwrap();
        assert_eq!(selected.id(), id);
        assert_eq!(selected.content(), "# Ideas\n\nStart writing your note here...");
        assert_eq!(store.len(), 3);
        assert_eq!(store.notes().last().unwrap().id(), id);
    }

    #[test]
    fn blank_titles_are_rejected_without_side_effects() {
        let mut store = DocumentStore::seeded();
        let first = store.notes()[0].id();
        store.select(Some(first));
        for title in ["", " ", "\t\n", "   \r\n "] {
            assert_eq!(store.create(title), None);
        }
        assert_eq!(store.len(), 2);
        assert_eq!(store.selected().map(Note::id), Some(first));
    }

    #[test]
    fn created_ids_are_never_reused() {
        let mut store = DocumentStore::seeded();
        let mut seen: HashSet<NoteId> = store.notes().iter().map(Note::id).collect();
        for i in 0..50 {
            let id = store.create(&format!("note {i}")).unwrap();
            assert!(seen.insert(id), "duplicate id {id}");
        }
    }

    #[test]
    fn update_writes_through_to_the_store() {
        let mut store = DocumentStore::new();
        let id = store.create("Draft").unwrap();
        assert!(store.update_content(id, "new body".to_string()));
        assert_eq!(store.get(id).unwrap().content(), "new body");
        assert_eq!(store.selected().unwrap().content(), "new body");
    }

    #[test]
    fn update_without_selection_is_ignored() {
        let mut store = DocumentStore::new();
        let id = store.create("Draft").unwrap();
        store.select(None);
        assert!(!store.update_content(id, "lost".to_string()));
        assert_eq!(store.get(id).unwrap().content(), starter_content("Draft"));
    }

    #[test]
    fn update_of_unselected_note_is_ignored() {
        let mut store = DocumentStore::new();
        let first = store.create("One").unwrap();
        let _second = store.create("Two").unwrap();
        assert!(!store.update_content(first, "nope".to_string()));
        assert_eq!(store.get(first).unwrap().content(), starter_content("One"));
    }

    #[test]
    fn select_unknown_id_keeps_selection() {
        let mut store = DocumentStore::seeded();
        let first = store.notes()[0].id();
        assert!(store.select(Some(first)));
        assert!(!store.select(Some(NoteId(999))));
        assert_eq!(store.selected().map(Note::id), Some(first));
        assert!(store.select(None));
        assert_eq!(store.selected().map(Note::id), None);
    }

    #[test]
    fn create_trims_title() {
        let mut store = DocumentStore::new();
        store.create("  Ideas  ");
        assert_eq!(store.selected().unwrap().title(), "Ideas");
        assert_eq!(store.selected_index(), Some(0));
    }
}
