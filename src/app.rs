use crate::config::Config;
use crate::document::NoteId;
use crate::markdown::{syntect_to_ratatui, MarkdownStyles, TerminalRenderer};
use crate::theme::{catalog_position, Theme, ThemeManager, UiPalette, THEME_CATALOG};
use crate::workspace::{RenderMode, View, Workspace};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use log::info;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use ropey::Rope;
use std::io::{self, Stdout};
use std::time::Duration;
use syntect::easy::HighlightLines;
use syntect::parsing::SyntaxSet;
use unicode_width::UnicodeWidthChar;

pub fn run_app(workspace: Workspace, config: Config) -> Result<()> {
    let mut app = App::new(workspace, config);

    let mut terminal = setup_terminal()?;
    let _guard = TerminalGuard;

    let tick_rate = Duration::from_millis(250);

    loop {
        let size = terminal.size()?;
        let layout = app.layout(size);
        app.refresh_styles();
        app.sync_cursor();
        app.scroll_cursor_into_view(layout.body_height);

        terminal.draw(|f| ui(f, &app, &layout))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Release && app.handle_key(key, layout.body_height) {
                    break;
                }
            }
        }
    }

    info!("event=app_exit status=ok notes={}", app.workspace.notes().len());
    Ok(())
}

struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = stdout.execute(LeaveAlternateScreen);
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Insert,
    NewNote,
    ThemePicker,
}

struct LayoutInfo {
    main: Rect,
    status: Rect,
    notes: Option<Rect>,
    body: Rect,
    body_width: u16,
    body_height: u16,
}

struct App {
    workspace: Workspace,
    config: Config,
    theme_manager: ThemeManager,
    syntax_set: SyntaxSet,
    ui: UiPalette,
    base_style: Style,
    markdown_styles: MarkdownStyles,
    styles_generation: Option<u64>,
    mode: Mode,
    show_notes: bool,
    cursor_note: Option<NoteId>,
    cursor_char: usize,
    preferred_col: Option<usize>,
    edit_scroll: usize,
    preview_scroll: u16,
    title_input: String,
    plugin_cursor: usize,
    theme_selected: usize,
    theme_before_picker: Option<Theme>,
    status: Option<String>,
}

impl App {
    fn new(workspace: Workspace, config: Config) -> Self {
        let theme_manager = ThemeManager::new();
        let ui = theme_manager.ui_palette(&workspace.theme());
        let (base_style, markdown_styles) = styles_from_palette(ui);
        let show_notes = config.show_notes;

        Self {
            workspace,
            config,
            theme_manager,
            syntax_set: SyntaxSet::load_defaults_newlines(),
            ui,
            base_style,
            markdown_styles,
            styles_generation: None,
            mode: Mode::Normal,
            show_notes,
            cursor_note: None,
            cursor_char: 0,
            preferred_col: None,
            edit_scroll: 0,
            preview_scroll: 0,
            title_input: String::new(),
            plugin_cursor: 0,
            theme_selected: 0,
            theme_before_picker: None,
            status: Some("j/k pick a note, n new, p preview, P plugins, t theme, q quit".to_string()),
        }
    }

    fn layout(&self, size: Rect) -> LayoutInfo {
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(size);
        let main = vertical[0];
        let status = vertical[1];

        let (notes, body) = if self.show_notes {
            let notes_width = self.config.notes_width.min(main.width.saturating_sub(20));
            let horiz = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(notes_width), Constraint::Min(20)])
                .split(main);
            (Some(horiz[0]), horiz[1])
        } else {
            (None, main)
        };

        LayoutInfo {
            main,
            status,
            notes,
            body,
            body_width: body.width.saturating_sub(2).max(1),
            body_height: body.height.saturating_sub(2).max(1),
        }
    }

    /// Rebuilds palette-derived styles whenever the theme has changed.
    fn refresh_styles(&mut self) {
        let generation = self.workspace.theme_generation();
        if self.styles_generation == Some(generation) {
            return;
        }
        self.ui = self.theme_manager.ui_palette(&self.workspace.theme());
        let (base_style, markdown_styles) = styles_from_palette(self.ui);
        self.base_style = base_style;
        self.markdown_styles = markdown_styles;
        self.styles_generation = Some(generation);
    }

    /// Resets cursor and scroll when the selected note changes, and clamps the
    /// cursor after edits.
    fn sync_cursor(&mut self) {
        let selected = self.workspace.selected_note().map(|n| n.id());
        if selected != self.cursor_note {
            self.cursor_note = selected;
            self.cursor_char = 0;
            self.preferred_col = None;
            self.edit_scroll = 0;
            self.preview_scroll = 0;
        }
        if let Some(rope) = self.rope() {
            self.cursor_char = self.cursor_char.min(rope.len_chars());
        }
    }

    fn scroll_cursor_into_view(&mut self, height: u16) {
        let Some(rope) = self.rope() else {
            return;
        };
        let (line, _) = cursor_line_col(&rope, self.cursor_char);
        let height = height.max(1) as usize;
        if line < self.edit_scroll {
            self.edit_scroll = line;
        } else if line >= self.edit_scroll + height {
            self.edit_scroll = line + 1 - height;
        }
    }

    fn rope(&self) -> Option<Rope> {
        self.workspace
            .selected_note()
            .map(|note| Rope::from_str(note.content()))
    }

    fn handle_key(&mut self, key: KeyEvent, content_height: u16) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }
        if self.workspace.plugin_panel_open() {
            self.handle_plugin_panel(key);
            return false;
        }
        match self.mode {
            Mode::Normal => self.handle_normal(key, content_height),
            Mode::Insert => {
                self.handle_insert(key, content_height);
                false
            }
            Mode::NewNote => {
                self.handle_new_note(key);
                false
            }
            Mode::ThemePicker => {
                self.handle_theme_picker(key);
                false
            }
        }
    }

    fn handle_normal(&mut self, key: KeyEvent, content_height: u16) -> bool {
        self.status = None;
        let page = content_height.max(1) as isize;
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('j') | KeyCode::Down => {
                self.workspace.select_relative(1);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.workspace.select_relative(-1);
            }
            KeyCode::Char('p') => {
                let mode = self.workspace.toggle_mode();
                self.status = Some(format!("{} mode", mode.label()));
            }
            KeyCode::Char('i') => self.enter_insert(),
            KeyCode::Char('n') => {
                self.title_input.clear();
                self.mode = Mode::NewNote;
            }
            KeyCode::Char('P') => {
                self.plugin_cursor = 0;
                self.workspace.open_plugin_panel();
            }
            KeyCode::Char('t') => self.open_theme_picker(),
            KeyCode::Char('o') => self.show_notes = !self.show_notes,
            KeyCode::Char('J') => self.scroll_preview(1),
            KeyCode::Char('K') => self.scroll_preview(-1),
            KeyCode::PageDown => self.page(page),
            KeyCode::PageUp => self.page(-page),
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.page(page / 2)
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.page(-page / 2)
            }
            KeyCode::Left => self.move_cursor_left(),
            KeyCode::Right => self.move_cursor_right(),
            KeyCode::Home => self.move_cursor_line_start(),
            KeyCode::End => self.move_cursor_line_end(),
            _ => {}
        }
        false
    }

    fn enter_insert(&mut self) {
        if self.workspace.selected_note().is_none() {
            self.status = Some("No note selected".to_string());
            return;
        }
        if self.workspace.mode() != RenderMode::Edit {
            self.status = Some("Preview is read-only; press p to edit".to_string());
            return;
        }
        self.mode = Mode::Insert;
    }

    fn handle_insert(&mut self, key: KeyEvent, content_height: u16) {
        let page = content_height.max(1) as isize;
        match key.code {
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Enter => self.insert_str("\n"),
            KeyCode::Tab => {
                let spaces = " ".repeat(self.config.tab_width.max(1));
                self.insert_str(&spaces);
            }
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.move_cursor_left(),
            KeyCode::Right => self.move_cursor_right(),
            KeyCode::Up => self.move_cursor_vertical(-1),
            KeyCode::Down => self.move_cursor_vertical(1),
            KeyCode::Home => self.move_cursor_line_start(),
            KeyCode::End => self.move_cursor_line_end(),
            KeyCode::PageUp => self.move_cursor_vertical(-page),
            KeyCode::PageDown => self.move_cursor_vertical(page),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                let mut buf = [0u8; 4];
                self.insert_str(c.encode_utf8(&mut buf));
            }
            _ => {}
        }
    }

    fn handle_new_note(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.title_input.clear();
            }
            KeyCode::Enter => {
                let title = std::mem::take(&mut self.title_input);
                self.mode = Mode::Normal;
                match self.workspace.create_note(&title) {
                    Some(_) => self.status = Some(format!("Created \"{}\"", title.trim())),
                    None => self.status = Some("Title cannot be empty".to_string()),
                }
            }
            KeyCode::Backspace => {
                self.title_input.pop();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.title_input.push(c);
            }
            _ => {}
        }
    }

    fn handle_plugin_panel(&mut self, key: KeyEvent) {
        let total = self.workspace.registry().len();
        match key.code {
            KeyCode::Esc | KeyCode::Char('P') | KeyCode::Char('q') => {
                self.workspace.close_plugin_panel();
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.plugin_cursor = self.plugin_cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.plugin_cursor + 1 < total {
                    self.plugin_cursor += 1;
                }
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                let name = self
                    .workspace
                    .registry()
                    .iter()
                    .nth(self.plugin_cursor)
                    .map(|plugin| plugin.name());
                if let Some(name) = name {
                    let active = self.workspace.toggle_plugin(name);
                    let state = if active { "enabled" } else { "disabled" };
                    self.status = Some(format!("{name} {state}"));
                }
            }
            _ => {}
        }
    }

    fn open_theme_picker(&mut self) {
        let current = self.workspace.theme();
        self.theme_selected = catalog_position(&current).unwrap_or(0);
        self.theme_before_picker = Some(current);
        self.mode = Mode::ThemePicker;
    }

    fn handle_theme_picker(&mut self, key: KeyEvent) {
        let total = THEME_CATALOG.len();
        match key.code {
            KeyCode::Esc => {
                if let Some(original) = self.theme_before_picker.take() {
                    if self.workspace.theme() != original {
                        self.workspace.set_theme(original);
                    }
                }
                self.mode = Mode::Normal;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if self.theme_selected > 0 {
                    self.theme_selected -= 1;
                    self.workspace.set_theme(THEME_CATALOG[self.theme_selected]);
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.theme_selected + 1 < total {
                    self.theme_selected += 1;
                    self.workspace.set_theme(THEME_CATALOG[self.theme_selected]);
                }
            }
            KeyCode::Enter => {
                let theme = THEME_CATALOG[self.theme_selected];
                if self.workspace.theme() != theme {
                    self.workspace.set_theme(theme);
                }
                self.status = Some(format!("theme: {}", theme.name));
                self.theme_before_picker = None;
                self.mode = Mode::Normal;
            }
            _ => {}
        }
    }

    fn page(&mut self, delta: isize) {
        match self.workspace.mode() {
            RenderMode::Edit => self.move_cursor_vertical(delta),
            RenderMode::Preview => self.scroll_preview(delta),
        }
    }

    fn scroll_preview(&mut self, delta: isize) {
        let next = (self.preview_scroll as isize + delta).clamp(0, u16::MAX as isize);
        self.preview_scroll = next as u16;
    }

    /// Applies `op` to a rope built from the selected note and writes the
    /// whole result back. `op` returns the new cursor, or `None` for no edit.
    fn edit(&mut self, op: impl FnOnce(&mut Rope, usize) -> Option<usize>) {
        let Some(note) = self.workspace.selected_note() else {
            return;
        };
        let id = note.id();
        let mut rope = Rope::from_str(note.content());
        let cursor = self.cursor_char.min(rope.len_chars());
        if let Some(next) = op(&mut rope, cursor) {
            self.cursor_char = next;
            self.preferred_col = None;
            self.workspace.update_content(id, rope.to_string());
        }
    }

    fn insert_str(&mut self, text: &str) {
        let len = text.chars().count();
        self.edit(|rope, at| {
            rope.insert(at, text);
            Some(at + len)
        });
    }

    fn backspace(&mut self) {
        self.edit(|rope, at| {
            if at == 0 {
                return None;
            }
            rope.remove(at - 1..at);
            Some(at - 1)
        });
    }

    fn delete(&mut self) {
        self.edit(|rope, at| {
            if at >= rope.len_chars() {
                return None;
            }
            rope.remove(at..at + 1);
            Some(at)
        });
    }

    fn move_cursor_left(&mut self) {
        self.cursor_char = self.cursor_char.saturating_sub(1);
        self.preferred_col = None;
    }

    fn move_cursor_right(&mut self) {
        if let Some(rope) = self.rope() {
            if self.cursor_char < rope.len_chars() {
                self.cursor_char += 1;
            }
        }
        self.preferred_col = None;
    }

    fn move_cursor_vertical(&mut self, delta: isize) {
        let Some(rope) = self.rope() else {
            return;
        };
        let (line, col) = cursor_line_col(&rope, self.cursor_char);
        let max_line = rope.len_lines().saturating_sub(1);
        let target_line = line.saturating_add_signed(delta).min(max_line);
        let desired = self.preferred_col.unwrap_or(col);
        let target_col = desired.min(line_len_chars(&rope, target_line));
        self.cursor_char = rope.line_to_char(target_line) + target_col;
        self.preferred_col = Some(desired);
    }

    fn move_cursor_line_start(&mut self) {
        if let Some(rope) = self.rope() {
            let (line, _) = cursor_line_col(&rope, self.cursor_char);
            self.cursor_char = rope.line_to_char(line);
        }
        self.preferred_col = None;
    }

    fn move_cursor_line_end(&mut self) {
        if let Some(rope) = self.rope() {
            let (line, _) = cursor_line_col(&rope, self.cursor_char);
            self.cursor_char = rope.line_to_char(line) + line_len_chars(&rope, line);
        }
        self.preferred_col = None;
    }

    fn status_line(&self) -> Line<'static> {
        if matches!(self.mode, Mode::NewNote) {
            return Line::from(vec![
                Span::styled("New note title: ", Style::default().fg(self.ui.accent)),
                Span::styled(self.title_input.clone(), self.base_style),
            ]);
        }

        let sep = || Span::styled(" | ", Style::default().fg(self.ui.muted));
        let mut parts = vec![Span::styled(
            "notemark",
            Style::default().fg(self.ui.accent).add_modifier(Modifier::BOLD),
        )];
        parts.push(sep());
        let mode_label = match self.mode {
            Mode::Insert => "insert",
            _ => self.workspace.mode().label(),
        };
        parts.push(Span::styled(mode_label, Style::default().fg(self.ui.accent)));
        if let Some(note) = self.workspace.selected_note() {
            parts.push(sep());
            parts.push(Span::styled(note.title().to_string(), self.base_style));
        }
        parts.push(sep());
        parts.push(Span::styled(
            format!(
                "plugins {}/{}",
                self.workspace.pipeline().active().count(),
                self.workspace.registry().len()
            ),
            Style::default().fg(self.ui.muted),
        ));
        parts.push(sep());
        parts.push(Span::styled(
            format!("theme: {}", self.workspace.theme().name),
            Style::default().fg(self.ui.muted),
        ));
        if let Some(msg) = &self.status {
            parts.push(sep());
            parts.push(Span::styled(msg.clone(), Style::default().fg(self.ui.accent)));
        }
        Line::from(parts)
    }

    /// Markdown source with syntax highlighting, one line per source line.
    fn source_lines(&self, content: &str) -> Vec<Line<'static>> {
        let syntax = self
            .syntax_set
            .find_syntax_by_extension("md")
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());
        let theme = self.theme_manager.syntax_theme(&self.workspace.theme());
        let mut highlighter = HighlightLines::new(syntax, theme);
        let rope = Rope::from_str(content);
        let mut lines = Vec::with_capacity(rope.len_lines());
        for line in rope.lines() {
            let line_str = line.to_string();
            let ranges = match highlighter.highlight_line(&line_str, &self.syntax_set) {
                Ok(r) => r,
                Err(_) => vec![(syntect::highlighting::Style::default(), line_str.as_str())],
            };
            let spans: Vec<Span<'static>> = ranges
                .into_iter()
                .map(|(style, text)| (style, text.trim_end_matches(['\n', '\r'])))
                .filter(|(_, text)| !text.is_empty())
                .map(|(style, text)| {
                    Span::styled(text.to_string(), syntect_to_ratatui(style, self.ui.base_bg))
                })
                .collect();
            lines.push(Line::from(spans));
        }
        lines
    }

    fn cursor_screen_position(&self, layout: &LayoutInfo) -> Option<(u16, u16)> {
        if !matches!(self.mode, Mode::Insert | Mode::Normal)
            || self.workspace.plugin_panel_open()
            || self.workspace.mode() != RenderMode::Edit
        {
            return None;
        }
        let rope = self.rope()?;
        let (line, col) = cursor_line_col(&rope, self.cursor_char);
        if line < self.edit_scroll {
            return None;
        }
        let visible_line = line - self.edit_scroll;
        if visible_line >= layout.body_height as usize {
            return None;
        }
        let width: usize = rope
            .line(line)
            .chars()
            .take(col)
            .map(|ch| UnicodeWidthChar::width(ch).unwrap_or(0))
            .sum();
        let x = layout
            .body
            .x
            .saturating_add(1)
            .saturating_add(width.min(layout.body_width as usize).try_into().ok()?);
        let y = layout
            .body
            .y
            .saturating_add(1)
            .saturating_add(visible_line.try_into().ok()?);
        Some((x, y))
    }
}

fn ui(f: &mut ratatui::Frame, app: &App, layout: &LayoutInfo) {
    let highlight_fg = app.ui.base_bg.unwrap_or(app.ui.base_fg);
    let highlight_style = Style::default().bg(app.ui.accent).fg(highlight_fg);
    let bordered = |title: String| {
        Block::bordered()
            .title(title)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(app.ui.border))
            .style(app.base_style)
    };

    // Workspace root carries the theme.
    f.render_widget(Block::default().style(app.base_style), f.size());

    f.render_widget(Paragraph::new(app.status_line()).style(app.base_style), layout.status);

    if let Some(notes_area) = layout.notes {
        let items: Vec<ListItem> = app
            .workspace
            .notes()
            .iter()
            .map(|note| ListItem::new(note.title().to_string()))
            .collect();
        let mut state = ListState::default();
        state.select(app.workspace.selected_index());
        let list = List::new(items)
            .block(bordered(" Notes ".to_string()))
            .style(app.base_style)
            .highlight_style(highlight_style);
        f.render_stateful_widget(list, notes_area, &mut state);
    }

    let renderer = TerminalRenderer {
        syntax_set: &app.syntax_set,
        theme: app.theme_manager.syntax_theme(&app.workspace.theme()),
        styles: &app.markdown_styles,
        tab_width: app.config.tab_width,
    };
    let title = app
        .workspace
        .selected_note()
        .map(|note| note.title().to_string())
        .unwrap_or_default();
    let body = match app.workspace.view(&renderer) {
        View::Empty => Paragraph::new(Line::from(Span::styled(
            "No note selected. Press j/k to pick one or n to create one.",
            Style::default().fg(app.ui.muted),
        )))
        .block(bordered(" notemark ".to_string())),
        View::Source(content) => Paragraph::new(Text::from(app.source_lines(&content)))
            .block(bordered(format!(" {title} ")))
            .scroll((app.edit_scroll.min(u16::MAX as usize) as u16, 0)),
        View::Rendered(lines) => wrapped(
            Paragraph::new(Text::from(lines))
                .block(bordered(format!(" {title} · preview ")))
                .scroll((app.preview_scroll, 0)),
            app.config.wrap,
        ),
        View::Fallback(content) => wrapped(
            Paragraph::new(content)
                .block(bordered(format!(" {title} · preview unavailable ")))
                .scroll((app.preview_scroll, 0)),
            app.config.wrap,
        ),
    };
    f.render_widget(body.style(app.base_style), layout.body);

    if app.workspace.plugin_panel_open() {
        let popup = centered_rect(60, 50, layout.main);
        f.render_widget(Clear, popup);
        let items: Vec<ListItem> = app
            .workspace
            .registry()
            .iter()
            .map(|plugin| {
                let mark = if app.workspace.is_plugin_active(plugin.name()) {
                    "[x]"
                } else {
                    "[ ]"
                };
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{mark} {}", plugin.name()), app.base_style),
                    Span::styled(
                        format!("  {}", plugin.description()),
                        Style::default().fg(app.ui.muted),
                    ),
                ]))
            })
            .collect();
        let mut state = ListState::default();
        state.select(Some(app.plugin_cursor));
        let list = List::new(items)
            .block(bordered(" Plugins (space toggles, esc closes) ".to_string()))
            .style(app.base_style)
            .highlight_style(highlight_style);
        f.render_stateful_widget(list, popup, &mut state);
    }

    if matches!(app.mode, Mode::ThemePicker) {
        let popup = centered_rect(40, 40, layout.main);
        f.render_widget(Clear, popup);
        let items: Vec<ListItem> = THEME_CATALOG
            .iter()
            .map(|theme| ListItem::new(format!("{} ({})", theme.name, theme.class)))
            .collect();
        let mut state = ListState::default();
        state.select(Some(app.theme_selected));
        let list = List::new(items)
            .block(bordered(" Themes ".to_string()))
            .style(app.base_style)
            .highlight_style(highlight_style);
        f.render_stateful_widget(list, popup, &mut state);
    }

    if let Some((x, y)) = app.cursor_screen_position(layout) {
        f.set_cursor(x, y);
    }
}

/// Soft-wraps preview text. The editor pane never wraps, so source lines
/// map 1:1 onto screen rows for cursor placement.
fn wrapped(paragraph: Paragraph<'_>, wrap: bool) -> Paragraph<'_> {
    if wrap {
        paragraph.wrap(Wrap { trim: false })
    } else {
        paragraph
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn styles_from_palette(ui: UiPalette) -> (Style, MarkdownStyles) {
    let base_style = Style::default()
        .fg(ui.base_fg)
        .bg(ui.base_bg.unwrap_or(Color::Reset));

    let heading = Style::default()
        .fg(ui.accent)
        .add_modifier(Modifier::BOLD);
    let code_bg = ui.code_bg.or(ui.base_bg);
    let inline_code = Style::default()
        .fg(ui.accent)
        .bg(code_bg.unwrap_or(Color::Reset));
    let muted = Style::default().fg(ui.muted);

    (
        base_style,
        MarkdownStyles {
            base: base_style,
            heading,
            link_color: ui.accent,
            inline_code,
            prefix: muted,
            rule: muted,
            code_bg,
        },
    )
}

fn cursor_line_col(rope: &Rope, cursor: usize) -> (usize, usize) {
    let cursor = cursor.min(rope.len_chars());
    let line = rope.char_to_line(cursor);
    (line, cursor - rope.line_to_char(line))
}

fn line_len_chars(rope: &Rope, line: usize) -> usize {
    if line >= rope.len_lines() {
        return 0;
    }
    let slice = rope.line(line);
    let mut len = slice.len_chars();
    if len > 0 && slice.char(len - 1) == '\n' {
        len -= 1;
        if len > 0 && slice.char(len - 1) == '\r' {
            len -= 1;
        }
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::THEME_CATALOG;
    use ratatui::buffer::Buffer;
    use ratatui::widgets::Widget;

    fn app_with_note(content: &str) -> App {
        let mut workspace = Workspace::seeded(THEME_CATALOG[1]).unwrap();
        let id = workspace.create_note("Scratch").unwrap();
        workspace.update_content(id, content.to_string());
        let mut app = App::new(workspace, Config::default());
        app.sync_cursor();
        app
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE), 20)
    }

    fn content(app: &App) -> String {
        app.workspace.selected_note().unwrap().content().to_string()
    }

    #[test]
    fn typing_writes_through_to_the_store() {
        let mut app = app_with_note("");
        press(&mut app, KeyCode::Char('i'));
        for c in "# hi".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('x'));
        assert_eq!(content(&app), "# hi\nx");

        press(&mut app, KeyCode::Backspace);
        assert_eq!(content(&app), "# hi\n");
    }

    #[test]
    fn insert_is_refused_in_preview() {
        let mut app = app_with_note("body");
        press(&mut app, KeyCode::Char('p'));
        press(&mut app, KeyCode::Char('i'));
        assert_eq!(app.mode, Mode::Normal);
        press(&mut app, KeyCode::Char('z'));
        assert_eq!(content(&app), "body");
    }

    #[test]
    fn new_note_prompt_rejects_blank_title() {
        let mut app = app_with_note("");
        let before = app.workspace.notes().len();
        press(&mut app, KeyCode::Char('n'));
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.workspace.notes().len(), before);
        assert_eq!(app.status.as_deref(), Some("Title cannot be empty"));

        press(&mut app, KeyCode::Char('n'));
        for c in "Ideas".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.workspace.notes().len(), before + 1);
        assert_eq!(content(&app), "# Ideas\n\nStart writing your note here...");
    }

    #[test]
    fn plugin_panel_toggles_in_registry_order() {
        let mut app = app_with_note("# a");
        press(&mut app, KeyCode::Char('P'));
        assert!(app.workspace.plugin_panel_open());
        press(&mut app, KeyCode::Char(' '));
        assert!(app.workspace.is_plugin_active(crate::plugin::UPPERCASE_HEADINGS));
        press(&mut app, KeyCode::Esc);
        assert!(!app.workspace.plugin_panel_open());
        let note = app.workspace.selected_note().unwrap();
        assert_eq!(app.workspace.pipeline().apply(note.content()), "# A");
        assert_eq!(content(&app), "# a");
    }

    #[test]
    fn theme_picker_escape_restores_previous_theme() {
        let mut app = app_with_note("");
        press(&mut app, KeyCode::Char('t'));
        press(&mut app, KeyCode::Down);
        assert_eq!(app.workspace.theme().name, "Solarized");
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.workspace.theme().name, "Dark");
    }

    #[test]
    fn styles_follow_theme_changes() {
        let mut app = app_with_note("");
        app.refresh_styles();
        let dark = app.base_style;
        app.workspace.set_theme(THEME_CATALOG[0]);
        app.refresh_styles();
        assert_ne!(app.base_style, dark);
    }

    #[test]
    fn vertical_motion_keeps_preferred_column() {
        let mut app = app_with_note("abcdef\nab\nabcdef");
        app.cursor_char = 5;
        app.move_cursor_vertical(1);
        assert_eq!(app.cursor_char, 7 + 2);
        app.move_cursor_vertical(1);
        assert_eq!(app.cursor_char, 10 + 5);
    }

    #[test]
    fn switching_notes_resets_cursor() {
        let mut app = app_with_note("some text");
        app.cursor_char = 4;
        press(&mut app, KeyCode::Char('k'));
        app.sync_cursor();
        assert_eq!(app.cursor_char, 0);
        assert_eq!(app.workspace.selected_note().unwrap().title(), "Features");
    }

    fn row(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width).map(|x| buf.get(x, y).symbol()).collect()
    }

    #[test]
    fn preview_text_wraps_when_enabled() {
        let area = Rect::new(0, 0, 5, 2);
        let mut buf = Buffer::empty(area);
        wrapped(Paragraph::new("hello world"), true).render(area, &mut buf);
        assert_eq!(row(&buf, 0), "hello");
        assert_eq!(row(&buf, 1), "world");

        let mut buf = Buffer::empty(area);
        wrapped(Paragraph::new("hello world"), false).render(area, &mut buf);
        assert_eq!(row(&buf, 0), "hello");
        assert_eq!(row(&buf, 1).trim(), "");
    }

    #[test]
    fn line_len_ignores_line_endings() {
        let rope = Rope::from_str("ab\r\ncd\n");
        assert_eq!(line_len_chars(&rope, 0), 2);
        assert_eq!(line_len_chars(&rope, 1), 2);
        assert_eq!(line_len_chars(&rope, 2), 0);
    }
}
