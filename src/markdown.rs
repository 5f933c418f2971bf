use anyhow::Result;
use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use std::borrow::Cow;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use unicode_width::UnicodeWidthStr;

/// Boundary to whatever turns markdown into something displayable.
///
/// Implementations may fail; callers are expected to contain the error and
/// keep showing the source text.
pub trait MarkdownRenderer {
    type Output;

    fn render(&self, markdown: &str) -> Result<Self::Output>;
}

/// Renders to an HTML fragment. Output is not sanitized.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlRenderer;

impl MarkdownRenderer for HtmlRenderer {
    type Output = String;

    fn render(&self, markdown: &str) -> Result<String> {
        let parser = Parser::new_ext(markdown, parser_options());
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MarkdownStyles {
    pub base: Style,
    pub heading: Style,
    pub link_color: Color,
    pub inline_code: Style,
    pub prefix: Style,
    pub rule: Style,
    pub code_bg: Option<Color>,
}

/// Renders to styled terminal lines, highlighting fenced code with syntect.
pub struct TerminalRenderer<'a> {
    pub syntax_set: &'a SyntaxSet,
    pub theme: &'a Theme,
    pub styles: &'a MarkdownStyles,
    pub tab_width: usize,
}

impl MarkdownRenderer for TerminalRenderer<'_> {
    type Output = Vec<Line<'static>>;

    fn render(&self, markdown: &str) -> Result<Vec<Line<'static>>> {
        render_lines(
            markdown,
            self.syntax_set,
            self.theme,
            self.styles,
            self.tab_width,
        )
    }
}

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    options
}

pub fn render_lines(
    input: &str,
    syntax_set: &SyntaxSet,
    theme: &Theme,
    styles: &MarkdownStyles,
    tab_width: usize,
) -> Result<Vec<Line<'static>>> {
    let normalized = normalize_line_endings(input);
    let parser = Parser::new_ext(normalized.as_ref(), parser_options());

    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut line = LineBuilder::new();
    let mut heading: Option<(u8, String)> = None;
    let mut code_block: Option<CodeBlock> = None;
    let mut list_stack: Vec<ListKind> = Vec::new();
    let mut item_prefix: Option<String> = None;
    let mut quote_depth: usize = 0;
    let mut inline = InlineState::new(styles.base, styles.link_color);

    for event in parser {
        match event {
            Event::Start(tag) => match tag {
                Tag::Paragraph => {
                    line.ensure_prefix(&prefix(quote_depth, item_prefix.as_deref()), styles.prefix);
                }
                Tag::Heading { level, .. } => {
                    line.flush_into(&mut lines);
                    heading = Some((level as u8, String::new()));
                }
                Tag::CodeBlock(kind) => {
                    line.flush_into(&mut lines);
                    code_block = Some(CodeBlock::new(kind));
                }
                Tag::List(start) => list_stack.push(ListKind::from(start)),
                Tag::Item => {
                    line.flush_into(&mut lines);
                    item_prefix = Some(next_item_prefix(&mut list_stack));
                    line.ensure_prefix(&prefix(quote_depth, item_prefix.as_deref()), styles.prefix);
                }
                Tag::BlockQuote => {
                    quote_depth += 1;
                    line.ensure_prefix(&prefix(quote_depth, item_prefix.as_deref()), styles.prefix);
                }
                Tag::Emphasis => inline.italic += 1,
                Tag::Strong => inline.bold += 1,
                Tag::Strikethrough => inline.strike += 1,
                Tag::Link { .. } => inline.link += 1,
                _ => {}
            },
            Event::End(tag) => match tag {
                TagEnd::Paragraph => {
                    line.flush_into(&mut lines);
                    if item_prefix.is_none() {
                        lines.push(Line::from(""));
                    }
                }
                TagEnd::Heading(_) => {
                    if let Some((level, text)) = heading.take() {
                        push_heading(level, text.trim(), styles, &mut lines);
                    }
                }
                TagEnd::CodeBlock => {
                    if let Some(block) = code_block.take() {
                        push_code_block(&block, syntax_set, theme, styles, &mut lines);
                        lines.push(Line::from(""));
                    }
                }
                TagEnd::List(_) => {
                    list_stack.pop();
                    line.flush_into(&mut lines);
                    if list_stack.is_empty() {
                        lines.push(Line::from(""));
                    }
                }
                TagEnd::Item => {
                    item_prefix = None;
                    line.flush_into(&mut lines);
                }
                TagEnd::BlockQuote => {
                    quote_depth = quote_depth.saturating_sub(1);
                    line.flush_into(&mut lines);
                }
                TagEnd::Emphasis => inline.italic = inline.italic.saturating_sub(1),
                TagEnd::Strong => inline.bold = inline.bold.saturating_sub(1),
                TagEnd::Strikethrough => inline.strike = inline.strike.saturating_sub(1),
                TagEnd::Link => inline.link = inline.link.saturating_sub(1),
                _ => {}
            },
            Event::Text(text) => {
                if let Some((_, h)) = heading.as_mut() {
                    h.push_str(&text);
                } else if let Some(block) = code_block.as_mut() {
                    block.text.push_str(&text);
                } else {
                    line.ensure_prefix(&prefix(quote_depth, item_prefix.as_deref()), styles.prefix);
                    line.push_text(&text, inline.style(), tab_width);
                }
            }
            Event::Code(text) => {
                if let Some((_, h)) = heading.as_mut() {
                    h.push_str(&text);
                } else {
                    line.ensure_prefix(&prefix(quote_depth, item_prefix.as_deref()), styles.prefix);
                    line.push_text(&text, styles.inline_code, tab_width);
                }
            }
            Event::SoftBreak => {
                if let Some((_, h)) = heading.as_mut() {
                    h.push(' ');
                } else {
                    line.push_text(" ", inline.style(), tab_width);
                }
            }
            Event::HardBreak => line.flush_into(&mut lines),
            Event::Rule => {
                line.flush_into(&mut lines);
                lines.push(Line::from(Span::styled("─".repeat(48), styles.rule)));
                lines.push(Line::from(""));
            }
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                line.push_text(marker, styles.prefix, tab_width);
            }
            _ => {}
        }
    }

    line.flush_into(&mut lines);
    while lines.last().is_some_and(|l| l.width() == 0) {
        lines.pop();
    }
    Ok(lines)
}

fn normalize_line_endings(input: &str) -> Cow<'_, str> {
    if input.contains('\r') {
        Cow::Owned(input.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(input)
    }
}

fn push_heading(level: u8, text: &str, styles: &MarkdownStyles, lines: &mut Vec<Line<'static>>) {
    lines.push(Line::from(Span::styled(text.to_string(), styles.heading)));
    if level <= 2 {
        let ch = if level == 1 { '═' } else { '─' };
        let width = UnicodeWidthStr::width(text).clamp(4, 48);
        lines.push(Line::from(Span::styled(ch.to_string().repeat(width), styles.rule)));
    }
    lines.push(Line::from(""));
}

fn push_code_block(
    block: &CodeBlock,
    syntax_set: &SyntaxSet,
    theme: &Theme,
    styles: &MarkdownStyles,
    lines: &mut Vec<Line<'static>>,
) {
    let syntax = block
        .language
        .as_deref()
        .and_then(|lang| syntax_set.find_syntax_by_token(lang))
        .unwrap_or_else(|| syntax_set.find_syntax_plain_text());
    let mut highlighter = HighlightLines::new(syntax, theme);
    let gutter = styles.prefix;

    if let Some(lang) = block.language.as_deref() {
        lines.push(Line::from(Span::styled(format!("┌ {lang}"), gutter)));
    }
    for src in LinesWithEndings::from(&block.text) {
        let ranges = match highlighter.highlight_line(src, syntax_set) {
            Ok(r) => r,
            Err(_) => vec![(syntect::highlighting::Style::default(), src)],
        };
        let mut spans = vec![Span::styled("│ ", gutter)];
        for (style, text) in ranges {
            let text = text.trim_end_matches('\n');
            if !text.is_empty() {
                spans.push(Span::styled(text.to_string(), syntect_to_ratatui(style, styles.code_bg)));
            }
        }
        lines.push(Line::from(spans));
    }
}

pub fn syntect_to_ratatui(style: syntect::highlighting::Style, bg: Option<Color>) -> Style {
    let mut out = Style::default()
        .fg(Color::Rgb(style.foreground.r, style.foreground.g, style.foreground.b));
    if let Some(bg) = bg {
        out = out.bg(bg);
    }
    if style.font_style.contains(FontStyle::BOLD) {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        out = out.add_modifier(Modifier::ITALIC);
    }
    if style.font_style.contains(FontStyle::UNDERLINE) {
        out = out.add_modifier(Modifier::UNDERLINED);
    }
    out
}

struct InlineState {
    base: Style,
    link_color: Color,
    bold: u8,
    italic: u8,
    strike: u8,
    link: u8,
}

impl InlineState {
    fn new(base: Style, link_color: Color) -> Self {
        Self {
            base,
            link_color,
            bold: 0,
            italic: 0,
            strike: 0,
            link: 0,
        }
    }

    fn style(&self) -> Style {
        let mut style = self.base;
        if self.link > 0 {
            style = style.fg(self.link_color).add_modifier(Modifier::UNDERLINED);
        }
        if self.bold > 0 {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.italic > 0 {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if self.strike > 0 {
            style = style.add_modifier(Modifier::CROSSED_OUT);
        }
        style
    }
}

struct LineBuilder {
    spans: Vec<Span<'static>>,
}

impl LineBuilder {
    fn new() -> Self {
        Self { spans: Vec::new() }
    }

    fn ensure_prefix(&mut self, prefix: &str, style: Style) {
        if self.spans.is_empty() && !prefix.is_empty() {
            self.spans.push(Span::styled(prefix.to_string(), style));
        }
    }

    fn push_text(&mut self, text: &str, style: Style, tab_width: usize) {
        self.spans.push(Span::styled(expand_tabs(text, tab_width), style));
    }

    fn flush_into(&mut self, lines: &mut Vec<Line<'static>>) {
        if !self.spans.is_empty() {
            lines.push(Line::from(std::mem::take(&mut self.spans)));
        }
    }
}

fn expand_tabs(text: &str, tab_width: usize) -> String {
    text.replace('\t', &" ".repeat(tab_width.max(1)))
}

fn prefix(quote_depth: usize, item: Option<&str>) -> String {
    let mut out = "│ ".repeat(quote_depth);
    if let Some(item) = item {
        out.push_str(item);
    }
    out
}

enum ListKind {
    Bullet,
    Ordered { next: u64 },
}

impl ListKind {
    fn from(start: Option<u64>) -> Self {
        match start {
            Some(num) => Self::Ordered { next: num },
            None => Self::Bullet,
        }
    }
}

fn next_item_prefix(stack: &mut [ListKind]) -> String {
    let depth = stack.len().max(1);
    let indent = "  ".repeat(depth - 1);
    let marker = match stack.last_mut() {
        Some(ListKind::Ordered { next }) => {
            let current = *next;
            *next = next.saturating_add(1);
            format!("{current}. ")
        }
        Some(ListKind::Bullet) if depth % 2 == 0 => "◦ ".to_string(),
        _ => "• ".to_string(),
    };
    format!("{indent}{marker}")
}

struct CodeBlock {
    language: Option<String>,
    text: String,
}

impl CodeBlock {
    fn new(kind: CodeBlockKind) -> Self {
        let language = match kind {
            CodeBlockKind::Fenced(lang) => {
                let lang = lang.trim();
                let lang = lang.strip_prefix("language-").unwrap_or(lang);
                (!lang.is_empty()).then(|| lang.to_string())
            }
            CodeBlockKind::Indented => None,
        };
        Self {
            language,
            text: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syntect::highlighting::ThemeSet;

    fn plain(lines: &[Line<'static>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn test_styles() -> MarkdownStyles {
        MarkdownStyles {
            base: Style::default().fg(Color::White),
            heading: Style::default().add_modifier(Modifier::BOLD),
            link_color: Color::Blue,
            inline_code: Style::default().fg(Color::Yellow),
            prefix: Style::default(),
            rule: Style::default(),
            code_bg: None,
        }
    }

    fn render(markdown: &str) -> Vec<Line<'static>> {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let themes = ThemeSet::load_defaults();
        let theme = &themes.themes["base16-ocean.dark"];
        let styles = test_styles();
        let renderer = TerminalRenderer {
            syntax_set: &syntax_set,
            theme,
            styles: &styles,
            tab_width: 4,
        };
        renderer.render(markdown).expect("render")
    }

    #[test]
    fn html_renderer_produces_heading_and_paragraph() {
        let html = HtmlRenderer.render("# HELLO\nworld").unwrap();
        assert_eq!(html, "<h1>HELLO</h1>\n<p>world</p>\n");
    }

    #[test]
    fn html_renderer_passes_raw_html_through() {
        let html = HtmlRenderer.render("<b>x</b>").unwrap();
        assert!(html.contains("<b>x</b>"));
    }

    #[test]
    fn normalize_line_endings_borrows_lf_input() {
        assert!(matches!(normalize_line_endings("a\nb"), Cow::Borrowed(_)));
        assert_eq!(normalize_line_endings("a\r\nb\rc").as_ref(), "a\nb\nc");
    }

    #[test]
    fn terminal_renderer_underlines_top_level_heading() {
        let lines = plain(&render("# Title\n\nbody text"));
        assert_eq!(lines[0], "Title");
        assert!(lines[1].starts_with('═'));
        assert!(lines.iter().any(|l| l == "body text"));
    }

    #[test]
    fn terminal_renderer_prefixes_list_items_and_quotes() {
        let lines = plain(&render("- one\n- two\n\n1. first\n\n> quoted"));
        assert!(lines.contains(&"• one".to_string()));
        assert!(lines.contains(&"• two".to_string()));
        assert!(lines.contains(&"1. first".to_string()));
        assert!(lines.contains(&"│ quoted".to_string()));
    }

    #[test]
    fn terminal_renderer_styles_inline_markup() {
        let lines = render("some **bold** and `code`");
        let spans = &lines[0].spans;
        assert!(spans
            .iter()
            .any(|s| s.content == "bold" && s.style.add_modifier.contains(Modifier::BOLD)));
        assert!(spans
            .iter()
            .any(|s| s.content == "code" && s.style.fg == Some(Color::Yellow)));
    }

    #[test]
    fn terminal_renderer_frames_fenced_code() {
        let lines = plain(&render("```rust\nfn main() {}\n```"));
        assert_eq!(lines[0], "┌ rust");
        assert_eq!(lines[1], "│ fn main() {}");
    }

    #[test]
    fn terminal_renderer_handles_empty_input() {
        assert!(render("").is_empty());
    }
}
