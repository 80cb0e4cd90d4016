use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::layout::Alignment;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};

use crate::config::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub text: Color,
    pub heading: Color,
    pub subheading: Color,
    pub accent: Color,
    pub quote: Color,
    pub code: Color,
    pub muted: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                text: Color::Rgb(230, 237, 243),
                heading: Color::Rgb(0, 240, 255),
                subheading: Color::Rgb(139, 148, 158),
                accent: Color::Rgb(0, 240, 255),
                quote: Color::Rgb(139, 148, 158),
                code: Color::Rgb(166, 227, 161),
                muted: Color::Rgb(139, 148, 158),
            },
            Theme::Light => Self {
                text: Color::Rgb(10, 10, 10),
                heading: Color::Rgb(255, 51, 51),
                subheading: Color::Rgb(34, 34, 34),
                accent: Color::Rgb(255, 51, 51),
                quote: Color::Rgb(68, 68, 68),
                code: Color::Rgb(0, 110, 60),
                muted: Color::Rgb(17, 17, 17),
            },
        }
    }
}

/// Converts post bodies (markdown with the occasional raw HTML) into styled
/// terminal text.
pub struct Renderer {
    options: Options,
    palette: Palette,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(Palette::for_theme(Theme::default()))
    }
}

impl Renderer {
    pub fn new(palette: Palette) -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_FOOTNOTES);
        Self { options, palette }
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    pub fn render(&self, input: &str) -> Text<'static> {
        let parser = Parser::new_ext(input, self.options);
        let mut writer = MarkdownWriter::new(self.palette);
        writer.render(parser);
        writer.into_text()
    }
}

#[derive(Clone, Copy, Default)]
struct Inline {
    strong: bool,
    emphasis: bool,
    strike: bool,
}

struct MarkdownWriter {
    palette: Palette,
    blocks: Vec<Block>,
    spans: Vec<Span<'static>>,
    inline: Inline,
    list_stack: Vec<Option<u64>>,
    item_marker: Option<(usize, String)>,
    quote_depth: usize,
    heading: Option<u8>,
    code: Option<CodeBlock>,
    link_target: Option<String>,
    image_alt: Option<String>,
}

struct CodeBlock {
    language: Option<String>,
    body: String,
}

enum Block {
    Paragraph(Vec<Span<'static>>),
    Heading(u8, Vec<Span<'static>>),
    Item {
        indent: usize,
        marker: String,
        spans: Vec<Span<'static>>,
    },
    Quote(usize, Vec<Span<'static>>),
    Code(CodeBlock),
    Rule,
    Gap,
}

impl MarkdownWriter {
    fn new(palette: Palette) -> Self {
        Self {
            palette,
            blocks: Vec::new(),
            spans: Vec::new(),
            inline: Inline::default(),
            list_stack: Vec::new(),
            item_marker: None,
            quote_depth: 0,
            heading: None,
            code: None,
            link_target: None,
            image_alt: None,
        }
    }

    fn render<'a, I>(&mut self, parser: I)
    where
        I: Iterator<Item = Event<'a>>,
    {
        for event in parser {
            match event {
                Event::Start(tag) => self.start_tag(tag),
                Event::End(tag) => self.end_tag(tag),
                Event::Text(text) => self.text(text),
                Event::Code(code) => {
                    let style = Style::default().fg(self.palette.code);
                    self.spans.push(Span::styled(code.into_string(), style));
                }
                Event::Html(html) => {
                    let stripped = strip_tags(&html);
                    if !stripped.trim().is_empty() {
                        self.flush();
                        self.spans.push(Span::raw(stripped.trim().to_string()));
                        self.flush();
                    }
                }
                Event::InlineHtml(html) => {
                    if html.trim_start().starts_with("<br") {
                        self.flush();
                    }
                }
                Event::FootnoteReference(name) => self.push_text(format!("[{name}]")),
                Event::HardBreak => self.flush(),
                Event::SoftBreak => self.push_text(" ".to_string()),
                Event::Rule => {
                    self.flush();
                    self.blocks.push(Block::Rule);
                }
                Event::TaskListMarker(done) => {
                    self.push_text(if done { "[x] " } else { "[ ] " }.to_string());
                }
            }
        }
        self.flush();
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.flush(),
            Tag::Heading { level, .. } => {
                self.flush();
                self.heading = Some(level_to_u8(level));
            }
            Tag::BlockQuote => {
                self.flush();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                let language = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.into_string()),
                    _ => None,
                };
                self.code = Some(CodeBlock {
                    language,
                    body: String::new(),
                });
            }
            Tag::List(start) => {
                self.flush();
                self.list_stack.push(start);
            }
            Tag::Item => {
                self.flush();
                let indent = self.list_stack.len().saturating_sub(1);
                let marker = match self.list_stack.last().copied().flatten() {
                    Some(index) => format!("{index}."),
                    None => "•".to_string(),
                };
                self.item_marker = Some((indent, marker));
            }
            Tag::Emphasis => self.inline.emphasis = true,
            Tag::Strong => self.inline.strong = true,
            Tag::Strikethrough => self.inline.strike = true,
            Tag::Link { dest_url, .. } => self.link_target = Some(dest_url.into_string()),
            Tag::Image { .. } => self.image_alt = Some(String::new()),
            Tag::TableCell => self.push_text("| ".to_string()),
            Tag::Table(_) | Tag::TableHead | Tag::TableRow => {}
            Tag::FootnoteDefinition(_) | Tag::HtmlBlock | Tag::MetadataBlock(_) => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush();
                if self.item_marker.is_none() && self.list_stack.is_empty() {
                    self.blocks.push(Block::Gap);
                }
            }
            TagEnd::Heading(_) => {
                self.flush();
                self.heading = None;
                self.blocks.push(Block::Gap);
            }
            TagEnd::BlockQuote => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blocks.push(Block::Gap);
            }
            TagEnd::CodeBlock => {
                if let Some(code) = self.code.take() {
                    self.blocks.push(Block::Code(code));
                    self.blocks.push(Block::Gap);
                }
            }
            TagEnd::List(_) => {
                self.flush();
                self.list_stack.pop();
                if self.list_stack.is_empty() {
                    self.blocks.push(Block::Gap);
                }
            }
            TagEnd::Item => {
                self.flush();
                if let Some(Some(index)) = self.list_stack.last_mut() {
                    *index += 1;
                }
                self.item_marker = None;
            }
            TagEnd::Emphasis => self.inline.emphasis = false,
            TagEnd::Strong => self.inline.strong = false,
            TagEnd::Strikethrough => self.inline.strike = false,
            TagEnd::Link => {
                if let Some(target) = self.link_target.take() {
                    let style = Style::default().fg(self.palette.muted);
                    self.spans.push(Span::styled(format!(" <{target}>"), style));
                }
            }
            TagEnd::Image => {
                if let Some(alt) = self.image_alt.take() {
                    let label = if alt.trim().is_empty() {
                        "[image]".to_string()
                    } else {
                        format!("[image: {}]", alt.trim())
                    };
                    let style = Style::default().fg(self.palette.muted);
                    self.spans.push(Span::styled(label, style));
                }
            }
            TagEnd::TableRow | TagEnd::TableHead => self.flush(),
            _ => {}
        }
    }

    fn text(&mut self, text: CowStr<'_>) {
        if let Some(code) = self.code.as_mut() {
            code.body.push_str(&text);
        } else if let Some(alt) = self.image_alt.as_mut() {
            alt.push_str(&text);
        } else {
            self.push_text(text.into_string());
        }
    }

    fn push_text(&mut self, text: String) {
        let mut style = Style::default();
        if self.link_target.is_some() {
            style = style
                .fg(self.palette.accent)
                .add_modifier(Modifier::UNDERLINED);
        }
        if self.inline.strong {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.inline.emphasis {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if self.inline.strike {
            style = style.add_modifier(Modifier::CROSSED_OUT);
        }
        self.spans.push(Span::styled(text, style));
    }

    fn flush(&mut self) {
        if self.spans.iter().all(|span| span.content.trim().is_empty()) {
            self.spans.clear();
            return;
        }
        let mut spans = std::mem::take(&mut self.spans);
        if let Some(first) = spans.first_mut() {
            first.content = first.content.trim_start().to_string().into();
        }

        let block = if let Some(level) = self.heading {
            Block::Heading(level, spans)
        } else if let Some((indent, marker)) = self.item_marker.as_mut() {
            let block = Block::Item {
                indent: *indent,
                marker: marker.clone(),
                spans,
            };
            // continuation paragraphs inside the same item get no marker
            *marker = " ".repeat(marker.chars().count());
            block
        } else if self.quote_depth > 0 {
            Block::Quote(self.quote_depth, spans)
        } else {
            Block::Paragraph(spans)
        };
        self.blocks.push(block);
    }

    fn into_text(mut self) -> Text<'static> {
        while matches!(self.blocks.last(), Some(Block::Gap)) {
            self.blocks.pop();
        }

        let palette = self.palette;
        let mut lines: Vec<Line<'static>> = Vec::with_capacity(self.blocks.len());
        for block in self.blocks {
            match block {
                Block::Paragraph(spans) => lines.push(Line::from(spans)),
                Block::Heading(level, spans) => {
                    let style = heading_style(&palette, level);
                    lines.push(Line::from(restyle(spans, style)));
                }
                Block::Item {
                    indent,
                    marker,
                    spans,
                } => {
                    let mut row = vec![
                        Span::raw("  ".repeat(indent)),
                        Span::styled(format!("{marker} "), Style::default().fg(palette.accent)),
                    ];
                    row.extend(spans);
                    lines.push(Line::from(row));
                }
                Block::Quote(depth, spans) => {
                    let style = Style::default().fg(palette.quote);
                    let mut row = vec![Span::styled(format!("{} ", "│".repeat(depth)), style)];
                    row.extend(restyle(spans, style));
                    lines.push(Line::from(row));
                }
                Block::Code(code) => {
                    let fence = match code.language {
                        Some(lang) => format!("```{lang}"),
                        None => "```".to_string(),
                    };
                    let muted = Style::default().fg(palette.muted);
                    lines.push(Line::from(Span::styled(fence, muted)));
                    let body = code.body.strip_suffix('\n').unwrap_or(&code.body);
                    for raw in body.split('\n') {
                        lines.push(Line::from(Span::styled(
                            raw.to_string(),
                            Style::default().fg(palette.code),
                        )));
                    }
                    lines.push(Line::from(Span::styled("```".to_string(), muted)));
                }
                Block::Rule => lines.push(Line::from(Span::styled(
                    "―".repeat(20),
                    Style::default().fg(palette.muted),
                ))),
                Block::Gap => lines.push(Line::default()),
            }
        }

        if lines.is_empty() {
            lines.push(Line::from(Span::raw("")));
        }

        Text {
            lines,
            alignment: Some(Alignment::Left),
            style: Style::default().fg(palette.text),
        }
    }
}

fn restyle(spans: Vec<Span<'static>>, base: Style) -> Vec<Span<'static>> {
    spans
        .into_iter()
        .map(|span| {
            let style = base.patch(span.style);
            Span::styled(span.content, style)
        })
        .collect()
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

fn heading_style(palette: &Palette, level: u8) -> Style {
    match level {
        1 => Style::default()
            .fg(palette.heading)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        2 => Style::default()
            .fg(palette.heading)
            .add_modifier(Modifier::BOLD),
        3 => Style::default()
            .fg(palette.subheading)
            .add_modifier(Modifier::BOLD),
        _ => Style::default().fg(palette.subheading),
    }
}

fn level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
