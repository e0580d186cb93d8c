//! Markdown to styled terminal lines.
//!
//! The thread view renders each message's Markdown source into ratatui
//! lines. Raw HTML is shown as text, matching the core renderer's escaping
//! policy.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

/// Render Markdown source into terminal lines.
pub fn render_lines(source: &str) -> Vec<Line<'static>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut renderer = LineRenderer::default();
    for event in Parser::new_ext(source, options) {
        renderer.handle(event);
    }
    renderer.finish()
}

#[derive(Default)]
struct LineRenderer {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    bold: u8,
    italic: u8,
    strike: u8,
    heading: bool,
    quote_depth: u8,
    in_code_block: bool,
    list_depth: u8,
    link_url: Option<String>,
}

impl LineRenderer {
    fn handle(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                self.push_span(code.to_string(), self.style().fg(Color::Yellow));
            }
            // Raw HTML is not interpreted; show it as text.
            Event::Html(raw) | Event::InlineHtml(raw) => self.text(&raw),
            Event::SoftBreak | Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push(Line::from(Span::styled(
                    "\u{2500}".repeat(30),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Paragraph => self.flush(),
            Tag::Heading { .. } => {
                self.flush();
                self.heading = true;
            }
            Tag::BlockQuote(_) => {
                self.flush();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                self.in_code_block = true;
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.lines.push(Line::from(Span::styled(
                            format!("[{}]", lang),
                            Style::default().fg(Color::DarkGray),
                        )));
                    }
                }
            }
            Tag::List(_) => self.list_depth += 1,
            Tag::Item => {
                self.flush();
                let indent = "  ".repeat(self.list_depth.saturating_sub(1) as usize);
                self.current
                    .push(Span::raw(format!("{}\u{2022} ", indent)));
            }
            Tag::Emphasis => self.italic += 1,
            Tag::Strong => self.bold += 1,
            Tag::Strikethrough => self.strike += 1,
            Tag::Link { dest_url, .. } => self.link_url = Some(dest_url.to_string()),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Item => self.flush(),
            TagEnd::Heading(_) => {
                self.heading = false;
                self.flush();
            }
            TagEnd::BlockQuote(_) => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.flush();
            }
            TagEnd::List(_) => self.list_depth = self.list_depth.saturating_sub(1),
            TagEnd::Emphasis => self.italic = self.italic.saturating_sub(1),
            TagEnd::Strong => self.bold = self.bold.saturating_sub(1),
            TagEnd::Strikethrough => self.strike = self.strike.saturating_sub(1),
            TagEnd::Link => {
                if let Some(url) = self.link_url.take() {
                    self.push_span(
                        format!(" ({})", url),
                        Style::default().fg(Color::DarkGray),
                    );
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_code_block {
            for line in text.lines() {
                self.lines.push(Line::from(Span::styled(
                    format!("  {}", line),
                    Style::default().fg(Color::Yellow),
                )));
            }
            return;
        }
        let style = self.style();
        self.push_span(text.to_string(), style);
    }

    fn push_span(&mut self, content: String, style: Style) {
        if self.current.is_empty() && self.quote_depth > 0 {
            self.current.push(Span::styled(
                "\u{2502} ".repeat(self.quote_depth as usize),
                Style::default().fg(Color::DarkGray),
            ));
        }
        self.current.push(Span::styled(content, style));
    }

    fn style(&self) -> Style {
        let mut style = Style::default();
        if self.heading {
            style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
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
        if self.link_url.is_some() {
            style = style.fg(Color::Blue).add_modifier(Modifier::UNDERLINED);
        }
        style
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            let spans = std::mem::take(&mut self.current);
            self.lines.push(Line::from(spans));
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        if self.lines.is_empty() {
            self.lines.push(Line::default());
        }
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_text(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_plain_paragraph() {
        let lines = render_lines("hello world");
        assert_eq!(plain_text(&lines), vec!["hello world"]);
    }

    #[test]
    fn test_bold_span_styled() {
        let lines = render_lines("a **bold** word");
        let bold_span = lines[0]
            .spans
            .iter()
            .find(|s| s.content == "bold")
            .expect("bold span");
        assert!(bold_span.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_list_items_get_bullets() {
        let lines = render_lines("- one\n- two");
        let text = plain_text(&lines);
        assert_eq!(text, vec!["\u{2022} one", "\u{2022} two"]);
    }

    #[test]
    fn test_code_block_lines() {
        let lines = render_lines("```rust\nlet x = 1;\n```");
        let text = plain_text(&lines);
        assert!(text.contains(&"[rust]".to_string()));
        assert!(text.contains(&"  let x = 1;".to_string()));
    }

    #[test]
    fn test_html_is_not_interpreted() {
        let lines = render_lines("before <script>alert(1)</script> after");
        let joined = plain_text(&lines).join("\n");
        assert!(joined.contains("<script>"));
        // It appears as visible text, not markup that vanished.
        assert!(joined.contains("before"));
        assert!(joined.contains("after"));
    }

    #[test]
    fn test_never_empty() {
        assert_eq!(render_lines("").len(), 1);
    }
}
