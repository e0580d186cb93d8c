//! Markdown rendering for message display.
//!
//! Messages travel as raw Markdown source; rendering happens only at
//! display time. Output is deterministic for identical input, and plain
//! text containing markup characters is escaped rather than interpreted as
//! HTML.

use pulldown_cmark::{html, Event, Options, Parser};

/// Parser options used for every render.
fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options
}

/// Render Markdown source to an HTML fragment.
///
/// Raw HTML in the source is demoted to text, so it ends up escaped in the
/// output instead of injected into it.
pub fn render_html(source: &str) -> String {
    let parser = Parser::new_ext(source, options()).map(|event| match event {
        Event::Html(raw) => Event::Text(raw),
        Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::with_capacity(source.len() * 2);
    html::push_html(&mut out, parser);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_formatting() {
        let out = render_html("**bold** and _italic_ and `code`");
        assert!(out.contains("<strong>bold</strong>"));
        assert!(out.contains("<em>italic</em>"));
        assert!(out.contains("<code>code</code>"));
    }

    #[test]
    fn test_deterministic() {
        let source = "# Hello\n\nSome *markdown* with a [link](https://example.com).";
        assert_eq!(render_html(source), render_html(source));
    }

    #[test]
    fn test_plain_text_script_is_escaped() {
        let out = render_html("hello <script>alert(1)</script> world");
        assert!(!out.contains("<script>"));
        assert!(out.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_strikethrough_enabled() {
        let out = render_html("~~gone~~");
        assert!(out.contains("<del>gone</del>"));
    }
}
