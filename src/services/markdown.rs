//! Markdown rendering for blog posts
//!
//! Post bodies are stored as Markdown and rendered once on write. Raw HTML in
//! the source is escaped rather than passed through.
//!
//! ```
//! use learnhub::services::markdown::MarkdownRenderer;
//!
//! let html = MarkdownRenderer::new().render("# Hi\n\n<script>x</script>");
//! assert!(html.contains("<h1>Hi</h1>"));
//! assert!(!html.contains("<script>"));
//! ```

use pulldown_cmark::{html, Event, Options, Parser};

/// Markdown to HTML renderer
#[derive(Debug, Clone, Copy)]
pub struct MarkdownRenderer {
    options: Options,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    /// Renderer with tables, strikethrough, task lists and footnotes enabled
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_FOOTNOTES);
        Self { options }
    }

    /// Render Markdown to HTML, escaping any embedded HTML
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.options).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }

    /// Plain text of the first `max_chars` characters, for excerpts
    pub fn excerpt(&self, markdown: &str, max_chars: usize) -> String {
        let mut text = String::new();
        for event in Parser::new_ext(markdown, self.options) {
            match event {
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak | Event::HardBreak | Event::End(_) => text.push(' '),
                _ => {}
            }
        }

        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() <= max_chars {
            return collapsed;
        }
        let cut: String = collapsed.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let html = MarkdownRenderer::new().render("# Title\n\nSome **bold** and `code`.");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<code>code</code>"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let r = MarkdownRenderer::new();
        let block = r.render("<div onclick=\"x()\">hi</div>");
        assert!(!block.contains("<div"));
        assert!(block.contains("&lt;div"));

        let inline = r.render("text <img src=x onerror=alert(1)> more");
        assert!(!inline.contains("<img"));
    }

    #[test]
    fn test_tables_enabled() {
        let html = MarkdownRenderer::new().render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_excerpt() {
        let r = MarkdownRenderer::new();
        assert_eq!(r.excerpt("# Heading\n\nBody *text*", 100), "Heading Body text");
        assert_eq!(r.excerpt("one two three four", 7), "one two...");
        assert_eq!(r.excerpt("", 10), "");
    }
}
