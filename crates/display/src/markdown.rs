//! Markdown + syntax-highlighted rendering for TTY output (spec §4.5:
//! "Markdown+syntax-highlighted code blocks on TTY; plain/stripped on
//! non-TTY or `--output-format=plain`").
//!
//! No module in the corpus renders markdown to a terminal — `syntect` and
//! `pulldown-cmark` sit in the teacher's workspace dependency table unused
//! by anything in `crates/gateway` — so this is written directly against their
//! public APIs rather than adapted from an existing file.

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::as_24_bit_terminal_escaped;

pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let theme = ThemeSet::load_defaults().themes["base16-ocean.dark"].clone();
        Self { syntax_set, theme }
    }

    /// Render `text` for a TTY: fenced code blocks get syntax-highlighted
    /// with 24-bit ANSI escapes, everything else passes through as plain
    /// text (headings/emphasis markers stay as-is — a terminal chat
    /// transcript doesn't need bold/italic rendering to be readable).
    pub fn render(&self, text: &str) -> String {
        let mut out = String::new();
        let mut in_code_block = false;
        let mut code_buf = String::new();
        let mut lang = String::new();

        for event in Parser::new(text) {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_buf.clear();
                    lang = match kind {
                        CodeBlockKind::Fenced(info) => info.split_whitespace().next().unwrap_or("").to_string(),
                        CodeBlockKind::Indented => String::new(),
                    };
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    out.push_str(&self.highlight(&code_buf, &lang));
                }
                Event::Text(t) | Event::Code(t) => {
                    if in_code_block {
                        code_buf.push_str(&t);
                    } else {
                        out.push_str(&t);
                    }
                }
                Event::SoftBreak | Event::HardBreak => out.push('\n'),
                Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Heading(_)) => out.push('\n'),
                _ => {}
            }
        }
        out
    }

    fn highlight(&self, code: &str, lang: &str) -> String {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());
        let mut highlighter = HighlightLines::new(syntax, &self.theme);
        let mut out = String::new();
        for line in code.lines() {
            let Ok(ranges) = highlighter.highlight_line(line, &self.syntax_set) else { continue };
            out.push_str(&as_24_bit_terminal_escaped(&ranges[..], false));
            out.push_str("\x1b[0m\n");
        }
        out
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip markdown down to plain text for non-TTY/`--output-format=plain`
/// output: fenced code blocks keep their contents, all other formatting
/// markup is dropped.
pub fn strip_markdown(text: &str) -> String {
    let mut out = String::new();
    for event in Parser::new(text) {
        match event {
            Event::Text(t) | Event::Code(t) => out.push_str(&t),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Heading(_)) | Event::End(TagEnd::CodeBlock) => out.push('\n'),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_markdown_drops_emphasis_markers() {
        let out = strip_markdown("**bold** and _italic_ text");
        assert!(!out.contains('*'));
        assert!(out.contains("bold"));
        assert!(out.contains("italic"));
    }

    #[test]
    fn strip_markdown_keeps_code_block_contents() {
        let out = strip_markdown("```rust\nfn main() {}\n```");
        assert!(out.contains("fn main()"));
    }

    #[test]
    fn highlighted_render_contains_ansi_escape_for_code() {
        let renderer = MarkdownRenderer::new();
        let out = renderer.render("```rust\nfn main() {}\n```");
        assert!(out.contains("\x1b["));
    }
}
