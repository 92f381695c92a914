//! Plain text to minimal XHTML: paragraphs on blank lines, `<br/>` on single newlines.

use regex::Regex;
use std::sync::LazyLock;

static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\n+").unwrap());

/// Placeholder paragraph so that no chapter body renders as an empty element.
pub const EMPTY_PARAGRAPH: &str = "<p>&#160;</p>";

/// Escape the five XML-reserved characters.
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Render a chapter body as a sequence of `<p>` elements.
///
/// Text is escaped first. Blank-line separated blocks become paragraphs; newlines inside a
/// block become `<br/>`. Blank input yields [EMPTY_PARAGRAPH].
pub fn render_paragraphs(text: &str) -> String {
    let escaped = xml_escape(&text.replace("\r\n", "\n"));
    let paragraphs: Vec<String> = PARAGRAPH_BREAK
        .split(&escaped)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", p.replace('\n', "<br/>")))
        .collect();
    if !paragraphs.is_empty() {
        return paragraphs.join("\n");
    }
    let whole = escaped.trim();
    if whole.is_empty() {
        EMPTY_PARAGRAPH.to_string()
    } else {
        format!("<p>{}</p>", whole.replace('\n', "<br/>"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_separate_paragraphs() {
        assert_eq!(
            render_paragraphs("First.\n\nSecond.\n\n\n\nThird."),
            "<p>First.</p>\n<p>Second.</p>\n<p>Third.</p>"
        );
    }

    #[test]
    fn single_newlines_become_line_breaks() {
        assert_eq!(
            render_paragraphs("line one\nline two\n\nnext"),
            "<p>line one<br/>line two</p>\n<p>next</p>"
        );
    }

    #[test]
    fn text_without_blank_lines_is_one_paragraph() {
        assert_eq!(render_paragraphs("a\nb\nc"), "<p>a<br/>b<br/>c</p>");
    }

    #[test]
    fn reserved_characters_are_escaped() {
        let html = render_paragraphs(r#"1 < 2 & "quotes" 'too' > 0"#);
        assert_eq!(
            html,
            "<p>1 &lt; 2 &amp; &quot;quotes&quot; &apos;too&apos; &gt; 0</p>"
        );
        assert!(!html.contains("< 2"));
    }

    #[test]
    fn blank_body_renders_placeholder_paragraph() {
        assert_eq!(render_paragraphs(""), EMPTY_PARAGRAPH);
        assert_eq!(render_paragraphs("  \n\n \t "), EMPTY_PARAGRAPH);
    }

    #[test]
    fn crlf_is_treated_as_newline() {
        assert_eq!(render_paragraphs("a\r\n\r\nb"), "<p>a</p>\n<p>b</p>");
    }
}
