//! Page text cleanup, assembly and truncation.
//!
//! Cleanup is deliberately light: the model reads the result, not a human,
//! so only noise that costs tokens or confuses section boundaries goes.

use crate::config::PageSeparator;
use crate::output::PageText;
use once_cell::sync::Lazy;
use regex::Regex;

static MULTI_BLANK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Zero-width and other invisible characters pdfium leaks from some fonts.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
    ) || (c.is_control() && c != '\n' && c != '\t')
}

/// Normalise one page of extracted text.
///
/// * CRLF / CR → LF
/// * invisible and control characters removed (tabs and newlines kept)
/// * trailing whitespace stripped from every line
/// * runs of blank lines collapsed to one
pub fn clean_page_text(text: &str) -> String {
    let normalised = text.replace("\r\n", "\n").replace('\r', "\n");
    let visible: String = normalised.chars().filter(|c| !is_invisible(*c)).collect();

    let trimmed_lines = visible
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    MULTI_BLANK
        .replace_all(&trimmed_lines, "\n\n")
        .trim()
        .to_string()
}

/// Join pages in index order with `separator` before every page but the first.
///
/// Empty pages are kept so page markers stay aligned with page numbers.
pub fn assemble(pages: &[PageText], separator: &PageSeparator) -> String {
    let mut ordered: Vec<&PageText> = pages.iter().collect();
    ordered.sort_by_key(|p| p.index);

    let mut out = String::new();
    for (i, page) in ordered.iter().enumerate() {
        if i > 0 {
            out.push_str(&separator.render(page.index + 1));
        }
        out.push_str(&clean_page_text(&page.text));
    }
    out
}

/// Keep at most `max_chars` characters from the head of `text`.
///
/// Cuts at a char boundary and backs off to the last whitespace within the
/// final 200 characters so words are not split. Returns the kept slice and
/// whether anything was dropped.
pub fn truncate_head(text: &str, max_chars: usize) -> (&str, bool) {
    let cut = match text.char_indices().nth(max_chars) {
        None => return (text, false),
        Some((byte_idx, _)) => byte_idx,
    };

    let head = &text[..cut];
    let floor = head
        .char_indices()
        .rev()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(0);

    let end = head[floor..]
        .rfind(char::is_whitespace)
        .map(|i| floor + i)
        .filter(|&i| i > 0)
        .unwrap_or(cut);

    (text[..end].trim_end(), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_crlf_and_trailing_space() {
        assert_eq!(clean_page_text("a  \r\nb\t\r\n"), "a\nb");
    }

    #[test]
    fn collapses_blank_runs() {
        assert_eq!(clean_page_text("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn strips_invisible_chars() {
        assert_eq!(clean_page_text("Jo\u{200B}hn\u{FEFF} Doe\u{0007}"), "John Doe");
    }

    #[test]
    fn assembles_in_index_order_with_markers() {
        let pages = vec![
            PageText::new(1, "second"),
            PageText::new(0, "first"),
            PageText::new(2, ""),
        ];
        let text = assemble(&pages, &PageSeparator::Marker);
        assert_eq!(
            text,
            "first\n\n--- page 2 ---\n\nsecond\n\n--- page 3 ---\n\n"
        );
    }

    #[test]
    fn single_page_has_no_separator() {
        let text = assemble(&[PageText::new(0, " only ")], &PageSeparator::Marker);
        assert_eq!(text, "only");
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_head("hello world", 100), ("hello world", false));
    }

    #[test]
    fn truncation_keeps_head_on_word_boundary() {
        let (kept, truncated) = truncate_head("alpha beta gamma", 13);
        assert!(truncated);
        assert_eq!(kept, "alpha beta");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "ææææææææææ";
        let (kept, truncated) = truncate_head(text, 4);
        assert!(truncated);
        assert_eq!(kept, "ææææ");
    }
}
