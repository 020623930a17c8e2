use std::sync::LazyLock;

use regex::Regex;

static CITATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\d+\]").expect("valid regex"));
static EMPTY_BRACKETS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\s*\]").expect("valid regex"));
static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +").expect("valid regex"));
static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" +([.,!?;:])").expect("valid regex"));

/// Removes search-citation markers such as `[1]` and tidies the spacing
/// they leave behind. Newlines are preserved.
pub fn strip_citations(text: &str) -> String {
    let text = CITATION.replace_all(text, "");
    let text = EMPTY_BRACKETS.replace_all(&text, "");
    let text = SPACE_RUN.replace_all(&text, " ");
    let text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_markers_without_leaving_gaps() {
        assert_eq!(
            strip_citations("Rust is fast [1][2]. It is also safe [3], mostly [ ]!"),
            "Rust is fast. It is also safe, mostly!"
        );
    }

    #[test]
    fn keeps_newlines_and_non_numeric_brackets() {
        assert_eq!(
            strip_citations("Line one [12].\nLine [two]  here"),
            "Line one.\nLine [two] here"
        );
    }
}
