// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Normalises text extracted from HTML/markup sources before it
// reaches the tokenizer.
//
// Extracted web text commonly carries:
//   - Non-breaking spaces (U+00A0) from &nbsp; entities
//   - Zero-width spaces (U+200B) and BOMs from templating
//   - Tabs, carriage returns and newlines from markup layout
//   - Runs of spaces left behind by removed tags
//
// All of these collapse to single plain spaces in one pass. The
// same cleaning is applied to contexts and to targets, so a
// target that occurred verbatim in the raw markup text still
// occurs verbatim after cleaning.

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Flatten a raw extracted string into single-spaced text.
    pub fn clean(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        // Starting "after a space" trims leading whitespace for free
        let mut last_space = true;

        for c in text.chars() {
            let c = match c {
                // Whitespace look-alikes from markup → plain space
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                '\t' | '\r' | '\n' => ' ',
                // Remaining control characters carry no text
                c if c.is_control() => ' ',
                c => c,
            };

            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        // Drop the single trailing space a space-final input leaves
        if out.ends_with(' ') {
            out.pop();
        }

        out
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_multiple_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello   world"), "hello world");
    }

    #[test]
    fn test_trims_edges() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("  hello world  "), "hello world");
    }

    #[test]
    fn test_flattens_newlines_and_tabs() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello\n\tworld\r\n"), "hello world");
    }

    #[test]
    fn test_replaces_nbsp_and_zero_width() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("240\u{00A0}grams"), "240 grams");
        assert_eq!(p.clean("ze\u{200B}ro"), "ze ro");
    }

    #[test]
    fn test_removes_control_chars() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello\x01world"), "hello world");
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::new();
        assert_eq!(p.clean(""), "");
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let p = Preprocessor::new();
        let once = p.clean(" a\u{00A0} b \n c ");
        assert_eq!(p.clean(&once), once);
    }
}
