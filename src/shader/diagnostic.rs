use std::fmt;

/// Upper bound, in bytes, on the text kept from a compiler or linker report.
pub const DIAGNOSTIC_CAPACITY: usize = 512;

const UNKNOWN_FAILURE: &str = "unknown failure (no diagnostic reported)";

/// Human readable text describing why a stage failed to compile or a program
/// failed to link.
///
/// The text is never empty and never longer than the capacity it was built
/// with, except that the first character is always kept. Truncation always
/// lands on a `char` boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    text: String,
    truncated: bool,
}

impl Diagnostic {
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_capacity(text, DIAGNOSTIC_CAPACITY)
    }

    pub fn with_capacity(text: impl Into<String>, capacity: usize) -> Self {
        let mut text = text.into();
        let trimmed_len = text.trim_end().len();
        text.truncate(trimmed_len);

        if text.is_empty() {
            text.push_str(UNKNOWN_FAILURE);
        }

        let mut truncated = false;
        if text.len() > capacity {
            let mut end = capacity;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            if end == 0 {
                end = text.chars().next().map_or(0, char::len_utf8);
            }
            text.truncate(end);
            truncated = true;
        }

        Self { text, truncated }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether part of the original report was cut off.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_kept_verbatim() {
        let diagnostic = Diagnostic::new("0:3: 'x' : undeclared identifier\n");
        assert_eq!(diagnostic.text(), "0:3: 'x' : undeclared identifier");
        assert!(!diagnostic.is_truncated());
    }

    #[test]
    fn long_text_is_bounded() {
        let diagnostic = Diagnostic::new("e".repeat(DIAGNOSTIC_CAPACITY * 3));
        assert_eq!(diagnostic.text().len(), DIAGNOSTIC_CAPACITY);
        assert!(diagnostic.is_truncated());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 'é' is two bytes, so a capacity of 5 cannot split the third one.
        let diagnostic = Diagnostic::with_capacity("ééé", 5);
        assert_eq!(diagnostic.text(), "éé");
        assert!(diagnostic.is_truncated());
    }

    #[test]
    fn zero_capacity_keeps_the_first_character() {
        let diagnostic = Diagnostic::with_capacity("abc", 0);
        assert_eq!(diagnostic.text(), "a");
        assert!(diagnostic.is_truncated());

        let diagnostic = Diagnostic::with_capacity("ééé", 1);
        assert_eq!(diagnostic.text(), "é");
    }

    #[test]
    fn empty_report_still_produces_text() {
        let diagnostic = Diagnostic::new("  \n");
        assert!(!diagnostic.text().is_empty());
        assert_eq!(format!("{}", diagnostic), UNKNOWN_FAILURE);
    }
}
