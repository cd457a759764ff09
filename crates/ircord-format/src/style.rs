//! [`StyleState`] -- the set of emphasis attributes active at a position.

use crate::codes;

/// Emphasis attributes that have a markdown equivalent.
///
/// Two consecutive spans with equal states are emitted as one run; a
/// difference forces the previous markers closed and the new ones opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyleState {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
}

impl StyleState {
    /// No attribute set.
    pub const PLAIN: StyleState = StyleState {
        bold: false,
        italic: false,
        underline: false,
        strikethrough: false,
    };

    pub fn is_plain(&self) -> bool {
        *self == Self::PLAIN
    }

    /// Apply an IRC style control byte. Returns `false` for bytes that are
    /// not style toggles or resets.
    pub fn apply(&mut self, code: u8) -> bool {
        match code {
            codes::BOLD => self.bold = !self.bold,
            codes::ITALIC => self.italic = !self.italic,
            codes::UNDERLINE => self.underline = !self.underline,
            codes::STRIKETHROUGH => self.strikethrough = !self.strikethrough,
            codes::RESET => *self = Self::PLAIN,
            _ => return false,
        }
        true
    }

    /// Markdown that closes this state's markers, innermost first.
    pub fn close_markers(&self, out: &mut String) {
        if self.italic {
            out.push('*');
        }
        if self.bold {
            out.push_str("**");
        }
        if self.underline {
            out.push_str("__");
        }
        if self.strikethrough {
            out.push_str("~~");
        }
    }

    /// Markdown that opens this state's markers, outermost first.
    pub fn open_markers(&self, out: &mut String) {
        if self.strikethrough {
            out.push_str("~~");
        }
        if self.underline {
            out.push_str("__");
        }
        if self.bold {
            out.push_str("**");
        }
        if self.italic {
            out.push('*');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_and_reset() {
        let mut style = StyleState::default();
        assert!(style.apply(codes::BOLD));
        assert!(style.bold);
        assert!(style.apply(codes::BOLD));
        assert!(!style.bold);

        style.apply(codes::ITALIC);
        style.apply(codes::STRIKETHROUGH);
        assert!(!style.is_plain());
        style.apply(codes::RESET);
        assert!(style.is_plain());
    }

    #[test]
    fn non_style_bytes_are_ignored() {
        let mut style = StyleState::default();
        assert!(!style.apply(codes::COLOR));
        assert!(!style.apply(b'a'));
        assert!(style.is_plain());
    }

    #[test]
    fn markers_nest() {
        let style = StyleState {
            bold: true,
            italic: true,
            underline: true,
            strikethrough: true,
        };
        let mut open = String::new();
        style.open_markers(&mut open);
        let mut close = String::new();
        style.close_markers(&mut close);
        assert_eq!(open, "~~__***");
        assert_eq!(close, "***__~~");
    }
}
