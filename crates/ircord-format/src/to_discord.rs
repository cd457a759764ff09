//! IRC control-code text to Discord markdown.
//!
//! The scan is byte oriented: every control code is a single ASCII byte,
//! so splitting at them never cuts a UTF-8 sequence. Style bytes only
//! update the pending [`StyleState`]; markers are emitted lazily when the
//! next visible byte is written and the style differs from the last one
//! written. Runs are separated by a zero-width space so Discord does not
//! merge adjacent markers such as `**` + `*`.

use std::sync::LazyLock;

use regex::bytes::Regex;

use crate::codes;
use crate::style::StyleState;

/// A URL starting exactly at the scan position. Trailing punctuation is
/// left out so `(see https://x.y/z).` keeps its parenthesis.
static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^https?://[^\s<\x00-\x1F]+[^<.,:;"')\]\s\x00-\x1F]"#).expect("valid URL regex")
});

/// Where the scanner currently is relative to raw and URL spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Ordinary text: markdown metacharacters are escaped.
    Normal,
    /// Inside a backtick span: bytes pass through untouched.
    Raw,
    /// Inside a detected URL: metacharacters pass through so links work.
    InsideUrl,
}

/// What a single input byte turns into.
#[derive(Debug, Clone, Copy)]
enum Emit {
    Nothing,
    Byte(u8),
    Escaped(u8),
}

/// Convert IRC control-code text into Discord markdown.
///
/// Colors, monospace and reverse video are dropped; bold, italics,
/// underline and strikethrough become markdown markers; `\ * _ ~` are
/// escaped outside code spans and URLs.
pub fn irc_to_discord(input: &str) -> String {
    let mut src = Vec::with_capacity(input.len() + 1);
    src.extend_from_slice(input.as_bytes());
    // Close whatever the sender left open.
    src.push(codes::RESET);
    Scanner::new(&src).run()
}

struct Scanner<'a> {
    src: &'a [u8],
    out: Vec<u8>,
    markers: String,
    prev: StyleState,
    next: StyleState,
    mode: Mode,
    url_end: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a [u8]) -> Self {
        Self {
            src,
            out: Vec::with_capacity(src.len() + 16),
            markers: String::new(),
            prev: StyleState::PLAIN,
            next: StyleState::PLAIN,
            mode: Mode::Normal,
            url_end: 0,
        }
    }

    fn run(mut self) -> String {
        let len = self.src.len();
        let mut i = 0;
        while i < len {
            let c = self.src[i];
            if self.mode == Mode::Raw {
                if c != b'`' {
                    self.out.push(c);
                    i += 1;
                    continue;
                }
            } else {
                self.track_url(i);
            }

            let emit = match c {
                codes::BOLD | codes::ITALIC | codes::UNDERLINE | codes::STRIKETHROUGH
                | codes::RESET => {
                    self.next.apply(c);
                    Emit::Nothing
                }
                codes::MONOSPACE | codes::REVERSE => {
                    i += 1;
                    continue;
                }
                codes::COLOR => {
                    i = skip_color(self.src, i);
                    continue;
                }
                codes::COLOR_HEX => {
                    // Never swallow the trailing reset.
                    i = (i + 7).min(len - 1);
                    continue;
                }
                b'`' => self.backtick(i),
                b'\\' | b'*' | b'_' | b'~' if self.mode == Mode::Normal => Emit::Escaped(c),
                _ => Emit::Byte(c),
            };

            if matches!(emit, Emit::Nothing) && i + 1 < len {
                i += 1;
                continue;
            }
            self.write(emit);
            i += 1;
        }
        match String::from_utf8(self.out) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }

    /// Lazily find the URL span covering position `i`, if any.
    fn track_url(&mut self, i: usize) {
        if i >= self.url_end
            && let Some(m) = URL.find(&self.src[i..])
        {
            self.url_end = i + m.end();
        }
        self.mode = if i < self.url_end {
            Mode::InsideUrl
        } else {
            Mode::Normal
        };
    }

    fn backtick(&mut self, i: usize) -> Emit {
        if self.mode == Mode::Raw {
            self.mode = Mode::Normal;
            return Emit::Byte(b'`');
        }
        // A span needs a closing backtick with at least one byte between.
        let closes = self.src[i + 1..]
            .iter()
            .position(|&b| b == b'`')
            .is_some_and(|offset| offset > 0);
        if closes {
            self.mode = Mode::Raw;
            Emit::Byte(b'`')
        } else {
            Emit::Escaped(b'`')
        }
    }

    fn write(&mut self, emit: Emit) {
        if self.prev != self.next {
            self.markers.clear();
            self.prev.close_markers(&mut self.markers);
            self.out.extend_from_slice(self.markers.as_bytes());
            self.prev = StyleState::PLAIN;
            if matches!(emit, Emit::Nothing) {
                return;
            }
            self.markers.clear();
            self.markers.push(codes::ZWSP);
            self.next.open_markers(&mut self.markers);
            self.out.extend_from_slice(self.markers.as_bytes());
            self.prev = self.next;
        }
        match emit {
            Emit::Nothing => {}
            Emit::Byte(b) => self.out.push(b),
            Emit::Escaped(b) => self.out.extend_from_slice(&[b'\\', b]),
        }
    }
}

/// Skip a `\x03FG[,BG]` sequence starting at `i`; returns the index of the
/// first byte after it. Each component is at most two digits.
fn skip_color(src: &[u8], mut i: usize) -> usize {
    let digit = |at: usize| src.get(at).is_some_and(u8::is_ascii_digit);
    if !digit(i + 1) {
        return i + 1;
    }
    i += 1;
    if digit(i + 1) {
        i += 1;
    }
    if src.get(i + 1) == Some(&b',') && digit(i + 2) {
        i += 2;
        if digit(i + 1) {
            i += 1;
        }
    }
    i + 1
}
