//! IRC formatting control bytes.

/// Toggle bold.
pub const BOLD: u8 = 0x02;

/// Toggle italics.
pub const ITALIC: u8 = 0x1D;

/// Toggle underline.
pub const UNDERLINE: u8 = 0x1F;

/// Toggle strikethrough.
pub const STRIKETHROUGH: u8 = 0x1E;

/// Toggle monospace.
pub const MONOSPACE: u8 = 0x11;

/// Two-digit mIRC color: `\x03FG[,BG]`.
pub const COLOR: u8 = 0x03;

/// Hex color: `\x04RRGGBB`.
pub const COLOR_HEX: u8 = 0x04;

/// Toggle reverse video.
pub const REVERSE: u8 = 0x16;

/// Reset all formatting.
pub const RESET: u8 = 0x0F;

/// Zero-width space, used to split markdown runs and to break nick highlights.
pub const ZWSP: char = '\u{200B}';

/// `char` form of a control byte, for string building.
pub const fn ch(code: u8) -> char {
    code as char
}
