//! Line framing for IRC over a byte stream.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{trace, warn};

use ircord_types::ChannelError;

use super::message::Message;

/// Longest accepted line: 512 bytes of message plus 8191 bytes of tags.
pub const MAX_LINE_LEN: usize = 512 + 8191;

/// [`Decoder`]/[`Encoder`] turning `\r\n`-terminated lines into
/// [`Message`]s.
///
/// Invalid UTF-8 is replaced rather than rejected; malformed lines are
/// logged and skipped.
#[derive(Debug, Default)]
pub struct IrcCodec {
    /// Bytes already scanned for a newline.
    scanned: usize,
}

impl IrcCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for IrcCodec {
    type Item = Message;
    type Error = ChannelError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Message>, ChannelError> {
        loop {
            let Some(offset) = buf[self.scanned..].iter().position(|&b| b == b'\n') else {
                if buf.len() > MAX_LINE_LEN {
                    return Err(ChannelError::ReceiveFailed(format!(
                        "line exceeds {MAX_LINE_LEN} bytes"
                    )));
                }
                self.scanned = buf.len();
                return Ok(None);
            };
            let end = self.scanned + offset;
            self.scanned = 0;
            let line = buf.split_to(end + 1);
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            if text.is_empty() {
                continue;
            }
            trace!(line = %text, "<<<");
            match text.parse::<Message>() {
                Ok(message) => return Ok(Some(message)),
                Err(e) => warn!(error = %e, line = %text, "skipping malformed IRC line"),
            }
        }
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = ChannelError;

    fn encode(&mut self, msg: Message, buf: &mut BytesMut) -> Result<(), ChannelError> {
        // Embedded line breaks would split the message into two commands.
        let line: String = msg
            .to_string()
            .chars()
            .map(|c| if matches!(c, '\r' | '\n' | '\0') { ' ' } else { c })
            .collect();
        trace!(line = %line, ">>>");
        buf.reserve(line.len() + 2);
        buf.put_slice(line.as_bytes());
        buf.put_slice(b"\r\n");
        Ok(())
    }
}
