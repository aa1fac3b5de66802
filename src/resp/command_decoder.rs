use crate::{Error, Result, resp::Command};
use bytes::{Buf, BytesMut};
use memchr::memchr;
use tokio_util::codec::Decoder;

/// Incremental decoder for RESP-Array command records.
///
/// A replica reads its master stream through this decoder, and AOF replay
/// re-frames the journal with it. Partial input yields `Ok(None)` so the
/// caller can wait for more bytes; only malformed framing is an error.
pub struct CommandDecoder;

impl Decoder for CommandDecoder {
    type Item = Command;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Command>> {
        if src.is_empty() {
            return Ok(None);
        }

        match CommandFrameParser::new(src.as_ref()).parse()? {
            Some((mut tokens, consumed)) => {
                src.advance(consumed);
                let name = tokens.remove(0).to_ascii_uppercase();
                Ok(Some(Command::new(name, tokens)))
            }
            None => Ok(None),
        }
    }
}

/// One-shot parser over a byte slice; restarted from scratch on every
/// [`CommandDecoder::decode`] call until a full frame is buffered.
struct CommandFrameParser<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> CommandFrameParser<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// `Ok(None)` means the frame is incomplete. A complete frame yields the
    /// tokens plus the number of bytes they consumed.
    fn parse(mut self) -> Result<Option<(Vec<String>, usize)>> {
        let Some(count) = self.parse_length(b'*')? else {
            return Ok(None);
        };
        if count < 1 {
            return Err(Error::Protocol(format!(
                "command array with invalid element count {count}"
            )));
        }

        let mut tokens = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let Some(token) = self.parse_bulkstring()? else {
                return Ok(None);
            };
            tokens.push(token);
        }

        Ok(Some((tokens, self.pos)))
    }

    fn parse_length(&mut self, tag: u8) -> Result<Option<i64>> {
        if self.pos >= self.buf.len() {
            return Ok(None);
        }
        if self.buf[self.pos] != tag {
            return Err(Error::Protocol(format!(
                "expected '{}', got '{}'",
                tag as char, self.buf[self.pos] as char
            )));
        }
        self.pos += 1;
        self.parse_integer_line()
    }

    fn parse_integer_line(&mut self) -> Result<Option<i64>> {
        let rem = &self.buf[self.pos..];
        let Some(i) = memchr(b'\r', rem) else {
            return Ok(None);
        };
        if i + 1 >= rem.len() {
            return Ok(None);
        }
        if rem[i + 1] != b'\n' {
            return Err(Error::Protocol("malformed line terminator".to_owned()));
        }
        let n = atoi::atoi(&rem[..i])
            .ok_or_else(|| Error::Protocol("malformed length header".to_owned()))?;
        self.pos += i + 2;
        Ok(Some(n))
    }

    fn parse_bulkstring(&mut self) -> Result<Option<String>> {
        let Some(len) = self.parse_length(b'$')? else {
            return Ok(None);
        };
        if len < 0 {
            return Err(Error::Protocol(
                "negative bulk length in command frame".to_owned(),
            ));
        }
        let need = self.pos + len as usize + 2;
        if self.buf.len() < need {
            return Ok(None);
        }
        if &self.buf[need - 2..need] != b"\r\n" {
            return Err(Error::Protocol("bulk string not CRLF terminated".to_owned()));
        }
        let token = std::str::from_utf8(&self.buf[self.pos..need - 2])?.to_owned();
        self.pos = need;
        Ok(Some(token))
    }
}
