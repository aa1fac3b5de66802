use crate::{Error, Result};
use bytes::BytesMut;
use memchr::memchr;
use tokio_util::codec::Decoder;

/// Frames inline client input on `\n`, stripping an optional trailing `\r`.
///
/// TCP reads can coalesce several commands or split one across reads, so the
/// decoder buffers and yields exactly one line per frame. Blank lines are
/// yielded as empty strings and rejected later, at parse time, so the
/// connection survives them with an error reply.
pub struct InlineDecoder;

impl Decoder for InlineDecoder {
    type Item = String;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        let Some(i) = memchr(b'\n', src.as_ref()) else {
            return Ok(None);
        };

        let line = src.split_to(i + 1);
        let end = if i > 0 && line[i - 1] == b'\r' { i - 1 } else { i };
        Ok(Some(std::str::from_utf8(&line[..end])?.to_owned()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => Ok(None),
            // a peer that closes without a final newline still gets its
            // last command executed
            None => {
                let line = src.split_to(src.len());
                Ok(Some(
                    std::str::from_utf8(&line)?.trim_end_matches('\r').to_owned(),
                ))
            }
        }
    }
}
