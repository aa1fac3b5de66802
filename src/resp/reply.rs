use crate::{CommandError, Error, Result};
use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

/// Result of a command, as sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+<text>\r\n`, reserved for the status strings `OK` and `QUEUED`
    Simple(String),
    /// `$<len>\r\n<text>\r\n`
    Bulk(String),
    /// `:<n>\r\n`
    Integer(i64),
    /// `*<count>\r\n` followed by the framed elements
    Array(Vec<Reply>),
    /// `_(nil)\r\n`, non-standard framing preserved for compatibility
    Nil,
    /// `-<KIND> <message>\r\n`
    Error(CommandError),
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Simple("OK".to_owned())
    }

    pub fn queued() -> Self {
        Reply::Simple("QUEUED".to_owned())
    }
}

/// Writes the outbound RESP framing of a [`Reply`].
pub struct ReplyEncoder;

impl Encoder<&Reply> for ReplyEncoder {
    type Error = Error;

    fn encode(&mut self, reply: &Reply, buf: &mut BytesMut) -> Result<()> {
        encode_reply(reply, buf);
        Ok(())
    }
}

fn encode_reply(reply: &Reply, buf: &mut BytesMut) {
    match reply {
        Reply::Simple(text) => {
            buf.put_u8(b'+');
            buf.put(text.as_bytes());
            encode_crlf(buf);
        }
        Reply::Bulk(text) => {
            buf.put_u8(b'$');
            encode_integer(text.len() as i64, buf);
            encode_crlf(buf);
            buf.put(text.as_bytes());
            encode_crlf(buf);
        }
        Reply::Integer(i) => {
            buf.put_u8(b':');
            encode_integer(*i, buf);
            encode_crlf(buf);
        }
        Reply::Array(items) => {
            buf.put_u8(b'*');
            encode_integer(items.len() as i64, buf);
            encode_crlf(buf);
            for item in items {
                encode_reply(item, buf);
            }
        }
        Reply::Nil => {
            buf.put(&b"_(nil)\r\n"[..]);
        }
        Reply::Error(e) => {
            buf.put_u8(b'-');
            buf.put(e.to_string().as_bytes());
            encode_crlf(buf);
        }
    }
}

#[inline]
fn encode_integer(i: i64, buf: &mut BytesMut) {
    let mut buffer = itoa::Buffer::new();
    let str = buffer.format(i);
    buf.put(str.as_bytes());
}

#[inline]
fn encode_crlf(buf: &mut BytesMut) {
    buf.put(&b"\r\n"[..]);
}
