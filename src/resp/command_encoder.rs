use crate::{Error, Result, resp::Command};
use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::Encoder;

/// Encodes a [`Command`] as a RESP-Array record:
/// `*<n>\r\n` followed by one bulk string per token, name first.
///
/// This is the only representation ever written to the append-only file or
/// to a replica stream.
pub struct CommandEncoder;

impl Encoder<&Command> for CommandEncoder {
    type Error = Error;

    #[inline]
    fn encode(&mut self, command: &Command, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(b'*');
        encode_integer(command.args.len() as i64 + 1, buf);
        encode_crlf(buf);
        encode_bulkstring(command.name.as_bytes(), buf);
        for arg in &command.args {
            encode_bulkstring(arg.as_bytes(), buf);
        }
        Ok(())
    }
}

/// Serializes a command once, for fan-out to several destinations.
pub fn command_record(command: &Command) -> Bytes {
    let mut buf = BytesMut::new();
    let _ = CommandEncoder.encode(command, &mut buf);
    buf.freeze()
}

#[inline]
fn encode_bulkstring(arg: &[u8], buf: &mut BytesMut) {
    buf.put_u8(b'$');
    encode_integer(arg.len() as i64, buf);
    encode_crlf(buf);
    buf.put(arg);
    encode_crlf(buf);
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
