/*!
Wire protocol support.

Inbound client traffic is the simplified inline form: one whitespace
delimited command per line, framed by [`InlineDecoder`]. Replies, the
append-only file, and the master→replica stream all use RESP framing:
[`ReplyEncoder`] for replies, [`CommandEncoder`]/[`CommandDecoder`] for
RESP-Array command records.
*/

mod command;
mod command_decoder;
mod command_encoder;
mod inline_decoder;
mod reply;

pub use command::*;
pub use command_decoder::*;
pub use command_encoder::*;
pub use inline_decoder::*;
pub use reply::*;
