use crate::{
    CommandError, Error, Result,
    config::Role,
    resp::{Command, InlineDecoder, Reply, ReplyEncoder},
    store::StorageEngine,
};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};

/// Transaction state of one client connection.
enum TxnState {
    Idle,
    Queuing(Vec<Command>),
}

/// What the command loop should do after handling one frame.
enum Action {
    Reply(Reply),
    /// The client announced itself as a replica; hand the write half over.
    BecomeReplica,
}

/// Per-client loop: read one inline frame, handle it, write one framed
/// reply. Semantic errors become error replies and the loop continues;
/// only I/O errors terminate the connection.
pub(crate) async fn handle_client(
    stream: TcpStream,
    addr: SocketAddr,
    engine: Arc<StorageEngine>,
    role: Role,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let mut frames = FramedRead::new(read_half, InlineDecoder);
    let mut replies = FramedWrite::new(write_half, ReplyEncoder);
    let mut state = TxnState::Idle;

    while let Some(frame) = frames.next().await {
        let line = match frame {
            Ok(line) => line,
            Err(Error::Protocol(e)) => {
                debug!("[{addr}] undecodable frame: {e}");
                replies
                    .send(&Reply::Error(CommandError::err("Protocol error")))
                    .await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        let reply = match handle_line(&line, &mut state, &engine, role).await {
            Ok(Action::Reply(reply)) => reply,
            Ok(Action::BecomeReplica) => {
                let write_half = replies.into_inner();
                engine.attach_replica(write_half, addr.to_string()).await?;
                // the peer is now a pure consumer; wait for it to hang up
                while let Some(frame) = frames.next().await {
                    frame?;
                }
                return Ok(());
            }
            Err(Error::Command(e)) => Reply::Error(e),
            Err(e) => {
                // internal failure: full detail in the log, a bare error
                // reply to the client
                error!("[{addr}] internal error while handling '{line}': {e}");
                Reply::Error(CommandError::err("Server error"))
            }
        };

        replies.send(&reply).await?;
    }

    Ok(())
}

async fn handle_line(
    line: &str,
    state: &mut TxnState,
    engine: &StorageEngine,
    role: Role,
) -> Result<Action> {
    let command = Command::parse_inline(line)?;

    // replicas accept reads only; anything that could mutate, including
    // opening a transaction or attaching a downstream replica, is refused
    // before it can touch the keyspace
    if role == Role::Replica
        && (command.is_write() || matches!(command.name.as_str(), "MULTI" | "REPLICAOF"))
    {
        return Err(CommandError::read_only().into());
    }

    match command.name.as_str() {
        "MULTI" => match state {
            TxnState::Queuing(_) => Err(CommandError::err("MULTI calls can not be nested").into()),
            TxnState::Idle => {
                *state = TxnState::Queuing(Vec::new());
                Ok(Action::Reply(Reply::ok()))
            }
        },
        "DISCARD" => match state {
            TxnState::Idle => Err(CommandError::err("DISCARD without MULTI").into()),
            TxnState::Queuing(_) => {
                *state = TxnState::Idle;
                Ok(Action::Reply(Reply::ok()))
            }
        },
        "EXEC" => match std::mem::replace(state, TxnState::Idle) {
            TxnState::Idle => Err(CommandError::err("EXEC without MULTI").into()),
            TxnState::Queuing(queue) if queue.is_empty() => {
                Ok(Action::Reply(Reply::Array(Vec::new())))
            }
            TxnState::Queuing(queue) => {
                let replies = engine.execute_batch(&queue).await?;
                Ok(Action::Reply(Reply::Array(replies)))
            }
        },
        // queue-time errors do not abort a transaction: even a malformed
        // command is queued and only rejected when EXEC validates the batch
        _ if matches!(state, TxnState::Queuing(_)) => {
            if let TxnState::Queuing(queue) = state {
                queue.push(command);
            }
            Ok(Action::Reply(Reply::queued()))
        }
        "REPLICAOF" => {
            if command.args.len() != 2 {
                return Err(CommandError::wrong_arity("replicaof").into());
            }
            Ok(Action::BecomeReplica)
        }
        _ => engine.execute(&command).await.map(Action::Reply),
    }
}
