use crate::{
    CommandErrorKind, Error, Result,
    resp::{Command, Reply},
    store::StorageEngine,
};
use std::time::Duration;

fn cmd(line: &str) -> Command {
    Command::parse_inline(line).unwrap()
}

async fn exec(engine: &StorageEngine, line: &str) -> Result<Reply> {
    engine.execute(&cmd(line)).await
}

fn assert_error_kind(result: Result<Reply>, kind: CommandErrorKind) {
    match result {
        Err(Error::Command(e)) => assert_eq!(kind, e.kind),
        other => panic!("expected a {kind:?} command error, got {other:?}"),
    }
}

#[tokio::test]
async fn set_get_delete_roundtrip() -> Result<()> {
    let engine = StorageEngine::new(true);

    assert_eq!(Reply::ok(), exec(&engine, "SET foo bar").await?);
    assert_eq!(Reply::Bulk("bar".to_owned()), exec(&engine, "GET foo").await?);
    assert_eq!(Reply::Integer(1), exec(&engine, "DELETE foo").await?);
    assert_eq!(Reply::Nil, exec(&engine, "GET foo").await?);
    assert_eq!(Reply::Integer(0), exec(&engine, "DELETE foo").await?);

    Ok(())
}

#[tokio::test]
async fn set_replaces_any_kind_and_resets_expiry() -> Result<()> {
    let engine = StorageEngine::new(true);

    exec(&engine, "LPUSH k a b").await?;
    assert_eq!(Reply::ok(), exec(&engine, "SET k v").await?);
    assert_eq!(Reply::Bulk("v".to_owned()), exec(&engine, "GET k").await?);

    // the overwrite discards the immediate expiry along with the old value
    exec(&engine, "SET t old EX 0").await?;
    exec(&engine, "SET t new").await?;
    assert_eq!(Reply::Bulk("new".to_owned()), exec(&engine, "GET t").await?);

    Ok(())
}

#[tokio::test]
async fn wrong_kind_is_rejected_without_mutation() -> Result<()> {
    let engine = StorageEngine::new(true);

    exec(&engine, "LPUSH ls x y z").await?;
    assert_error_kind(exec(&engine, "GET ls").await, CommandErrorKind::WrongType);
    assert_error_kind(exec(&engine, "HGET ls f").await, CommandErrorKind::WrongType);
    assert_error_kind(exec(&engine, "HSET ls f v").await, CommandErrorKind::WrongType);

    // the list is untouched by the failed commands
    assert_eq!(
        Reply::Array(vec![
            Reply::Bulk("z".to_owned()),
            Reply::Bulk("y".to_owned()),
            Reply::Bulk("x".to_owned()),
        ]),
        exec(&engine, "LRANGE ls 0 -1").await?
    );

    exec(&engine, "SET s v").await?;
    assert_error_kind(exec(&engine, "LPUSH s x").await, CommandErrorKind::WrongType);
    assert_error_kind(exec(&engine, "LRANGE s 0 -1").await, CommandErrorKind::WrongType);

    Ok(())
}

#[tokio::test]
async fn lpush_prepends_left_to_right() -> Result<()> {
    let engine = StorageEngine::new(true);

    assert_eq!(Reply::Integer(3), exec(&engine, "LPUSH ls x y z").await?);
    assert_eq!(
        Reply::Array(vec![
            Reply::Bulk("z".to_owned()),
            Reply::Bulk("y".to_owned()),
            Reply::Bulk("x".to_owned()),
        ]),
        exec(&engine, "LRANGE ls 0 -1").await?
    );

    // pushing onto an existing list keeps prepending ahead of the old head
    assert_eq!(Reply::Integer(5), exec(&engine, "LPUSH ls 1 2").await?);
    assert_eq!(
        Reply::Array(vec![
            Reply::Bulk("2".to_owned()),
            Reply::Bulk("1".to_owned()),
            Reply::Bulk("z".to_owned()),
        ]),
        exec(&engine, "LRANGE ls 0 2").await?
    );

    Ok(())
}

#[tokio::test]
async fn lrange_clamps_out_of_range_indices() -> Result<()> {
    let engine = StorageEngine::new(true);
    exec(&engine, "LPUSH ls a b c").await?;

    assert_eq!(
        Reply::Array(vec![Reply::Bulk("c".to_owned())]),
        exec(&engine, "LRANGE ls 0 0").await?
    );
    assert_eq!(
        Reply::Array(vec![Reply::Bulk("b".to_owned()), Reply::Bulk("a".to_owned())]),
        exec(&engine, "LRANGE ls 1 99").await?
    );
    assert_eq!(Reply::Array(Vec::new()), exec(&engine, "LRANGE ls 5 9").await?);
    assert_eq!(Reply::Array(Vec::new()), exec(&engine, "LRANGE ls 2 1").await?);

    // a missing key is an empty array, not nil
    assert_eq!(
        Reply::Array(Vec::new()),
        exec(&engine, "LRANGE nothing 0 -1").await?
    );

    Ok(())
}

#[tokio::test]
async fn hset_reports_new_field_and_overwrites() -> Result<()> {
    let engine = StorageEngine::new(true);

    assert_eq!(Reply::Integer(1), exec(&engine, "HSET h a 1").await?);
    assert_eq!(Reply::Integer(0), exec(&engine, "HSET h a 2").await?);
    assert_eq!(Reply::Bulk("2".to_owned()), exec(&engine, "HGET h a").await?);
    assert_eq!(Reply::Nil, exec(&engine, "HGET h other").await?);
    assert_eq!(Reply::Nil, exec(&engine, "HGET missing f").await?);
    assert_error_kind(exec(&engine, "GET h").await, CommandErrorKind::WrongType);

    Ok(())
}

#[tokio::test]
async fn expire_updates_only_existing_keys() -> Result<()> {
    let engine = StorageEngine::new(true);

    assert_eq!(Reply::Integer(0), exec(&engine, "EXPIRE missing 10").await?);

    exec(&engine, "SET k v").await?;
    assert_eq!(Reply::Integer(1), exec(&engine, "EXPIRE k 100").await?);
    assert_eq!(Reply::Bulk("v".to_owned()), exec(&engine, "GET k").await?);

    // the payload survives an expiry update
    exec(&engine, "LPUSH ls a").await?;
    assert_eq!(Reply::Integer(1), exec(&engine, "EXPIRE ls 100").await?);
    assert_eq!(
        Reply::Array(vec![Reply::Bulk("a".to_owned())]),
        exec(&engine, "LRANGE ls 0 -1").await?
    );

    Ok(())
}

#[tokio::test]
async fn zero_ttl_expires_immediately() -> Result<()> {
    let engine = StorageEngine::new(true);

    exec(&engine, "SET k v EX 0").await?;
    assert_eq!(Reply::Nil, exec(&engine, "GET k").await?);

    // the GET above already purged the entry
    assert_eq!(Reply::Integer(0), exec(&engine, "DELETE k").await?);

    // an expired entry discovered by DELETE itself still counts as deleted
    exec(&engine, "SET k2 v EX 0").await?;
    assert_eq!(Reply::Integer(1), exec(&engine, "DELETE k2").await?);

    Ok(())
}

#[tokio::test]
async fn entries_expire_after_their_ttl() -> Result<()> {
    let engine = StorageEngine::new(true);

    exec(&engine, "SET k v EX 1").await?;
    assert_eq!(Reply::Bulk("v".to_owned()), exec(&engine, "GET k").await?);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(Reply::Nil, exec(&engine, "GET k").await?);
    assert_eq!(Reply::Integer(0), exec(&engine, "DELETE k").await?);

    Ok(())
}

#[tokio::test]
async fn malformed_arguments_are_rejected() -> Result<()> {
    let engine = StorageEngine::new(true);
    exec(&engine, "SET k v").await?;

    assert_error_kind(exec(&engine, "EXPIRE k soon").await, CommandErrorKind::Err);
    assert_error_kind(exec(&engine, "SET k v EX 10s").await, CommandErrorKind::Err);
    assert_error_kind(exec(&engine, "SET k v PX 10").await, CommandErrorKind::Err);
    assert_error_kind(exec(&engine, "LRANGE k a b").await, CommandErrorKind::Err);
    assert_error_kind(exec(&engine, "GET").await, CommandErrorKind::Err);
    assert_error_kind(exec(&engine, "HSET h f").await, CommandErrorKind::Err);
    assert_error_kind(exec(&engine, "LPUSH ls").await, CommandErrorKind::Err);
    assert_error_kind(exec(&engine, "NOSUCH k").await, CommandErrorKind::Err);

    // failed validation leaves the key as it was
    assert_eq!(Reply::Bulk("v".to_owned()), exec(&engine, "GET k").await?);

    Ok(())
}

#[tokio::test]
async fn command_names_are_case_insensitive() -> Result<()> {
    let engine = StorageEngine::new(true);

    assert_eq!(Reply::ok(), exec(&engine, "set foo Bar").await?);
    // argument case is preserved
    assert_eq!(Reply::Bulk("Bar".to_owned()), exec(&engine, "get foo").await?);
    assert_eq!(Reply::ok(), exec(&engine, "SET t v Ex 100").await?);

    Ok(())
}
