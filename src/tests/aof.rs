use crate::{
    Result,
    resp::{Command, Reply, command_record},
    store::StorageEngine,
};

fn cmd(line: &str) -> Command {
    Command::parse_inline(line).unwrap()
}

#[tokio::test]
async fn writes_are_journaled_in_apply_order() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.aof");

    let engine = StorageEngine::new(true);
    engine.open_aof(&path).await?;
    engine.execute(&cmd("SET foo bar")).await?;
    engine.execute(&cmd("GET foo")).await?; // reads are not journaled
    engine.execute(&cmd("LPUSH ls a b")).await?;
    engine.execute(&cmd("DELETE foo")).await?;
    engine.shutdown().await;

    let mut expected = Vec::new();
    expected.extend_from_slice(&command_record(&cmd("SET foo bar")));
    expected.extend_from_slice(&command_record(&cmd("LPUSH ls a b")));
    expected.extend_from_slice(&command_record(&cmd("DELETE foo")));

    assert_eq!(expected, std::fs::read(&path).unwrap());

    Ok(())
}

#[tokio::test]
async fn replay_rebuilds_the_keyspace() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.aof");

    let engine = StorageEngine::new(true);
    engine.open_aof(&path).await?;
    engine.execute(&cmd("SET foo bar")).await?;
    engine.execute(&cmd("LPUSH ls x y z")).await?;
    engine.execute(&cmd("HSET h f v")).await?;
    engine.execute(&cmd("DELETE foo")).await?;
    engine.shutdown().await;

    let restored = StorageEngine::new(true);
    assert_eq!(4, restored.replay_aof(&path).await?);

    assert_eq!(Reply::Nil, restored.execute(&cmd("GET foo")).await?);
    assert_eq!(
        Reply::Array(vec![
            Reply::Bulk("z".to_owned()),
            Reply::Bulk("y".to_owned()),
            Reply::Bulk("x".to_owned()),
        ]),
        restored.execute(&cmd("LRANGE ls 0 -1")).await?
    );
    assert_eq!(
        Reply::Bulk("v".to_owned()),
        restored.execute(&cmd("HGET h f")).await?
    );

    Ok(())
}

#[tokio::test]
async fn replay_tolerates_a_truncated_tail() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.aof");

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&command_record(&cmd("SET a 1")));
    bytes.extend_from_slice(&command_record(&cmd("SET b 2")));
    // crash mid-append: half a record at the end of the file
    let partial = command_record(&cmd("SET c 3"));
    bytes.extend_from_slice(&partial[..partial.len() - 5]);
    std::fs::write(&path, &bytes).unwrap();

    let engine = StorageEngine::new(true);
    assert_eq!(2, engine.replay_aof(&path).await?);
    assert_eq!(Reply::Bulk("2".to_owned()), engine.execute(&cmd("GET b")).await?);
    assert_eq!(Reply::Nil, engine.execute(&cmd("GET c")).await?);

    Ok(())
}

#[tokio::test]
async fn replay_of_a_missing_file_starts_empty() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();

    let engine = StorageEngine::new(true);
    assert_eq!(0, engine.replay_aof(&dir.path().join("nope.aof")).await?);
    assert_eq!(0, engine.entry_count().await);

    Ok(())
}

#[tokio::test]
async fn aborted_batches_leave_no_journal_records() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.aof");

    let engine = StorageEngine::new(true);
    engine.open_aof(&path).await?;

    let bad = vec![cmd("SET a 1"), cmd("NOSUCH x")];
    assert!(engine.execute_batch(&bad).await.is_err());

    let good = vec![cmd("SET a 1"), cmd("SET b 2")];
    engine.execute_batch(&good).await?;
    engine.shutdown().await;

    let mut expected = Vec::new();
    expected.extend_from_slice(&command_record(&cmd("SET a 1")));
    expected.extend_from_slice(&command_record(&cmd("SET b 2")));
    assert_eq!(expected, std::fs::read(&path).unwrap());

    Ok(())
}
