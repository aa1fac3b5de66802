use crate::{
    Error,
    config::{Cli, PersistenceMode, Role, ServerConfig},
};
use clap::Parser;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(["ignisdb"].into_iter().chain(args.iter().copied())).unwrap()
}

#[test]
fn master_defaults() {
    let config = ServerConfig::from_cli(parse(&[])).unwrap();

    assert_eq!(Role::Master, config.role);
    assert_eq!("127.0.0.1", config.host);
    assert_eq!(6380, config.port);
    assert_eq!(None, config.master_addr);
    assert_eq!(PersistenceMode::Snapshot, config.persistence_mode);
    assert_eq!(300, config.snapshot_interval);
}

#[test]
fn replica_requires_a_master_port() {
    let result = ServerConfig::from_cli(parse(&["--role", "replica"]));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn replica_defaults_and_master_address() {
    let config = ServerConfig::from_cli(parse(&[
        "--role",
        "replica",
        "--master-port",
        "6380",
    ]))
    .unwrap();

    assert_eq!(Role::Replica, config.role);
    assert_eq!(6381, config.port);
    assert_eq!(Some(("127.0.0.1".to_owned(), 6380)), config.master_addr);
}

#[test]
fn explicit_flags_override_defaults() {
    let config = ServerConfig::from_cli(parse(&[
        "--port",
        "7000",
        "--persistence-mode",
        "aof",
        "--aof-file",
        "/tmp/db.aof",
        "--snapshot-interval",
        "10",
    ]))
    .unwrap();

    assert_eq!(7000, config.port);
    assert_eq!(PersistenceMode::Aof, config.persistence_mode);
    assert_eq!("/tmp/db.aof", config.aof_file.to_str().unwrap());
    assert_eq!(10, config.snapshot_interval);
}

#[test]
fn zero_snapshot_interval_is_rejected() {
    let result = ServerConfig::from_cli(parse(&["--snapshot-interval", "0"]));
    assert!(matches!(result, Err(Error::Config(_))));
}
