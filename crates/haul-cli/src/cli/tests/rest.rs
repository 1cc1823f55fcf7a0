//! Tests for sessions, forget, plan, checksum.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_sessions() {
    match parse(&["haul", "sessions"]) {
        CliCommand::Sessions => {}
        _ => panic!("expected Sessions"),
    }
}

#[test]
fn cli_parse_forget() {
    match parse(&["haul", "forget", "sess-42"]) {
        CliCommand::Forget { id } => assert_eq!(id, "sess-42"),
        _ => panic!("expected Forget"),
    }
}

#[test]
fn cli_parse_plan() {
    match parse(&["haul", "plan", "big.iso"]) {
        CliCommand::Plan { path, part_size } => {
            assert_eq!(path, "big.iso");
            assert!(part_size.is_none());
        }
        _ => panic!("expected Plan"),
    }
}

#[test]
fn cli_parse_plan_part_size() {
    match parse(&["haul", "plan", "big.iso", "--part-size", "1048576"]) {
        CliCommand::Plan { part_size, .. } => assert_eq!(part_size, Some(1_048_576)),
        _ => panic!("expected Plan with --part-size"),
    }
}

#[test]
fn cli_plan_rejects_non_numeric_part_size() {
    assert!(Cli::try_parse_from(["haul", "plan", "big.iso", "--part-size", "lots"]).is_err());
}

#[test]
fn cli_parse_checksum() {
    match parse(&["haul", "checksum", "/path/to/file.bin"]) {
        CliCommand::Checksum { path } => assert_eq!(path, "/path/to/file.bin"),
        _ => panic!("expected Checksum"),
    }
}
