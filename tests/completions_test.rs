#![cfg(feature = "cli")]
//! Integration tests for `mobitool completions` and argument parsing.

use clap::{CommandFactory, Parser};
use mobi::cli::app::{Cli, Commands};

fn generate_completions(shell: clap_complete::Shell) -> String {
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut cmd, "mobitool", &mut buf);
    String::from_utf8(buf).expect("completions should be valid UTF-8")
}

#[test]
fn bash_completions_contain_subcommands() {
    let output = generate_completions(clap_complete::Shell::Bash);
    assert!(!output.is_empty());
    assert!(output.contains("mobitool"));
    assert!(output.contains("info"));
    assert!(output.contains("rawml"));
    assert!(output.contains("completions"));
}

#[test]
fn zsh_completions_are_valid() {
    let output = generate_completions(clap_complete::Shell::Zsh);
    assert!(!output.is_empty());
    assert!(output.contains("mobitool"));
}

#[test]
fn fish_completions_are_valid() {
    let output = generate_completions(clap_complete::Shell::Fish);
    assert!(!output.is_empty());
    assert!(output.contains("mobitool"));
}

#[test]
fn command_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn global_flags_parse_after_subcommand() {
    let args = ["mobitool", "rawml", "-f", "book.azw3", "--kf7", "-vv", "-d", "out"];
    let cli = Cli::try_parse_from(args).unwrap();
    assert!(cli.kf7);
    assert_eq!(cli.verbose, 2);
    match cli.command {
        Commands::Rawml { file, dir, .. } => {
            assert_eq!(file, "book.azw3");
            assert_eq!(dir.as_deref(), Some("out"));
        }
        _ => panic!("expected rawml"),
    }
}

#[test]
fn index_name_defaults_to_ncx() {
    let cli = Cli::try_parse_from(["mobitool", "index", "--file", "book.azw3"]).unwrap();
    match cli.command {
        Commands::Index { name, raw, .. } => {
            assert_eq!(name, "ncx");
            assert!(!raw);
        }
        _ => panic!("expected index"),
    }
}
