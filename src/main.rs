#[cfg(not(feature = "cli"))]
compile_error!("The `mobitool` binary requires the `cli` feature. Build with `--features cli`.");

use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::process;

use mobi::cli;
use mobi::cli::app::{Cli, ColorMode, Commands};
use mobi::MobiError;

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {} // colored auto-detects tty
    }

    let writer_result: Result<Box<dyn Write>, MobiError> = match &cli.output {
        Some(path) => File::create(path)
            .map(|f| Box::new(f) as Box<dyn Write>)
            .map_err(|e| MobiError::Io(format!("Cannot create {}: {}", path, e))),
        None => Ok(Box::new(std::io::stdout()) as Box<dyn Write>),
    };

    let mut writer = match writer_result {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Info { file, json } => cli::info::execute(
            &cli::info::InfoOptions {
                file,
                json,
                mmap: cli.mmap,
                kf7: cli.kf7,
            },
            &mut writer,
        ),

        Commands::Meta { file, json } => cli::meta::execute(
            &cli::meta::MetaOptions {
                file,
                json,
                mmap: cli.mmap,
                kf7: cli.kf7,
            },
            &mut writer,
        ),

        Commands::Exth { file, tag, json } => cli::exth::execute(
            &cli::exth::ExthOptions {
                file,
                tag,
                json,
                mmap: cli.mmap,
                kf7: cli.kf7,
            },
            &mut writer,
        ),

        Commands::Records { file, json } => cli::records::execute(
            &cli::records::RecordsOptions {
                file,
                json,
                mmap: cli.mmap,
                kf7: cli.kf7,
            },
            &mut writer,
        ),

        Commands::Index {
            file,
            name,
            raw,
            json,
        } => cli::index::execute(
            &cli::index::IndexOptions {
                file,
                name,
                raw,
                json,
                mmap: cli.mmap,
                kf7: cli.kf7,
            },
            &mut writer,
        ),

        Commands::Dump {
            file,
            record,
            length,
            raw,
        } => cli::dump::execute(
            &cli::dump::DumpOptions {
                file,
                record,
                length,
                raw,
                mmap: cli.mmap,
            },
            &mut writer,
        ),

        Commands::Rawml {
            file,
            dir,
            tolerance,
            json,
        } => cli::rawml::execute(
            &cli::rawml::RawmlOptions {
                file,
                dir,
                tolerance,
                json,
                mmap: cli.mmap,
                kf7: cli.kf7,
            },
            &mut writer,
        ),

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "mobitool", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
