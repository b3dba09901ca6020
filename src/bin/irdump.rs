//! Resolve a test IR file and print the result.
//!
//! Reads from a file or stdin. Set `RUST_LOG=debug` for per-procedure
//! summaries, `RUST_LOG=trace` for full bodies after every resolve.

use clap::{Parser, ValueEnum};
use irpipe::core::{CompilationSession, CompileOptions, TargetKind};
use irpipe::test_ir::{parse_ir, render_unit, resolve_text};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Target {
    Native,
    Interpreted,
    Stack,
}

impl From<Target> for TargetKind {
    fn from(target: Target) -> Self {
        match target {
            Target::Native => TargetKind::Native,
            Target::Interpreted => TargetKind::Interpreted,
            Target::Stack => TargetKind::StackMachine,
        }
    }
}

#[derive(Parser)]
#[command(name = "irdump")]
#[command(version)]
#[command(about = "Resolve test IR procedures and print the result", long_about = None)]
struct Cli {
    /// Input file (stdin when omitted)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Backend the IR is prepared for
    #[arg(long, value_enum, default_value = "native")]
    target: Target,

    /// Debug build: never record inline bodies
    #[arg(long)]
    debug: bool,

    /// Hoist trailing cell reads when any argument may write cells
    #[arg(long)]
    eager: bool,

    /// Expand calls to inlinable procedures before resolving callers
    #[arg(long)]
    inline: bool,

    /// Print the parsed IR without resolving
    #[arg(long)]
    parse_only: bool,

    /// Print session statistics at the end
    #[arg(long)]
    stats: bool,
}

fn read_input(file: Option<&PathBuf>) -> io::Result<String> {
    match file {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let text = match read_input(cli.file.as_ref()) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let options = CompileOptions {
        target: cli.target.into(),
        debug: cli.debug,
        eager_ordering: cli.eager,
        ..CompileOptions::default()
    };
    let arena = bumpalo::Bump::new();
    let session = CompilationSession::with_options(&arena, options);

    let result = if cli.parse_only {
        parse_ir(&session, &text)
    } else {
        resolve_text(&session, &text, cli.inline)
    };

    match result {
        Ok(unit) => {
            print!("{}", render_unit(&unit));
            if cli.stats {
                eprint!("{}", session.stats());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
