mod chunk;
mod compiler;
mod error;
mod hashmap;
mod natives;
mod reporter;
mod scanner;
mod token;
mod value;
mod vm;

use std::fs;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use error::StingError;
use reporter::CliReporter;

/// A bytecode interpreter for sting, a small dynamically typed scripting language.
#[derive(Parser, Debug)]
#[command(name = "sting", version, about)]
struct Cli {
    /// Script to run. Omit to start a REPL.
    path: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print each compiled chunk before running it (requires the
    /// `debug-bytecode` build feature).
    #[arg(long)]
    dump_bytecode: bool,

    /// Print the value stack before every instruction (requires the
    /// `debug-execution` build feature).
    #[arg(long)]
    dump_stack: bool,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run_source(source: &str, cli: &Cli) -> Result<(), StingError> {
    let mut reporter = CliReporter::default();
    let function = compiler::compile(source, &mut reporter).map_err(StingError::from)?;

    #[cfg(feature = "debug-bytecode")]
    if cli.dump_bytecode {
        eprintln!("{:?}", function.chunk);
    }
    #[cfg(not(feature = "debug-bytecode"))]
    if cli.dump_bytecode {
        log::warn!("--dump-bytecode requires building with --features debug-bytecode");
    }

    let mut machine = vm::Vm::new();
    #[cfg(feature = "debug-execution")]
    machine.set_trace_stack(cli.dump_stack);
    #[cfg(not(feature = "debug-execution"))]
    if cli.dump_stack {
        log::warn!("--dump-stack requires building with --features debug-execution");
    }

    machine.interpret(function).map_err(StingError::from)
}

fn run_file(path: &PathBuf, cli: &Cli) -> Result<(), StingError> {
    let source = fs::read_to_string(path)
        .map_err(|e| StingError::Io(format!("could not read {}: {e}", path.display())))?;
    run_source(&source, cli)
}

fn run_repl(cli: &Cli) -> Result<(), StingError> {
    let mut editor =
        DefaultEditor::new().map_err(|e| StingError::Io(format!("could not start REPL: {e}")))?;
    loop {
        match editor.readline("sting> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                if let Err(err) = run_source(&line, cli) {
                    eprintln!("{} {err}", "error:".red().bold());
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(StingError::Io(format!("readline error: {e}"))),
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.path {
        Some(path) => run_file(path, &cli),
        None if std::io::stdin().is_terminal() => run_repl(&cli),
        None => run_file(&PathBuf::from("main.sting"), &cli),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
