use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ewpascal::{lexer, sema, CompileError, CompileOptions, Framing, SemanticWarning};

#[derive(Parser, Debug)]
#[command(name = "ewpascal", version, about = "Compile a Pascal subset to EWVM assembly")]
struct Cli {
    /// Source file; read from stdin when absent
    source: Option<PathBuf>,

    /// Output file. Defaults to SOURCE with an `.ewvm` extension, or stdout
    /// when reading from stdin.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the token stream and stop
    #[arg(long)]
    tokens: bool,

    /// Print the syntax tree and stop
    #[arg(long)]
    ast: bool,

    /// Stop after semantic analysis
    #[arg(long)]
    check: bool,

    /// Leave out the START/STOP framing
    #[arg(long)]
    no_prologue: bool,

    /// -v for debug logs, -vv for trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("cannot read {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("cannot write {path}: {source}")]
    Write { path: String, source: io::Error },
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("{0} lexical error(s)")]
    Lexical(usize),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let src = match read_source(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    match run(&cli, &src) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Compile(e)) => {
            report(&src, &e);
            ExitCode::FAILURE
        }
        Err(CliError::Lexical(_)) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "off",
        1 => "ewpascal=debug",
        _ => "ewpascal=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_source(cli: &Cli) -> Result<String, CliError> {
    match &cli.source {
        Some(path) => fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.display().to_string(),
            source,
        }),
        None => {
            let mut s = String::new();
            io::stdin()
                .read_to_string(&mut s)
                .map_err(|source| CliError::Read {
                    path: "<stdin>".to_string(),
                    source,
                })?;
            Ok(s)
        }
    }
}

fn run(cli: &Cli, src: &str) -> Result<(), CliError> {
    if cli.tokens {
        let lexed = lexer::tokenize(src);
        for t in &lexed.tokens {
            println!("{}\t{}", t.line, t.kind);
        }
        for e in &lexed.errors {
            eprintln!("error: {e}");
        }
        return match lexed.errors.len() {
            0 => Ok(()),
            n => Err(CliError::Lexical(n)),
        };
    }

    if cli.ast {
        let program = ewpascal::parse(src)?;
        println!("{program:#?}");
        return Ok(());
    }

    if cli.check {
        let program = ewpascal::parse(src)?;
        let analysis = sema::analyze(&program);
        if !analysis.is_ok() {
            return Err(CompileError::Rejected {
                lexical: vec![],
                semantic: analysis.errors,
                warnings: analysis.warnings,
            }
            .into());
        }
        print_warnings(&analysis.warnings);
        return Ok(());
    }

    let mut opts = CompileOptions::default();
    if cli.no_prologue {
        opts = opts.with_framing(Framing::bare());
    }
    let compiled = ewpascal::compile_with(src, &opts)?;
    print_warnings(&compiled.warnings);

    let out_path = cli
        .output
        .clone()
        .or_else(|| cli.source.as_ref().map(|p| p.with_extension("ewvm")));
    match out_path {
        Some(path) => {
            fs::write(&path, compiled.listing()).map_err(|source| CliError::Write {
                path: path.display().to_string(),
                source,
            })?;
            info!(path = %path.display(), "wrote listing");
        }
        None => print!("{}", compiled.listing()),
    }
    Ok(())
}

fn print_warnings(warnings: &[SemanticWarning]) {
    for w in warnings {
        eprintln!("warning: {w}");
    }
}

fn report(src: &str, err: &CompileError) {
    match err {
        CompileError::Syntax(e) => {
            eprintln!("error: {e}");
            if let Some(hint) = source_line(src, e.line) {
                eprintln!("{hint}");
            }
        }
        CompileError::Rejected { lexical, .. } => {
            for e in lexical {
                eprintln!("error: {e}");
                if let Some(hint) = source_line(src, e.line()) {
                    eprintln!("{hint}");
                }
            }
            for d in err.diagnostics().iter().skip(lexical.len()) {
                eprintln!("error: {d}");
            }
        }
        CompileError::Codegen(e) => eprintln!("error: {e}"),
    }
    print_warnings(err.warnings());
}

fn source_line(src: &str, line: usize) -> Option<String> {
    let text = src.lines().nth(line.checked_sub(1)?)?;
    Some(format!("  {line} | {}", text.trim_end()))
}
