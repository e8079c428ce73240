//! Command-line wrapper around the xindex pipeline.

use std::{
    env, fs,
    io::{Read, Write},
    path::PathBuf,
    process::{Command, ExitCode, Stdio},
};

use clap::Parser;
use xindex::{
    StyleEvaluator, XindexError, build_index,
    raw::parse_raw_index,
    render::render_index,
    sexpr::{decode_latin1, decode_text},
};

/// Environment variable with extra style search paths, path-separator
/// joined, prepended before `-L` paths.
const SEARCHPATH_ENV: &str = "XINDY_SEARCHPATH";

#[derive(Debug, Parser)]
#[command(
    name = "xindex",
    version,
    about = "Process a raw index with a style description into a formatted index."
)]
struct Args {
    /// Raw index file, or "-" for stdin.
    raw: String,

    /// Style module(s) to evaluate, in order.
    #[arg(short = 'M', long = "module")]
    modules: Vec<String>,

    /// Output file (default: stdout).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Extra directories for the style search path (repeatable).
    #[arg(short = 'L', long = "search-path")]
    search_paths: Vec<PathBuf>,

    /// Input codepage: utf-8 (with latin-1 fallback) or latin-1.
    #[arg(short = 'C', long = "codepage", default_value = "utf-8")]
    codepage: String,

    /// Pipe the raw input through this shell command first.
    #[arg(short = 'f', long = "filter")]
    filter: Option<String>,

    /// Write log output to this file instead of stderr.
    #[arg(short = 'l', long = "log-file")]
    log_file: Option<PathBuf>,

    /// Emit the built index tree as JSON instead of rendered text.
    #[arg(long)]
    dump_index: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = init_logging(&args) {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(args: &Args) -> Result<(), std::io::Error> {
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(path) = &args.log_file {
        let file = fs::File::create(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn run(args: &Args) -> Result<(), XindexError> {
    let mut evaluator = StyleEvaluator::new();

    // search path priority: XINDY_SEARCHPATH, then -L paths
    evaluator.prepend_search_paths(args.search_paths.iter().cloned());
    if let Some(joined) = env::var_os(SEARCHPATH_ENV) {
        evaluator.prepend_search_paths(env::split_paths(&joined));
    }

    if args.modules.is_empty() {
        log::info!("no style modules given; loading the bundled default");
        evaluator.load_module("default.xdy")?;
    }
    for module in &args.modules {
        evaluator.load_module(module)?;
    }
    let state = evaluator.into_state();

    let raw_text = read_raw_input(args)?;
    let entries = parse_raw_index(&raw_text)?;
    log::info!("read {} raw entries", entries.len());

    let index = build_index(&entries, &state)?;

    let output = if args.dump_index {
        let mut json = serde_json::to_string_pretty(&index)
            .map_err(|err| XindexError::Io(std::io::Error::other(err)))?;
        json.push('\n');
        json
    } else {
        render_index(&index, &state)
    };

    match &args.output {
        Some(path) => fs::write(path, output)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(output.as_bytes())?;
        }
    }
    Ok(())
}

fn read_raw_input(args: &Args) -> Result<String, XindexError> {
    let bytes = if args.raw == "-" {
        let mut buffer = Vec::new();
        std::io::stdin().lock().read_to_end(&mut buffer)?;
        buffer
    } else {
        fs::read(&args.raw)?
    };
    let bytes = match &args.filter {
        Some(command) => run_filter(command, &bytes)?,
        None => bytes,
    };
    match args.codepage.to_lowercase().as_str() {
        "utf-8" | "utf8" => Ok(decode_text(&bytes)),
        "latin-1" | "latin1" | "iso-8859-1" => Ok(decode_latin1(&bytes)),
        other => Err(XindexError::Io(std::io::Error::other(format!(
            "unsupported codepage {other:?}"
        )))),
    }
}

/// Pipes `input` through a shell command, returning its stdout.
fn run_filter(command: &str, input: &[u8]) -> Result<Vec<u8>, XindexError> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input)?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(XindexError::Io(std::io::Error::other(format!(
            "filter command {command:?} failed with {}",
            output.status
        ))));
    }
    Ok(output.stdout)
}
