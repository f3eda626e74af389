mod debug_report;

use std::io::{self, IsTerminal, Read};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use once_cell::sync::Lazy;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use syntagma::GrammarError;
use syntagma::grammars::{ExpressionGrammar, FloatGrammar, IntegerGrammar, ValueGrammar};

static INTEGER: Lazy<Result<IntegerGrammar, GrammarError>> = Lazy::new(IntegerGrammar::new);
static FLOAT: Lazy<Result<FloatGrammar, GrammarError>> = Lazy::new(FloatGrammar::new);
static EXPRESSION: Lazy<Result<ExpressionGrammar, GrammarError>> = Lazy::new(ExpressionGrammar::new);

/// Match text against a built-in grammar and print the token tree.
///
/// Exit codes: 0 on a match, 1 when nothing matched, 2 for invalid arguments,
/// missing input or a grammar that failed to link.
#[derive(Parser)]
#[command(name = "syntagma", version)]
struct Cli {
    /// Grammar to match with.
    #[arg(short, long, value_enum, default_value_t = Builtin::Expression)]
    grammar: Builtin,

    /// Scan forward for the first match instead of anchoring at the offset.
    #[arg(long)]
    find: bool,

    /// Byte offset to start matching at.
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Print the grammar in DSL form before the report.
    #[arg(long)]
    explain: bool,

    /// Force ANSI color output.
    #[arg(long, conflicts_with = "no_color")]
    color: bool,

    /// Disable ANSI color output.
    #[arg(long)]
    no_color: bool,

    #[arg(long, value_enum, env = "SYNTAGMA_LOG", default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    /// Input text. Read from stdin when omitted.
    input: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Builtin {
    Integer,
    Float,
    Expression,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) =
        TermLogger::init(cli.log_level.into(), ConfigBuilder::new().build(), TerminalMode::Stderr, ColorChoice::Never)
    {
        eprintln!("warning: logger not installed: {err}");
    }

    let input = match read_input(&cli.input) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };
    let color = if cli.no_color { false } else { cli.color || io::stdout().is_terminal() };

    match cli.grammar {
        Builtin::Integer => run(&*INTEGER, &cli, &input, color),
        Builtin::Float => run(&*FLOAT, &cli, &input, color),
        Builtin::Expression => run(&*EXPRESSION, &cli, &input, color),
    }
}

fn run<G: ValueGrammar>(builtin: &Result<G, GrammarError>, cli: &Cli, input: &str, color: bool) -> ExitCode {
    let builtin = match builtin {
        Ok(builtin) => builtin,
        Err(err) => {
            eprintln!("error: grammar failed to link: {err}");
            return ExitCode::from(2);
        }
    };

    let text = input.as_bytes();
    let grammar = builtin.grammar();
    let run = if cli.find { grammar.find_verbose(text, cli.offset) } else { grammar.match_verbose(text, cli.offset) };
    let value = run.result.as_ref().ok().and_then(|tree| builtin.read(text, tree.root())).map(|v| v.to_string());

    debug_report::print_run(
        &debug_report::Report { input, grammar, run: &run, value: value.as_deref(), explain: cli.explain },
        color,
    );
    if run.result.is_ok() { ExitCode::SUCCESS } else { ExitCode::from(1) }
}

fn read_input(args: &[String]) -> Result<String, String> {
    let input = if args.is_empty() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
        buffer.trim_end_matches(['\r', '\n']).to_owned()
    } else {
        args.join(" ")
    };

    if input.is_empty() {
        return Err("error: no input provided (pass text as arguments or on stdin)".to_owned());
    }
    Ok(input)
}
