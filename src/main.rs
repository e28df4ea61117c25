use anyhow::Result;
use bit_rewrite::artifacts::codec::date::DateFormat;
use bit_rewrite::artifacts::codec::integer::{FileSize, IntegerError};
use bit_rewrite::commands::filter::{drop_blobs_over, drop_paths};
use bit_rewrite::commands::print_report;
use bit_rewrite::{Config, Hooks, Pipeline, PrunePolicy, TargetPolicy};
use bstr::BString;
use clap::{Args, Parser, Subcommand};
use is_terminal::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bit-rewrite",
    version = "0.1.0",
    author = "Sami Barbut-Dica",
    about = "Rewrite git fast-export streams",
    long_about = "Reads a git fast-export stream, applies filters to its blobs, commits and tags, \
    repairs the commit graph around whatever was removed and writes a stream for git fast-import.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "filter",
        about = "Rewrite a stream",
        long_about = "This command rewrites a fast-export stream read from a file or standard input \
        and writes the result to a file or standard output."
    )]
    Filter {
        #[arg(index = 1, help = "The stream to read, standard input if omitted")]
        input: Option<PathBuf>,
        #[arg(short, long, help = "Where to write the rewritten stream")]
        output: Option<PathBuf>,
        #[arg(long = "drop-path", value_name = "PREFIX", help = "Remove every path below PREFIX")]
        drop_paths: Vec<String>,
        #[arg(
            long = "strip-blobs-bigger-than",
            value_name = "SIZE",
            value_parser = parse_size,
            help = "Remove blobs larger than SIZE (k, m and g suffixes allowed)"
        )]
        strip_blobs_bigger_than: Option<u64>,
        #[command(flatten)]
        session: SessionArgs,
    },
    #[command(
        name = "check",
        about = "Parse and validate a stream",
        long_about = "This command reads a fast-export stream and reports every problem found, \
        without writing anything."
    )]
    Check {
        #[arg(index = 1, help = "The stream to read, standard input if omitted")]
        input: Option<PathBuf>,
        #[command(flatten)]
        session: SessionArgs,
    },
}

/// Flags layered over the `BIT_REWRITE_*` environment
#[derive(Args)]
struct SessionArgs {
    #[arg(long, value_enum, help = "Date format of identity lines")]
    date_format: Option<DateFormat>,
    #[arg(long, value_enum, help = "Which emptied commits to remove")]
    prune_empty: Option<PrunePolicy>,
    #[arg(long, value_enum, help = "What to do with tags and resets pointing at removed commits")]
    dropped_target: Option<TargetPolicy>,
    #[arg(long, value_parser = parse_size, help = "Largest blob payload a filter may load")]
    big_data_threshold: Option<u64>,
    #[arg(long, help = "Write non-ASCII paths unquoted")]
    no_quote_non_ascii: bool,
    #[arg(long, help = "Accept tags without a tagger line")]
    allow_missing_tagger: bool,
    #[arg(long, help = "Reject parents that are not commits")]
    validate_topology: bool,
}

impl SessionArgs {
    fn config(&self) -> Result<Config> {
        let mut config = Config::load_from_env()?;
        if let Some(date_format) = self.date_format {
            config = config.with_date_format(date_format);
        }
        if let Some(policy) = self.prune_empty {
            config = config.with_prune_empty(policy);
        }
        if let Some(policy) = self.dropped_target {
            config = config.with_dropped_target(policy);
        }
        if let Some(threshold) = self.big_data_threshold {
            config = config.with_big_data_threshold(threshold);
        }
        if self.no_quote_non_ascii {
            config = config.with_quote_non_ascii(false);
        }
        if self.allow_missing_tagger {
            config = config.with_allow_missing_tagger(true);
        }
        if self.validate_topology {
            config = config.with_validate_topology(true);
        }
        Ok(config)
    }
}

fn parse_size(value: &str) -> Result<u64, IntegerError> {
    FileSize::parse(value.as_bytes()).map(|size| size.bytes())
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
    if !std::io::stderr().is_terminal() {
        colored::control::set_override(false);
    }

    let report = match &cli.command {
        Commands::Filter {
            input,
            output,
            drop_paths: prefixes,
            strip_blobs_bigger_than,
            session,
        } => {
            let mut hooks = Hooks::new();
            if !prefixes.is_empty() {
                let prefixes = prefixes.iter().map(|prefix| BString::from(prefix.as_str()));
                hooks.on_filename(drop_paths(prefixes.collect()))?;
            }
            if let Some(limit) = strip_blobs_bigger_than {
                hooks.on_blob(drop_blobs_over(*limit))?;
            }

            let mut pipeline = Pipeline::new(session.config()?, hooks)?;
            pipeline.filter(input.as_deref(), output.as_deref())?
        }
        Commands::Check { input, session } => {
            let mut pipeline = Pipeline::new(session.config()?, Hooks::new())?;
            pipeline.check(input.as_deref())?
        }
    };

    print_report(&report, &mut std::io::stderr().lock())?;

    Ok(if report.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
