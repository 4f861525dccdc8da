use anyhow::Context;
use clap::Parser;
use codesnap::{Config, ConfigFile, Error, Pipeline, TokenizerKind};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const EXIT_CANCELLED: u8 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "codesnap",
    version,
    author,
    about = "Snapshot a code project into token-bounded Markdown parts",
    long_about = "Snapshot a code project into token-bounded Markdown parts.\n\n\
    This tool walks a directory (or a shallow clone of a Git repository), \
    selects source files, and writes them into one or more Markdown documents \
    that each stay within a token budget. Files are never split across parts, \
    and the project structure is listed in the first part.\n\n\
    USAGE EXAMPLES:\n  \
      # Snapshot the current directory\n  \
      codesnap\n\n  \
      # Snapshot a project with a smaller budget\n  \
      codesnap ./my-project -t 8000 -o my_project\n\n  \
      # Snapshot a remote repository\n  \
      codesnap -r https://github.com/org/repo.git\n\n  \
      # Only print the structure tree\n  \
      codesnap ./my-project --test"
)]
struct Cli {
    /// Project folder to snapshot
    #[arg(value_name = "FOLDER", conflicts_with = "repo")]
    folder: Option<PathBuf>,

    /// Output base name (parts are written as NAME.md or NAME_part_N.md)
    #[arg(short, long, value_name = "NAME")]
    output: Option<String>,

    /// Directory receiving the output files
    #[arg(long, value_name = "PATH")]
    out_dir: Option<PathBuf>,

    /// File extensions to include (replaces the defaults)
    #[arg(short, long, num_args = 1.., value_delimiter = ',', value_name = "EXT")]
    extensions: Vec<String>,

    /// Additional directory names to exclude
    #[arg(short = 'x', long, num_args = 1.., value_delimiter = ',', value_name = "DIR")]
    exclude_dirs: Vec<String>,

    /// Additional filename patterns to exclude (e.g. "*.min.js")
    #[arg(short = 'p', long, num_args = 1.., value_delimiter = ',', value_name = "GLOB")]
    exclude_patterns: Vec<String>,

    /// Additional filenames to exclude
    #[arg(short = 'f', long, num_args = 1.., value_delimiter = ',', value_name = "NAME")]
    exclude_files: Vec<String>,

    /// Maximum file size in MB
    #[arg(short, long, value_name = "MB", allow_negative_numbers = true)]
    max_size: Option<f64>,

    /// Token budget per output part
    #[arg(short = 't', long, value_name = "TOKENS")]
    max_tokens: Option<usize>,

    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Git repository URL to shallow-clone and snapshot
    #[arg(short, long, value_name = "URL")]
    repo: Option<String>,

    /// Do not descend into subfolders
    #[arg(short, long)]
    no_subfolders: bool,

    /// Only print the project structure
    #[arg(long)]
    test: bool,

    /// Debug logging
    #[arg(long)]
    debug: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of render workers
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Tokenizer to use
    #[arg(long, value_enum)]
    tokenizer: Option<CliTokenizer>,

    /// Dry run (don't write files)
    #[arg(long)]
    dry_run: bool,

    /// Cancel the run after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Add a generation timestamp to every part
    #[arg(long)]
    timestamp: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Honour .gitignore files
    #[arg(long)]
    respect_gitignore: bool,

    /// Overwrite existing output files without keeping a backup
    #[arg(long)]
    no_backup: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliTokenizer {
    Simple,
    Enhanced,
}

impl From<CliTokenizer> for TokenizerKind {
    fn from(t: CliTokenizer) -> Self {
        match t {
            CliTokenizer::Simple => Self::Simple,
            CliTokenizer::Enhanced => Self::Enhanced,
        }
    }
}

fn main() -> ExitCode {
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            if err.downcast_ref::<Error>().is_some_and(Error::is_partial) {
                ExitCode::from(EXIT_CANCELLED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn try_main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => ConfigFile::load(path).context("Failed to load configuration file")?,
        None => ConfigFile::default(),
    };

    let debug = cli.debug || file.debug.unwrap_or(false);
    setup_tracing(cli.verbose, debug, cli.log_file.as_ref())?;

    let test_mode = cli.test;
    let config = build_config(cli, &file).context("Failed to build configuration")?;
    let pipeline = Pipeline::new(config).context("Failed to create pipeline")?;

    if test_mode {
        let plan = pipeline.plan().context("Failed to scan project")?;
        for document in plan.documents() {
            print!("{}", document?.content);
        }
        return Ok(());
    }

    let stats = pipeline.run().context("Snapshot failed")?;
    stats.print_summary();

    Ok(())
}

fn build_config(cli: Cli, file: &ConfigFile) -> codesnap::Result<Config> {
    let mut builder = Config::builder()
        .config_file(file)
        .dry_run(cli.dry_run)
        .include_timestamp(cli.timestamp)
        .structure_only(cli.test);

    if let Some(folder) = cli.folder {
        builder = builder.root_dir(folder);
    }
    if let Some(repo) = cli.repo {
        builder = builder.repo_url(repo);
    }
    if let Some(output) = cli.output {
        builder = builder.output_base(output);
    }
    if let Some(dir) = cli.out_dir {
        builder = builder.output_dir(dir);
    }
    if !cli.extensions.is_empty() {
        builder = builder.extensions(cli.extensions);
    }
    if let Some(mb) = cli.max_size {
        builder = builder.max_size_mb(mb);
    }
    if let Some(tokens) = cli.max_tokens {
        builder = builder.max_tokens(tokens);
    }
    if cli.no_subfolders {
        builder = builder.recursive(false);
    }
    if let Some(workers) = cli.workers {
        builder = builder.workers(workers);
    }
    if let Some(tokenizer) = cli.tokenizer {
        builder = builder.tokenizer(tokenizer.into());
    }
    if cli.respect_gitignore {
        builder = builder.respect_gitignore(true);
    }
    if cli.no_backup {
        builder = builder.backup_existing(false);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    builder
        .exclude_dirs(cli.exclude_dirs)
        .exclude_patterns(cli.exclude_patterns)
        .exclude_files(cli.exclude_files)
        .build()
}

fn setup_tracing(verbosity: u8, debug: bool, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = match (verbosity, debug) {
        (0, false) => EnvFilter::new("codesnap=info"),
        (0 | 1, _) => EnvFilter::new("codesnap=debug"),
        _ => EnvFilter::new("codesnap=trace"),
    };

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(())
}
