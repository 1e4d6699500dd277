mod init;
mod status;
mod ui;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use certcode_client::{CertClient, SubmitResult, DEFAULT_CONCURRENCY};
use certcode_core::{CodeTrace, CollectOptions, Collector, Config, VerificationOptions};
use certcode_diff::{parse_diff, GitDiff, Language};
use certcode_logging::{init_tracing, LogEvent, LogFormat, Logger};

#[derive(Parser, Debug)]
#[command(
    name = "cert-code",
    about = "Evaluate AI-generated code changes with CERT",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: nearest .cert-code.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Working directory (default: current directory)
    #[arg(short = 'C', long, global = true)]
    working_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatChoice,

    /// Also append JSON log events to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Collect a code change, verify it and submit it to CERT
    Submit(SubmitArgs),
    /// Create a .cert-code.toml in the working directory
    Init {
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },
    /// Show configuration and check API connectivity
    Status,
}

#[derive(Args, Debug)]
struct SubmitArgs {
    /// Task description (what the AI was asked to do)
    #[arg(short, long)]
    task: String,

    /// Unified diff text (instead of reading from git)
    #[arg(short, long, conflicts_with = "diff_file")]
    diff: Option<String>,

    /// Read a diff from a file, `-` for stdin. Repeat to submit a batch.
    #[arg(long)]
    diff_file: Vec<PathBuf>,

    /// Git reference (commit, branch, tag)
    #[arg(long = "ref", default_value = "HEAD")]
    reference: String,

    /// Base reference: submit `base..ref` instead of a single commit
    #[arg(long)]
    base_ref: Option<String>,

    /// Submit staged changes instead of a commit
    #[arg(long, conflicts_with_all = ["diff", "diff_file", "base_ref", "working"])]
    staged: bool,

    /// Submit uncommitted changes in the working tree instead of a commit
    #[arg(long, conflicts_with_all = ["diff", "diff_file", "base_ref"])]
    working: bool,

    /// With --working, include untracked files
    #[arg(long, requires = "working")]
    untracked: bool,

    /// Run the test suite
    #[arg(long, overrides_with = "no_tests")]
    run_tests: bool,

    #[arg(long, hide = true)]
    no_tests: bool,

    /// Run the linter
    #[arg(long, overrides_with = "no_lint")]
    run_lint: bool,

    #[arg(long, hide = true)]
    no_lint: bool,

    /// Run the type checker
    #[arg(long, overrides_with = "no_typecheck")]
    run_typecheck: bool,

    #[arg(long, hide = true)]
    no_typecheck: bool,

    /// Context file to ground the evaluation (repeatable)
    #[arg(short, long)]
    context: Vec<PathBuf>,

    /// Override language detection
    #[arg(short, long)]
    language: Option<Language>,

    /// Code generation tool, e.g. claude-code or cursor
    #[arg(long)]
    tool: Option<String>,

    /// Conversation the change came from
    #[arg(long)]
    conversation_id: Option<String>,

    /// CERT project id (overrides config)
    #[arg(short, long)]
    project: Option<String>,

    /// Requests in flight when submitting several diffs
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Show what would be submitted without submitting
    #[arg(long)]
    dry_run: bool,

    /// Print the submission result as JSON on stdout
    #[arg(long)]
    json_output: bool,
}

impl SubmitArgs {
    fn verification(&self) -> VerificationOptions {
        VerificationOptions {
            run_tests: tri_state(self.run_tests, self.no_tests),
            run_lint: tri_state(self.run_lint, self.no_lint),
            run_typecheck: tri_state(self.run_typecheck, self.no_typecheck),
        }
    }

    fn collect_options(&self) -> CollectOptions {
        CollectOptions {
            verification: self.verification(),
            context_files: (!self.context.is_empty()).then(|| self.context.clone()),
            language: self.language,
            tool: self.tool.clone(),
            conversation_id: self.conversation_id.clone(),
            project_id: self.project.clone(),
        }
    }
}

/// `--flag` / `--no-flag` pair: unset means "use the config"
fn tri_state(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

/// Where the code change comes from
#[derive(Debug, PartialEq)]
enum DiffSource {
    Text(Vec<String>),
    Commit,
    Staged,
    Working { include_untracked: bool },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    init_tracing("warn", log_format);

    let working_dir = match &cli.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init { force } => init::handle_init(&working_dir, *force),
        Commands::Status => {
            let config = Config::load(cli.config.as_deref(), &working_dir)
                .context("Failed to load configuration")?;
            let config_file = cli.config.clone().or_else(|| Config::find(&working_dir));
            status::handle_status(&config, config_file.as_deref()).await
        }
        Commands::Submit(args) => {
            let config = Config::load(cli.config.as_deref(), &working_dir)
                .context("Failed to load configuration")?;
            let logger = match &cli.log_file {
                Some(path) => Logger::with_file(log_format, path)
                    .with_context(|| format!("Failed to open log file {}", path.display()))?,
                None => Logger::new(log_format),
            };

            let all_passed =
                handle_submit(args, &config, &working_dir, Arc::new(logger)).await?;
            if !all_passed {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Returns whether every submission succeeded
async fn handle_submit(
    args: &SubmitArgs,
    config: &Config,
    working_dir: &Path,
    logger: Arc<Logger>,
) -> Result<bool> {
    let source = read_diff_source(args)?;

    if args.dry_run {
        dry_run(args, config, working_dir, &source)?;
        return Ok(true);
    }

    // Fail on a missing key before spending time on verification
    let client = CertClient::new(&config.api)
        .context("Configuration error (run `cert-code init` to create a config file)")?
        .with_project_id(config.project.id.clone());

    logger.log(&LogEvent::SubmitStarted {
        task: args.task.clone(),
        working_dir: working_dir.to_path_buf(),
    });

    let collector = Collector::new(config, working_dir).with_logger(logger.clone());
    let options = args.collect_options();

    let traces: Vec<CodeTrace> = match &source {
        DiffSource::Commit => vec![collector
            .from_commit(
                &args.task,
                &args.reference,
                args.base_ref.as_deref(),
                &options,
            )
            .await
            .context("Failed to collect code change")?],
        DiffSource::Staged => vec![collector
            .from_staged(&args.task, &options)
            .await
            .context("Failed to collect staged changes")?],
        DiffSource::Working { include_untracked } => vec![collector
            .from_working_tree(&args.task, *include_untracked, &options)
            .await
            .context("Failed to collect working tree changes")?],
        DiffSource::Text(diffs) => {
            let mut traces = Vec::with_capacity(diffs.len());
            for diff in diffs {
                traces.push(
                    collector
                        .from_diff(&args.task, diff, &options)
                        .await
                        .context("Failed to collect code change")?,
                );
            }
            traces
        }
    };

    let start = Instant::now();
    let results = client.submit_batch(&traces, args.concurrency).await;

    for result in &results {
        if result.success {
            logger.log(&LogEvent::TraceSubmitted {
                trace_id: result.trace_id.clone(),
            });
        } else {
            logger.log(&LogEvent::SubmitFailed {
                error: result.error.clone().unwrap_or_default(),
            });
        }
    }

    let failed = results.iter().filter(|r| !r.success).count();
    if results.len() > 1 {
        logger.log(&LogEvent::BatchCompleted {
            submitted: results.len() - failed,
            failed,
            duration_secs: start.elapsed().as_secs_f64(),
        });
    }

    print_results(&results, args.json_output)?;
    Ok(failed == 0)
}

fn read_diff_source(args: &SubmitArgs) -> Result<DiffSource> {
    if let Some(diff) = &args.diff {
        return Ok(DiffSource::Text(vec![diff.clone()]));
    }
    if args.staged {
        return Ok(DiffSource::Staged);
    }
    if args.working {
        return Ok(DiffSource::Working {
            include_untracked: args.untracked,
        });
    }
    if args.diff_file.is_empty() {
        return Ok(DiffSource::Commit);
    }

    let mut diffs = Vec::with_capacity(args.diff_file.len());
    for path in &args.diff_file {
        let diff = if path == Path::new("-") {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read diff from stdin")?;
            buf
        } else {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read diff file {}", path.display()))?
        };
        diffs.push(diff);
    }
    Ok(DiffSource::Text(diffs))
}

fn dry_run(args: &SubmitArgs, config: &Config, working_dir: &Path, source: &DiffSource) -> Result<()> {
    let diffs = match source {
        DiffSource::Text(diffs) => diffs.clone(),
        DiffSource::Commit => {
            let git = GitDiff::discover(working_dir)?;
            vec![git.diff_for(&args.reference, args.base_ref.as_deref())?]
        }
        DiffSource::Staged => vec![GitDiff::discover(working_dir)?.staged_diff()?],
        DiffSource::Working { include_untracked } => {
            vec![GitDiff::discover(working_dir)?.working_diff(*include_untracked)?]
        }
    };

    let verification = args.verification();
    let behavior = &config.behavior;
    let plan = ui::DryRunPlan {
        task: &args.task,
        tool: args.tool.as_deref(),
        run_tests: verification.run_tests.unwrap_or(behavior.auto_run_tests),
        run_lint: verification.run_lint.unwrap_or(behavior.auto_run_lint),
        run_typecheck: verification
            .run_typecheck
            .unwrap_or(behavior.auto_run_typecheck),
    };

    let mut artifacts = Vec::with_capacity(diffs.len());
    for diff in &diffs {
        if diff.trim().is_empty() {
            anyhow::bail!("No changes found: the diff is empty");
        }
        artifacts.push(parse_diff(diff, args.language));
    }

    if args.json_output {
        println!("{}", serde_json::to_string_pretty(&artifacts)?);
    } else {
        for artifact in &artifacts {
            ui::print_dry_run(&plan, artifact);
        }
    }
    Ok(())
}

fn print_results(results: &[SubmitResult], json_output: bool) -> Result<()> {
    if json_output {
        let json = match results {
            [single] => serde_json::to_string_pretty(single)?,
            _ => serde_json::to_string_pretty(results)?,
        };
        println!("{}", json);
    } else {
        for result in results {
            ui::print_submit_result(result);
        }
    }
    Ok(())
}
