use clap::{Args, Parser, Subcommand};
use console::style;
use env_logger::{Target, WriteStyle};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{LevelFilter, error, info, warn};
use shelf_lib::commands;
use shelf_lib::commands::app::AppError;
use shelf_lib::commands::publish::{BookFiles, PublishOptions, PublishRequest};
use shelf_lib::config::{Settings, SettingsError};
use shelf_lib::domain::{ProgressSink, PublishStage, StageState};
use std::error::Error as _;
use std::io::{self, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Top-level error type for the shelf CLI binary
#[derive(Debug, Error)]
enum ShelfError {
    /// Command orchestration failed.
    #[error(transparent)]
    App(#[from] AppError),

    /// The settings file could not be located or read.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Publish books to a GitHub-hosted library site", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file to use instead of the per-user one
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a book's files and add it to the catalog
    Publish(PublishArgs),
    /// Show the books in the catalog
    List,
    /// Read or change the stored settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct PublishArgs {
    /// Book title; also determines the remote folder
    #[arg(long)]
    title: String,

    #[arg(long)]
    description: String,

    /// Cover image
    #[arg(long, value_name = "FILE")]
    cover: Option<PathBuf>,

    /// Infographic image
    #[arg(long, value_name = "FILE")]
    infographic: Option<PathBuf>,

    /// Persian narration
    #[arg(long, value_name = "FILE")]
    audio_persian: Option<PathBuf>,

    /// English narration (optional)
    #[arg(long, value_name = "FILE")]
    audio_english: Option<PathBuf>,

    /// The book as PDF
    #[arg(long, value_name = "FILE")]
    pdf: Option<PathBuf>,

    /// Validate and print the remote layout without uploading
    #[arg(long)]
    dry_run: bool,

    /// Refuse to publish if a book with the same folder is already listed
    #[arg(long)]
    require_unique: bool,

    /// Attempts for the catalog update when another publish raced it
    #[arg(long, value_name = "N", default_value_t = 1)]
    retries: u32,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Store one or more settings
    Set {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        repository: Option<String>,
        #[arg(long)]
        branch: Option<String>,
        /// Personal access token with contents write permission
        #[arg(long)]
        token: Option<String>,
        /// Directory in the repository that holds the catalog
        #[arg(long)]
        content_root: Option<String>,
    },
    /// Print the stored settings (token masked)
    Show,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let bars = MultiProgress::new();

    init_logging(&cli, &bars);

    match run(cli, &bars) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            let mut source = e.source();
            while let Some(cause) = source {
                error!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, bars: &MultiProgress) -> Result<(), ShelfError> {
    let settings_path = match cli.config {
        Some(path) => path,
        None => Settings::default_path()?,
    };

    match cli.command {
        Commands::Publish(args) => {
            let settings = Settings::load(&settings_path)?
                .with_token_override(std::env::var("GITHUB_TOKEN").ok());
            publish(&settings, args, bars)?;
        }
        Commands::List => {
            let settings = Settings::load(&settings_path)?
                .with_token_override(std::env::var("GITHUB_TOKEN").ok());
            let books = commands::app::list(&settings)?;
            if books.is_empty() {
                info!("The catalog is empty.");
            }
            for book in books {
                info!("{} ({})", style(&book.title).bold(), book.folder);
                for (kind, path) in book.assets {
                    info!("  {kind:<13} {path}");
                }
            }
        }
        Commands::Config {
            action:
                ConfigAction::Set {
                    owner,
                    repository,
                    branch,
                    token,
                    content_root,
                },
        } => {
            let update = Settings {
                owner,
                repository,
                branch,
                token,
                content_root,
            };
            let settings = commands::app::configure(&settings_path, update)?;
            info!("Saved settings to {}", settings_path.display());
            show_settings(&settings);
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => {
            let settings = Settings::load(&settings_path)?;
            info!("Settings file: {}", settings_path.display());
            show_settings(&settings);
        }
    }
    Ok(())
}

fn publish(
    settings: &Settings,
    args: PublishArgs,
    bars: &MultiProgress,
) -> Result<(), ShelfError> {
    let request = PublishRequest {
        title: args.title,
        description: args.description,
        files: BookFiles {
            cover: args.cover,
            infographic: args.infographic,
            audio_persian: args.audio_persian,
            audio_english: args.audio_english,
            pdf: args.pdf,
        },
    };

    if args.dry_run {
        let plan = commands::app::plan(settings, &request)?;
        info!("Folder: {}", style(plan.folder()).bold());
        for upload in plan.uploads() {
            info!("  {} -> {}", upload.local.display(), upload.remote);
        }
        info!("  catalog entry -> {}", plan.manifest_path());
        return Ok(());
    }

    let options = PublishOptions {
        require_unique_folder: args.require_unique,
        manifest_attempts: args.retries,
    };
    let mut progress = BarProgress::new(bars);
    let result = commands::app::publish(settings, &request, options, &mut progress);
    progress.finish(result.is_ok());

    let report = result?;
    info!(
        "{} \"{}\" is live in {} ({} files)",
        style("Published").green().bold(),
        report.entry.title,
        report.folder,
        report.uploaded.len()
    );
    Ok(())
}

fn show_settings(settings: &Settings) {
    let field = |value: Option<&str>| value.unwrap_or("<unset>").to_owned();
    info!("  owner:        {}", field(settings.owner.as_deref()));
    info!("  repository:   {}", field(settings.repository.as_deref()));
    info!("  branch:       {}", field(settings.branch.as_deref()));
    info!(
        "  token:        {}",
        if settings.token.is_some() { "***" } else { "<unset>" }
    );
    info!("  content root: {}", field(settings.content_root.as_deref()));
}

/// Progress bar over the four publish stages.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(bars: &MultiProgress) -> Self {
        let stages = u64::try_from(PublishStage::ALL.len()).unwrap_or_default();
        let bar = bars.add(ProgressBar::new(stages));
        match ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_msg}") {
            Ok(bar_style) => bar.set_style(bar_style),
            Err(e) => warn!("Progress bar template rejected: {e}"),
        }
        Self { bar }
    }

    fn finish(&self, success: bool) {
        if success {
            self.bar.finish_and_clear();
        } else {
            self.bar.abandon();
        }
    }
}

impl ProgressSink for BarProgress {
    fn stage_changed(&mut self, stage: PublishStage, state: StageState) {
        match state {
            StageState::Active => self.bar.set_message(format!("{stage}...")),
            StageState::Completed => self.bar.inc(1),
            StageState::Failed => self
                .bar
                .set_message(format!("{} {stage}", style("failed").red())),
            StageState::Pending => {}
        }
    }

    fn file_uploaded(&mut self, stage: PublishStage, path: &str) {
        self.bar.set_message(format!("{stage}: uploaded {path}"));
    }
}

/// Log sink that hides active progress bars while a record is written, so
/// log lines are never drawn over a bar.
struct BarAwareStderr {
    bars: MultiProgress,
}

impl io::Write for BarAwareStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bars.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Initialize logging based on the verbosity level specified in the CLI
fn init_logging(cli: &Cli, bars: &MultiProgress) {
    let write_style = if console::colors_enabled_stderr() {
        WriteStyle::Always
    } else {
        WriteStyle::Never
    };

    let mut builder = env_logger::builder();
    builder
        .target(Target::Pipe(Box::new(BarAwareStderr { bars: bars.clone() })))
        .write_style(write_style)
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .format(|buf, record| {
            let level = record.level();
            let style = &buf.default_level_style(level);
            writeln!(buf, "[{style}{level}{style:#}] {}", record.args())
        });

    if !cli.verbose {
        builder.format_timestamp(None);
    }

    builder.init();
}
