//! # AIDS Harvest CLI (`aids`)
//!
//! Harvests stories and scenarios from the service's GraphQL API into
//! local JSON files, and re-uploads scenarios.
//!
//! ## Usage
//!
//! ```bash
//! aids --config ./config/aids.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `aids stories` | Harvest stories above the action threshold |
//! | `aids scenarios` | Harvest scenarios and their option trees |
//! | `aids all` | Harvest scenarios, then stories |
//! | `aids upload` | Upload scenarios from a file (harvesting first if missing) |
//! | `aids status` | Show item and backup counts on disk |
//! | `aids makenai` | Convert scenarios.json into NovelAI `.scenario` files |
//! | `aids makejson` | Convert NovelAI `.scenario` files into scenarios.json |
//! | `aids completions <shell>` | Print a shell completion script |
//!
//! Credentials are read from `AIDS_USERNAME` and `AIDS_PASSWORD`.

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use aids_harvest::config;
use aids_harvest::logger;
use aids_harvest::models::ContentKind;
use aids_harvest::progress::ProgressMode;
use aids_harvest::run::{self, HarvestOptions};

/// AIDS Harvest: back up your saved stories and scenarios.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/aids.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "aids",
    about = "Harvest, deduplicate, and back up stories and scenarios",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/aids.toml`. A missing file means defaults for
    /// every setting.
    #[arg(long, global = true, default_value = "./config/aids.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Harvest stories.
    ///
    /// Without a title, stops at the first story that has too few actions.
    Stories(HarvestArgs),

    /// Harvest scenarios, including every nested option.
    Scenarios(HarvestArgs),

    /// Harvest scenarios, then stories.
    All(HarvestArgs),

    /// Upload scenarios to the logged-in account.
    ///
    /// Nested options are skipped.
    Upload {
        /// Scenarios file. Defaults to `[storage].scenarios_path`; harvested
        /// first if it does not exist.
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Show item counts of the saved files and retained backups.
    Status,

    /// Convert harvested scenarios into NovelAI `.scenario` files.
    #[command(name = "makenai")]
    MakeNai {
        /// Scenarios file. Defaults to `[storage].scenarios_path`.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Directory for the `.scenario` files.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Write one JSON array to this file instead of one file per scenario.
        #[arg(long)]
        bundle: Option<PathBuf>,
    },

    /// Convert NovelAI `.scenario` files into a scenarios file.
    #[command(name = "makejson")]
    MakeJson {
        /// Directory to search.
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// Glob relative to `--dir`; repeatable. `**` crosses directories.
        #[arg(long = "pattern", default_value = "*.scenario")]
        patterns: Vec<String>,

        /// Output file. Defaults to `[storage].scenarios_path`.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Keep the scenarios already in the output file.
        #[arg(long)]
        merge: bool,
    },

    /// Print a shell completion script to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
struct HarvestArgs {
    /// Only keep items with exactly this title.
    #[arg(long)]
    title: Option<String>,

    /// Stories need strictly more actions than this.
    #[arg(long)]
    min_actions: Option<usize>,

    /// Load the existing output file first and keep its items.
    #[arg(long)]
    merge: bool,

    /// Progress output on stderr. Defaults to `human` on a terminal.
    #[arg(long, value_enum)]
    progress: Option<ProgressMode>,
}

impl HarvestArgs {
    fn into_options(self) -> HarvestOptions {
        HarvestOptions {
            title: self.title,
            min_actions: self.min_actions,
            merge: self.merge,
            progress: self.progress.unwrap_or_else(ProgressMode::default_for_tty),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "aids", &mut std::io::stdout());
        return Ok(());
    }

    logger::init("info");
    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Stories(args) => {
            run::run_harvest(&cfg, &[ContentKind::Story], &args.into_options()).await?;
        }
        Commands::Scenarios(args) => {
            run::run_harvest(&cfg, &[ContentKind::Scenario], &args.into_options()).await?;
        }
        Commands::All(args) => {
            run::run_harvest(
                &cfg,
                &[ContentKind::Scenario, ContentKind::Story],
                &args.into_options(),
            )
            .await?;
        }
        Commands::Upload { file, progress } => {
            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            run::run_upload(&cfg, file, progress).await?;
        }
        Commands::Status => {
            run::run_status(&cfg)?;
        }
        Commands::MakeNai {
            file,
            out_dir,
            bundle,
        } => {
            run::run_makenai(&cfg, file, &out_dir, bundle)?;
        }
        Commands::MakeJson {
            dir,
            patterns,
            out,
            merge,
        } => {
            run::run_makejson(&cfg, &dir, &patterns, out, merge)?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
