#![forbid(unsafe_code)]

mod cmd;
mod joblock;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "medley: per-user media statistics, achievements, and rankings",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Path to the statistics database.
    #[arg(long, global = true, default_value = "medley.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags.
    fn output_mode(&self) -> OutputMode {
        OutputMode::from_flag(self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Lifecycle",
        about = "Create or migrate a statistics database",
        long_about = "Create the statistics database, or migrate an existing one to the latest schema.",
        after_help = "EXAMPLES:\n    # Create ./medley.db\n    mdy init\n\n    # Use an explicit path\n    mdy --db stats/medley.db init"
    )]
    Init(cmd::init::InitArgs),

    #[command(next_help_heading = "Lifecycle", about = "Manage users")]
    User {
        #[command(subcommand)]
        command: UserCommand,
    },

    #[command(
        next_help_heading = "Lifecycle",
        about = "Create aggregate rows for a user",
        long_about = "Create zeroed (user, media type) aggregate rows; deltas are rejected until the pair is provisioned.",
        after_help = "EXAMPLES:\n    # All six media types\n    mdy provision mika\n\n    # A subset\n    mdy provision mika series anime"
    )]
    Provision(cmd::provision::ProvisionArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Include an aggregate in rankings",
        long_about = "Mark a (user, media type) aggregate active so rankings and rarity count it.",
        after_help = "EXAMPLES:\n    # Put mika's game stats back on the boards\n    mdy activate mika game"
    )]
    Activate(cmd::provision::ActivateArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Exclude an aggregate from rankings",
        long_about = "Mark a (user, media type) aggregate inactive; history is kept but rankings and rarity skip it.",
        after_help = "EXAMPLES:\n    # Hide mika's manga stats from the boards\n    mdy deactivate mika manga"
    )]
    Deactivate(cmd::provision::ActivateArgs),

    #[command(
        next_help_heading = "Write",
        about = "Apply a delta document to an aggregate",
        long_about = "Fold one delta into a (user, media type) aggregate, append the ledger event, and snapshot the result — atomically.",
        after_help = "EXAMPLES:\n    # From a file\n    mdy apply mika series --media-id 42 --file delta.json\n\n    # From stdin\n    echo '{\"total_entries\": 1, \"status_counts\": {\"planned\": 1}}' | mdy apply mika series"
    )]
    Apply(cmd::apply::ApplyArgs),

    #[command(
        next_help_heading = "Corrections",
        about = "List recent ledger events",
        long_about = "List a user's most recent ledger events, newest first; use the ids with amend and forget.",
        after_help = "EXAMPLES:\n    # Last 10 series events\n    mdy events mika --media-type series --limit 10"
    )]
    Events(cmd::ledger::EventsArgs),

    #[command(
        next_help_heading = "Corrections",
        about = "Amend a recorded ledger event",
        long_about = "Rewrite the mutable fields of one ledger event. Aggregates are not touched; follow up with a compensating apply or a rebuild.",
        after_help = "EXAMPLES:\n    # Fix the unit count\n    mdy amend 17 --specific 24\n\n    # Clear a redo flag\n    mdy amend 17 --redo false"
    )]
    Amend(cmd::ledger::AmendArgs),

    #[command(
        next_help_heading = "Corrections",
        about = "Delete a ledger event",
        long_about = "Delete one ledger event outright. Aggregates are not touched; follow up with a compensating apply or a rebuild.",
        after_help = "EXAMPLES:\n    # Drop a mis-recorded event\n    mdy forget 17"
    )]
    Forget(cmd::ledger::ForgetArgs),

    #[command(
        next_help_heading = "Jobs",
        about = "Recompute aggregates from list entries",
        long_about = "Recompute aggregates from raw list entries, preserving active flags; reports how many pairs had drifted.",
        after_help = "EXAMPLES:\n    # One user\n    mdy rebuild --user mika\n\n    # Everybody\n    mdy rebuild"
    )]
    Rebuild(cmd::rebuild::RebuildArgs),

    #[command(next_help_heading = "Jobs", about = "Manage and inspect achievements")]
    Achievements {
        #[command(subcommand)]
        command: AchievementsCommand,
    },

    #[command(
        next_help_heading = "Jobs",
        about = "Recompute achievement rarity",
        long_about = "Recompute every tier's rarity as completions over the active population of its media type.",
        after_help = "EXAMPLES:\n    # Refresh rarity after a batch run\n    mdy rarity"
    )]
    Rarity(cmd::rarity::RarityArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show a user's aggregates",
        long_about = "Show a user's aggregate counters, for one media type or all of them.",
        after_help = "EXAMPLES:\n    # All media types\n    mdy stats mika\n\n    # One aggregate, as JSON\n    mdy stats mika --media-type series --json"
    )]
    Stats(cmd::stats::StatsArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show activity over time buckets",
        long_about = "Show per-bucket deltas for one (user, media type) pair over a trailing window of snapshots.",
        after_help = "EXAMPLES:\n    # Daily, last 30 days\n    mdy trend mika series\n\n    # Weekly, last quarter\n    mdy trend mika series --days 90 --granularity week"
    )]
    Trend(cmd::trend::TrendArgs),

    #[command(
        next_help_heading = "Read",
        about = "Rank tag values by affinity",
        long_about = "Rank a tag dimension's values by affinity score, for one user or across everyone.",
        after_help = "EXAMPLES:\n    # A user's genre affinity in anime\n    mdy top anime genre --user mika\n\n    # Global director ranking\n    mdy top movie director"
    )]
    Top(cmd::top::TopArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show the hall of fame",
        long_about = "Rank active users by normalized cross-media score, raw time, or one media type's time.",
        after_help = "EXAMPLES:\n    # Page 1 by score\n    mdy hof\n\n    # By game time, with my own rank\n    mdy hof --sort game --me mika"
    )]
    Hof(cmd::hof::HofArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Fill a database with demo data",
        long_about = "Create demo users and replay a seeded random history through the write path, so every read command has material.",
        after_help = "EXAMPLES:\n    # Six demo users\n    mdy seed\n\n    # Bigger, reproducible\n    mdy seed --users 20 --entries 12 --seed 7"
    )]
    Seed(cmd::seed::SeedArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    mdy completions bash\n\n    # Generate zsh completions\n    mdy completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    #[command(
        about = "Create a user",
        after_help = "EXAMPLES:\n    # Create a user named mika\n    mdy user add mika"
    )]
    Add(cmd::user::AddArgs),
}

#[derive(Subcommand, Debug)]
enum AchievementsCommand {
    #[command(
        about = "Load an achievement catalog",
        long_about = "Load a TOML achievement catalog; achievements are upserted by code name and tier thresholds replaced.",
        after_help = "EXAMPLES:\n    # Install or refresh the catalog\n    mdy achievements load catalog.toml"
    )]
    Load(cmd::achievements::LoadArgs),

    #[command(
        about = "Run the achievement batch",
        long_about = "Recompute achievement progress for the whole population, one achievement at a time. Safe to rerun: an unchanged store yields no writes.",
        after_help = "EXAMPLES:\n    # Nightly batch\n    mdy achievements run"
    )]
    Run(cmd::achievements::RunArgs),

    #[command(
        about = "List a user's achievement progress",
        after_help = "EXAMPLES:\n    # Everything, with per-difficulty summary\n    mdy achievements list mika\n\n    # Completed anime achievements only\n    mdy achievements list mika --media-type anime --completed"
    )]
    List(cmd::achievements::ListArgs),
}

const DEBUG_FILTER: &str =
    "mdy=debug,medley_core=debug,medley_achieve=debug,medley_rank=debug,info";
const DEFAULT_FILTER: &str =
    "mdy=info,medley_core=info,medley_achieve=info,medley_rank=info,warn";

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("MEDLEY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            DEBUG_FILTER
        } else {
            DEFAULT_FILTER
        })
    });

    let format = env::var("MEDLEY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = cli.output_mode();
    let db = &cli.db;

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, output, db),
        Commands::User {
            command: UserCommand::Add(ref args),
        } => cmd::user::run_add(args, output, db),
        Commands::Provision(ref args) => cmd::provision::run_provision(args, output, db),
        Commands::Activate(ref args) => cmd::provision::run_set_active(args, true, output, db),
        Commands::Deactivate(ref args) => cmd::provision::run_set_active(args, false, output, db),
        Commands::Apply(ref args) => cmd::apply::run_apply(args, output, db),
        Commands::Events(ref args) => cmd::ledger::run_events(args, output, db),
        Commands::Amend(ref args) => cmd::ledger::run_amend(args, output, db),
        Commands::Forget(ref args) => cmd::ledger::run_forget(args, output, db),
        Commands::Rebuild(ref args) => cmd::rebuild::run_rebuild(args, output, db),
        Commands::Achievements { ref command } => match command {
            AchievementsCommand::Load(args) => cmd::achievements::run_load(args, output, db),
            AchievementsCommand::Run(args) => cmd::achievements::run_batch(args, output, db),
            AchievementsCommand::List(args) => cmd::achievements::run_list(args, output, db),
        },
        Commands::Rarity(ref args) => cmd::rarity::run_rarity(args, output, db),
        Commands::Stats(ref args) => cmd::stats::run_stats(args, output, db),
        Commands::Trend(ref args) => cmd::trend::run_trend(args, output, db),
        Commands::Top(ref args) => cmd::top::run_top(args, output, db),
        Commands::Hof(ref args) => cmd::hof::run_hof(args, output, db),
        Commands::Seed(ref args) => cmd::seed::run_seed(args, output, db),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command, &mut std::io::stdout())
        }
    }
}
