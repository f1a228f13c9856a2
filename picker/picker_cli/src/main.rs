use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use picker_core::{
    recommend::{advice, recommend},
    NoopKind, Outcome, PickerConfig, PickerSession, TextFileSource,
};
use serde_json::json;
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(name = "picker", version, about = "Spin a name wheel or organize names into groups")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ranks group sizes for a headcount or a list of names.
    Recommend {
        /// Headcount to rank sizes for; defaults to the number of names given.
        #[arg(long)]
        count: Option<usize>,
        #[command(flatten)]
        names: NamesArgs,
    },
    /// Spins the wheel once and prints the winner.
    Spin {
        #[command(flatten)]
        names: NamesArgs,
        /// Overrides the settle delay in milliseconds.
        #[arg(long)]
        settle_ms: Option<u64>,
    },
    /// Shuffles the names into groups.
    Groups {
        #[command(flatten)]
        names: NamesArgs,
        /// Members per group; defaults to the top recommendation.
        #[arg(long)]
        size: Option<usize>,
    },
}

#[derive(Args, Debug)]
struct NamesArgs {
    /// A participant name (repeatable).
    #[arg(long = "name")]
    names: Vec<String>,
    /// Text or CSV file, one row per line, cells separated by commas.
    #[arg(long)]
    file: Option<PathBuf>,
    /// Seed for reproducible results.
    #[arg(long)]
    seed: Option<u64>,
    /// TOML session config.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime = Runtime::new().context("starting tokio runtime")?;
    match cli.command {
        Commands::Recommend { count, names } => {
            let total = match count {
                Some(count) => count,
                None => runtime.block_on(load_session(&names, None))?.names().len(),
            };
            let output = json!({
                "count": total,
                "advice": advice(total),
                "recommendations": recommend(total),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Commands::Spin { names, settle_ms } => runtime.block_on(spin(&names, settle_ms)),
        Commands::Groups { names, size } => runtime.block_on(groups(&names, size)),
    }
}

async fn spin(names: &NamesArgs, settle_ms: Option<u64>) -> Result<()> {
    let mut session = load_session(names, settle_ms.map(Duration::from_millis)).await?;
    match session.spin() {
        Outcome::Applied(_) => {}
        Outcome::Ignored(NoopKind::ValidationNoop) => {
            bail!("add at least 2 names to spin the wheel")
        }
        Outcome::Ignored(kind) => bail!("spin ignored: {}", kind.label()),
    }
    let winner = session
        .settled()
        .await
        .context("spin was cancelled before settling")?;
    let output = json!({
        "rotation": session.wheel().rotation(),
        "winner_index": winner.winner_index,
        "winner_name": winner.winner_name,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn groups(names: &NamesArgs, size: Option<usize>) -> Result<()> {
    let mut session = load_session(names, None).await?;
    let size = size
        .or_else(|| session.recommendations().first().map(|rec| rec.size))
        .unwrap_or_else(|| session.group_size());
    if let Outcome::Ignored(kind) = session.select_group_size(size) {
        bail!("group size {size} rejected: {}", kind.label());
    }
    let preview = session.preview();
    let Some(partition) = session.generate_groups().applied() else {
        bail!("add at least 2 names to organize groups");
    };
    let output = json!({
        "people": session.names().len(),
        "summary": preview.summary(),
        "group_size": partition.group_size,
        "groups": partition.groups,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn load_session(
    args: &NamesArgs,
    settle_override: Option<Duration>,
) -> Result<PickerSession> {
    let mut builder = PickerSession::builder();
    if let Some(path) = &args.config {
        let config = PickerConfig::load(path)?;
        builder = builder.config(&config)?;
    }
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    if let Some(delay) = settle_override {
        builder = builder.settle_delay(delay);
    }
    let mut session = builder.build()?;
    if let Some(path) = &args.file {
        let source = TextFileSource::new(path)?;
        if let Outcome::Ignored(NoopKind::ImportEmpty) = session.import_from(&source).await? {
            bail!("no valid names found in {}", path.display());
        }
    }
    session.import_names(&args.names);
    Ok(session)
}
