//! Binary entrypoint for the questline CLI.
//!
//! Commands:
//! - `init` - write a starter `questline.toml`
//! - `status` - print a summary of stored quests, regions, and prompt settings
//! - `quests` - list stored quests with display names
//! - `regions` - list stored regions and their bounds (`--json` for machine output)
//!
//! See the library crate docs for module-level details: `questline::`.
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use questline::config::Config;
use questline::quest::{QuestRegistry, QUESTS_PATH};
use questline::region::RegionManager;
use questline::storage::{DataStore, DataStoreBuilder};

#[derive(Parser)]
#[command(name = "questline")]
#[command(about = "Quest progress, region triggers, and timed prompts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "questline.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Show stored quests and regions at a glance
    Status,
    /// List stored quests
    Quests,
    /// List stored regions
    Regions {
        /// Print the regions as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.command {
        Commands::Init => {
            init_logging(&None, cli.verbose);
            info!("Writing default configuration to {}", cli.config);
            Config::create_default(&cli.config).await?;
            println!("Created {}", cli.config);
            return Ok(());
        }
        _ => Config::load(&cli.config).await?,
    };
    init_logging(&Some(config.clone()), cli.verbose);

    let store = Arc::new(open_store(&config)?);
    let registry = Arc::new(QuestRegistry::open(
        Arc::clone(&store),
        config.quests.clone(),
    )?);
    let regions = RegionManager::open(Arc::clone(&store), Arc::clone(&registry))?;

    match cli.command {
        Commands::Init => {}
        Commands::Status => {
            println!("questline v{}", env!("CARGO_PKG_VERSION"));
            println!("Data directory: {}", config.storage.data_dir);
            println!("Stored quests:  {}", registry.list_created().len());
            println!("Stored regions: {}", regions.list().len());
            println!(
                "Prompts: capacity {}, expire after {}s, swept every {}ms",
                config.requests.capacity,
                config.requests.ttl_seconds,
                config.requests.sweep_interval_ms
            );
            println!(
                "Quests repeatable by default: {}",
                config.quests.repeatable_by_default
            );
        }
        Commands::Quests => {
            let quests = registry.list_created();
            if quests.is_empty() {
                println!("No quests.");
            }
            for quest in quests {
                let updated = store
                    .get(&format!("{}.{}", QUESTS_PATH, quest.name()))?
                    .map(|node| node.updated_at.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_default();
                println!("{:<32} {:<32} {}", quest.name(), quest.display_name(), updated);
            }
        }
        Commands::Regions { json: true } => {
            let bounds: Vec<_> = regions
                .list()
                .iter()
                .map(|region| (region.name().to_string(), region.bounds().clone()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&bounds)?);
        }
        Commands::Regions { json: false } => {
            let list = regions.list();
            if list.is_empty() {
                println!("No regions.");
            }
            for region in list {
                let b = region.bounds();
                println!(
                    "{:<24} {} ({}, {}, {}) -> ({}, {}, {})",
                    region.name(),
                    b.world,
                    b.min.x,
                    b.min.y,
                    b.min.z,
                    b.max.x,
                    b.max.y,
                    b.max.z
                );
            }
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<DataStore> {
    Ok(DataStoreBuilder::new(&config.storage.data_dir).open()?)
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|cfg| log::LevelFilter::from_str(&cfg.logging.level).ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    match log_file {
        Some(f) => {
            let file = std::sync::Mutex::new(f);
            // Echo to the console only when attached to a terminal
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = file.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.args()
                )
            });
        }
    }
    let _ = builder.try_init();
}
