mod cli;
mod config;
mod storage;
mod values;

use crate::cli::ConfigCommand;
use clap::Parser;
use color_eyre::Result;
use lockbox_storage::{DomainRegistry, Storage};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const HEALTH_PROBE_KEY: &str = "health-probe";

/// Entry point wiring the CLI to the configured storage domain.
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    let registry = DomainRegistry::new();
    match cli.command.unwrap_or(cli::Command::Info) {
        cli::Command::Version => print_version(),
        cli::Command::Info => {
            let storage = storage::open_from_config(&config, &registry)?;
            print_info(&storage);
        }
        cli::Command::Health => run_health_check(&config, &registry)?,
        cli::Command::Config(ConfigCommand::Init) => init_config(&config)?,
        cli::Command::Get { kind, name } => {
            let storage = storage::open_from_config(&config, &registry)?;
            match values::get(&storage, kind, &name)? {
                Some(value) => println!("{value}"),
                None => println!("{name}: not set"),
            }
        }
        cli::Command::Set { kind, name, value } => {
            let storage = storage::open_from_config(&config, &registry)?;
            values::set(&storage, kind, &name, &value).await?;
        }
        cli::Command::Delete { kind, name } => {
            let storage = storage::open_from_config(&config, &registry)?;
            values::delete(&storage, kind, &name)?;
        }
        cli::Command::Keys { kind } => {
            let storage = storage::open_from_config(&config, &registry)?;
            for name in values::names(&storage, kind)? {
                println!("{name}");
            }
        }
        cli::Command::Wipe { yes } => {
            let storage = storage::open_from_config(&config, &registry)?;
            wipe(&storage, yes)?;
            println!("Domain {} wiped", storage.domain_id());
        }
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("lockbox {}", env!("CARGO_PKG_VERSION"));
}

fn print_info(storage: &Storage) {
    println!("Domain id:  {}", storage.domain_id());
    println!("Directory:  {}", storage.domain_root().display());
    println!("Encrypted:  {}", storage.is_encrypted());
    println!("Backend:    {:?}", storage.capability());
}

/// Runs a quick health check of the encrypted storage path.
fn run_health_check(config: &config::Config, registry: &DomainRegistry) -> Result<()> {
    let storage = storage::open_from_config(config, registry)?;
    run_store_health(&storage)?;
    if storage.capability().is_secure() {
        println!("Storage: ok");
    } else {
        println!("Storage: ok ({:?})", storage.capability());
    }
    Ok(())
}

fn run_store_health(storage: &Storage) -> Result<()> {
    let payload = b"ok";
    let blobs = storage.blobs();
    blobs.save(payload, HEALTH_PROBE_KEY)?;
    let round_trip = blobs.load(HEALTH_PROBE_KEY)?;
    blobs.delete(HEALTH_PROBE_KEY)?;

    if round_trip.as_deref() != Some(payload.as_slice()) {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    Ok(())
}

fn wipe(storage: &Storage, confirmed: bool) -> Result<()> {
    if !confirmed {
        color_eyre::eyre::bail!("refusing to wipe without --yes");
    }
    Ok(storage.wipe()?)
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
