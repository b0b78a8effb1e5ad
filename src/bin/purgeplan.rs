

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use purgeplan::{DeletionManager, EntityKind, InMemoryStore, PurgeConfig};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("purgeplan=info".parse()?))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut snapshot: Option<PathBuf> = None;
    let mut config_file: Option<PathBuf> = None;
    let mut kind = EntityKind::Equipment;
    let mut id: Option<String> = None;
    let mut execute = false;
    let mut cascade = false;
    let mut write = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--snapshot" | "-s" => {
                i += 1;
                snapshot = args.get(i).map(PathBuf::from);
            }
            "--config" | "-c" => {
                i += 1;
                config_file = args.get(i).map(PathBuf::from);
            }
            "--kind" | "-k" => {
                i += 1;
                let value = args.get(i).context("--kind needs a value")?;
                kind = value
                    .parse()
                    .with_context(|| format!("unknown kind '{}', expected equipment, document or part", value))?;
            }
            "--id" => {
                i += 1;
                id = args.get(i).cloned();
            }
            "--execute" => execute = true,
            "--cascade" => cascade = true,
            "--write" => write = true,
            "--help" => {
                print_help();
                return Ok(());
            }
            other => bail!("unexpected argument: {}", other),
        }
        i += 1;
    }

    let Some(snapshot) = snapshot else {
        print_help();
        bail!("--snapshot is required");
    };
    let Some(id) = id else {
        print_help();
        bail!("--id is required");
    };

    let config = match config_file {
        Some(path) => PurgeConfig::load(&path)?,
        None => PurgeConfig::from_env(),
    };

    let raw = fs::read_to_string(&snapshot).with_context(|| format!("reading {}", snapshot.display()))?;
    let store = Arc::new(InMemoryStore::from_snapshot(serde_json::from_str(&raw)?)?);
    let manager = DeletionManager::new(store.clone(), &config);

    let plan = manager.analyze(&id, kind).await?;
    println!("{}", serde_json::to_string_pretty(&plan.view(cascade))?);

    if !execute {
        return Ok(());
    }

    let result = manager.execute(&plan, cascade).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if write && result.is_success() {
        fs::write(&snapshot, serde_json::to_string_pretty(&store.snapshot().await)?)?;
        info!("Snapshot written back to {}", snapshot.display());
    }

    if !result.is_success() {
        bail!("deletion of {} ended as {:?}", plan.target, result.status);
    }
    Ok(())
}

fn print_help() {
    println!("purgeplan - deletion impact analysis");
    println!();
    println!("USAGE:");
    println!("    purgeplan --snapshot <file> --kind <kind> --id <id> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -s, --snapshot <FILE>   JSON table snapshot to analyse");
    println!("    -k, --kind <KIND>       equipment, document or part [default: equipment]");
    println!("        --id <ID>           Id of the record to delete");
    println!("    -c, --config <FILE>     Config file layered under PURGE_* variables");
    println!("        --execute           Run the plan after printing it");
    println!("        --cascade           Also remove groups left without equipment");
    println!("        --write             Save the snapshot after a successful run");
    println!("        --help              Show this help");
}
