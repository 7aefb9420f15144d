use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context};
use colored::Colorize;
use stowage_cluster::{ClusterBlobStore, RestClusterClient};
use stowage_sql::{setup_db, Database, SqlBlobStore, SqlConfig};
use stowage_store::{BlobId, BlobStore};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::cli::*;
use crate::config::{Backend, FileConfig};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let backend = FileConfig::load(&cli.config)?.resolve(cli.timeout_ms)?;
    debug!(config = %cli.config.display(), backend = backend.name(), "configuration loaded");
    match cli.command {
        Command::Setup => cmd_setup(backend).await,
        Command::Put(args) => cmd_put(backend, args).await,
        Command::Get(args) => cmd_get(backend, args).await,
        Command::Del(args) => cmd_del(backend, args).await,
        Command::Ping => cmd_ping(backend).await,
    }
}

async fn open_store(backend: Backend) -> anyhow::Result<Box<dyn BlobStore>> {
    match backend {
        Backend::Sql {
            path,
            execution_id,
            timeout,
        } => {
            let db = Database::open(&path)?;
            let mut config = SqlConfig::new(execution_id);
            if let Some(timeout) = timeout {
                config = config.with_timeout(timeout);
            }
            let store = SqlBlobStore::open(db, config)
                .await
                .with_context(|| format!("opening {} (did you run `stowage setup`?)", path.display()))?;
            Ok(Box::new(store))
        }
        Backend::Cluster { client, store } => {
            let client = RestClusterClient::new(&client)?;
            Ok(Box::new(ClusterBlobStore::connect(client, store).await?))
        }
    }
}

fn parse_id(raw: &str) -> anyhow::Result<BlobId> {
    Ok(BlobId::from_hex(raw.trim())?)
}

async fn cmd_setup(backend: Backend) -> anyhow::Result<()> {
    let Backend::Sql { path, timeout, .. } = backend else {
        bail!("setup only applies to the [sql] backend");
    };
    let db = Database::open(&path)?;
    setup_db(&db, timeout.unwrap_or(Duration::from_secs(30))).await?;
    println!("{} Created table in {}", "✓".green().bold(), path.display().to_string().bold());
    Ok(())
}

async fn cmd_put(backend: Backend, args: PutArgs) -> anyhow::Result<()> {
    let data = if args.input == "-" {
        let mut buf = Vec::new();
        tokio::io::stdin().read_to_end(&mut buf).await.context("reading stdin")?;
        buf
    } else {
        tokio::fs::read(&args.input)
            .await
            .with_context(|| format!("reading {}", args.input))?
    };

    let store = open_store(backend).await?;
    let id = store.put(&data).await?;
    println!("{}", id.to_hex());
    eprintln!("{} Stored {} bytes in {}", "✓".green(), data.len(), store.backend().cyan());
    Ok(())
}

async fn cmd_get(backend: Backend, args: GetArgs) -> anyhow::Result<()> {
    let id = parse_id(&args.id)?;
    let store = open_store(backend).await?;
    let data = store.get(&id).await?;

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &data)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("{} Wrote {} bytes to {}", "✓".green(), data.len(), path.display().to_string().bold());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

async fn cmd_del(backend: Backend, args: DelArgs) -> anyhow::Result<()> {
    let id = parse_id(&args.id)?;
    let store = open_store(backend).await?;
    store.del(&id).await?;
    println!("{} Deleted {}", "✓".green(), id.to_hex().yellow());
    Ok(())
}

async fn cmd_ping(backend: Backend) -> anyhow::Result<()> {
    let store = open_store(backend).await?;
    println!("{} {} backend ready", "✓".green().bold(), store.backend().cyan());
    Ok(())
}
