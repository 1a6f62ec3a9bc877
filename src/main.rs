//! hutlink CLI — load hut/link fixtures into a graph store.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hutlink::export::export_cypher_script;
use hutlink::{Fixture, HutGraph, LinkAttributes, MemoryBackend, Settings};

/// hutlink: upsert bidirectional LINK segments between huts.
#[derive(Parser)]
#[command(name = "hutlink")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a fixture file (huts + links) and print a summary
    Load {
        /// Fixture JSON file
        fixture: PathBuf,

        /// Write the resulting graph as a Cypher script
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Seed huts from a fixture, then upsert one segment both ways
    Link {
        /// Fixture JSON file providing the huts (its links are applied too)
        fixture: PathBuf,

        /// Hut the measures start from
        #[arg(long)]
        from: String,

        /// Hut the measures end at
        #[arg(long)]
        to: String,

        /// Segment length in kilometres
        #[arg(long)]
        distance: f64,

        /// Ascent from --from to --to, in metres
        #[arg(long)]
        dplus: f64,

        /// Descent from --from to --to, in metres
        #[arg(long)]
        dminus: f64,

        /// Write the resulting graph as a Cypher script
        #[arg(short, long)]
        export: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "hutlink=info",
        1 => "hutlink=debug",
        _ => "hutlink=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    let settings = Settings::from_env().context("reading HUTLINK_* settings")?;
    let graph = HutGraph::open(settings).await?;
    run_and_close(&graph, command).await
}

/// Run `command`, then close the store whether or not it succeeded.
async fn run_and_close(graph: &HutGraph<MemoryBackend>, command: Commands) -> anyhow::Result<()> {
    let result = execute(graph, command).await;
    let closed = graph.close().await;
    result?;
    closed?;
    Ok(())
}

async fn execute(graph: &HutGraph<MemoryBackend>, command: Commands) -> anyhow::Result<()> {
    graph.verify_connection().await?;
    graph.ensure_indexes().await?;

    let export = match command {
        Commands::Load { fixture, export } => {
            load(graph, &fixture).await?;
            export
        }
        Commands::Link { fixture, from, to, distance, dplus, dminus, export } => {
            load(graph, &fixture).await?;
            let outcome = graph
                .upsert_bidirectional_link(&from, &to, LinkAttributes::new(distance, dplus, dminus))
                .await
                .with_context(|| format!("linking '{from}' and '{to}'"))?;
            println!(
                "{from} -> {to}: {} | {to} -> {from}: {}",
                if outcome.forward.created { "created" } else { "updated" },
                if outcome.backward.created { "created" } else { "updated" },
            );
            export
        }
    };

    println!("huts: {}, links: {}", graph.huts().await?.len(), graph.link_count().await?);

    if let Some(path) = export {
        write_export(graph.backend(), &path).await?;
    }
    Ok(())
}

async fn load(graph: &HutGraph<MemoryBackend>, path: &Path) -> anyhow::Result<()> {
    let fixture = Fixture::from_path(path).with_context(|| format!("reading {}", path.display()))?;
    let report = fixture
        .apply(graph)
        .await
        .with_context(|| format!("applying {}", path.display()))?;
    println!(
        "huts created: {}, updated: {} | links created: {}, updated: {}",
        report.huts_created, report.huts_updated, report.links_created, report.links_updated
    );
    Ok(())
}

async fn write_export(backend: &MemoryBackend, path: &Path) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let summary = export_cypher_script(backend, &mut writer).await?;
    writer.flush()?;
    println!("exported {} huts and {} links to {}", summary.huts, summary.links, path.display());
    Ok(())
}
