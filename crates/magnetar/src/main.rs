use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod schedule;
mod taint;

#[derive(Parser)]
#[command(name = "magnetar", about = "Magnetar placement decision CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Update the taints on a node
    ///
    /// KEY=VALUE:EFFECT adds or replaces a taint, KEY- removes the taint
    /// with that key. Accepted effects: NoSchedule, PreferNoSchedule.
    Taint {
        /// Node whose manifest to update
        node: String,
        /// Taint changes to apply
        #[arg(required = true)]
        taints: Vec<String>,
        /// If true, allow taints to be overwritten, otherwise reject
        /// taint updates that overwrite existing taints
        #[arg(long, default_value_t = false)]
        overwrite: bool,
        /// Directory holding the cluster manifests
        #[arg(long, default_value = "./cluster")]
        data_dir: PathBuf,
    },
    /// Rank the cluster's nodes for a pod manifest
    Schedule {
        /// Pod manifest to place
        #[arg(long)]
        pod: PathBuf,
        /// Directory holding the cluster manifests
        #[arg(long, default_value = "./cluster")]
        cluster: PathBuf,
        /// Worker pool width for predicate evaluation
        #[arg(long, default_value_t = 16)]
        parallelism: usize,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Taint {
            node,
            taints,
            overwrite,
            data_dir,
        } => taint::run_taint(&data_dir, &node, &taints, overwrite),
        Commands::Schedule {
            pod,
            cluster,
            parallelism,
        } => schedule::run_schedule(&pod, &cluster, parallelism).await,
    }
}
