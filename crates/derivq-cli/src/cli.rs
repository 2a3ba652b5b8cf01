use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use derivq_auth::SigningAlgorithm;
use derivq_core::events::MutationKind;

#[derive(Parser)]
#[command(name = "derivq")]
#[command(about = "derivq: validate and dispatch derivative-generation tasks")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level or filter (overrides the configured level; RUST_LOG wins over both)
    #[arg(short, long, global = true, env = "DERIVQ_LOG")]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a configuration file and validate every task
    Validate(ValidateArgs),
    /// Emit a mutation for an entity and dispatch matching tasks
    Dispatch(DispatchArgs),
    /// Generate a PEM key pair for token signing
    Keygen(KeygenArgs),
}

#[derive(clap::Args)]
pub struct ValidateArgs {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = "derivq.toml")]
    pub config: PathBuf,
    /// JSON fixture repository; enables term and field checks
    #[arg(long)]
    pub fixture: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct DispatchArgs {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = "derivq.toml")]
    pub config: PathBuf,
    /// JSON fixture repository to resolve content from
    #[arg(long)]
    pub fixture: PathBuf,
    /// Trigger entity as type/id (e.g. node/1)
    #[arg(short, long)]
    pub entity: String,
    /// Only run the task with this name
    #[arg(short, long)]
    pub task: Option<String>,
    /// Mutation to simulate
    #[arg(long, default_value = "updated")]
    pub kind: KindArg,
    /// Print events instead of sending them to the broker
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Created,
    Updated,
}

impl From<KindArg> for MutationKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Created => MutationKind::Created,
            KindArg::Updated => MutationKind::Updated,
        }
    }
}

#[derive(clap::Args)]
pub struct KeygenArgs {
    /// Signing algorithm
    #[arg(short, long, default_value = "rs256")]
    pub algorithm: AlgorithmArg,
    /// Directory to write private.pem and public.pem into
    #[arg(short, long)]
    pub out: PathBuf,
    /// Overwrite existing key files
    #[arg(long)]
    pub force: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum AlgorithmArg {
    Rs256,
    Rs384,
    Es384,
}

impl From<AlgorithmArg> for SigningAlgorithm {
    fn from(algorithm: AlgorithmArg) -> Self {
        match algorithm {
            AlgorithmArg::Rs256 => SigningAlgorithm::RS256,
            AlgorithmArg::Rs384 => SigningAlgorithm::RS384,
            AlgorithmArg::Es384 => SigningAlgorithm::ES384,
        }
    }
}
