use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use wsvdb::config::StoreConfig;
use wsvdb::ledger::{Proposal, StateMachine, TransactionOutcome};
use wsvdb::wsv::DeletePolicy;
use wsvdb::WorldStateDb;

#[derive(Parser)]
#[command(name = "wsvdb")]
#[command(about = "Apply ledger proposals to a checkpointed world state")]
struct Cli {
    /// Log every statement
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct StoreArgs {
    /// Checkpoint file to restore from and write back to
    #[arg(long, required_unless_present = "url")]
    snapshot: Option<PathBuf>,

    /// Full store URL, e.g. wsvdb://node?snapshot=wsv.snap&deletes=strict
    #[arg(long, conflicts_with = "snapshot")]
    url: Option<String>,
}

impl StoreArgs {
    fn config(&self) -> Result<StoreConfig> {
        match (&self.url, &self.snapshot) {
            (Some(url), _) => StoreConfig::from_url(url).context("invalid store URL"),
            (None, Some(path)) => Ok(StoreConfig::new("wsvdb").snapshot_path(path)),
            (None, None) => Err(anyhow!("either --snapshot or --url is required")),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Apply a JSON proposal and checkpoint the result
    Apply {
        #[command(flatten)]
        store: StoreArgs,
        /// Fail delete/revoke commands that match nothing
        #[arg(long)]
        strict_deletes: bool,
        #[arg(long)]
        retries: Option<u32>,
        proposal: PathBuf,
    },
    /// Print committed rows
    Dump {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        table: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Apply {
            store,
            strict_deletes,
            retries,
            proposal,
        } => {
            let mut config = store.config()?;
            if strict_deletes {
                config = config.delete_policy(DeletePolicy::Strict);
            }
            if let Some(retries) = retries {
                config = config.max_retries(retries);
            }
            apply(config, &proposal)
        }
        Command::Dump { store, table } => dump(store.config()?, table.as_deref()),
    }
}

fn apply(config: StoreConfig, proposal_path: &Path) -> Result<()> {
    let text = fs::read_to_string(proposal_path)
        .with_context(|| format!("failed to read {}", proposal_path.display()))?;
    let proposal: Proposal = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", proposal_path.display()))?;

    let db = WorldStateDb::open(config.clone()).context("failed to open store")?;
    let machine = StateMachine::from_config(&config);
    let outcomes = machine.apply_proposal(&db, &proposal);

    println!("height {}", proposal.height());
    for (transaction, outcome) in proposal.transactions().iter().zip(&outcomes) {
        match outcome {
            TransactionOutcome::Committed { attempts } => println!(
                "  committed  {} ({} command(s), {} attempt(s))",
                transaction.creator_account_id,
                transaction.commands.len(),
                attempts
            ),
            TransactionOutcome::Rejected { error, attempts } => println!(
                "  rejected   {} after {} attempt(s): {}",
                transaction.creator_account_id,
                attempts,
                error.to_string().replace('\n', ": ")
            ),
        }
    }

    db.checkpoint().context("failed to write checkpoint")?;
    let committed = outcomes.iter().filter(|o| o.is_committed()).count();
    println!("{}/{} transaction(s) committed", committed, outcomes.len());
    Ok(())
}

fn dump(config: StoreConfig, table: Option<&str>) -> Result<()> {
    let db = WorldStateDb::open(config).context("failed to open store")?;
    let tables: Vec<String> = match table {
        Some(name) => vec![name.to_string()],
        None => db.catalog().list_tables().to_vec(),
    };

    for name in tables {
        let result = db
            .dump_table(&name)
            .with_context(|| format!("failed to read table {}", name))?;
        println!("== {} ==", name);
        result.print();
        println!();
    }
    Ok(())
}
