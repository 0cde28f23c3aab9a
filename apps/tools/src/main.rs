use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use server_api::auth::hash_password;
use shared::{
    domain::{User, UserId, UserRole},
    error::ApiException,
    ledger,
};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/crm.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates an account, or resets the password of an existing username.
    CreateUser {
        username: String,
        password: String,
        #[arg(long)]
        name: Option<String>,
        /// SUPER_ADMIN, EXECUTIVE or VIEW_ONLY.
        #[arg(long, default_value = "SUPER_ADMIN")]
        role: String,
    },
    ListBatches,
    /// Rewrites stored payment statuses from each candidate's ledger.
    ReconcilePayments {
        #[arg(long, default_value_t = 100_000)]
        total_fees: i64,
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateUser {
            username,
            password,
            name,
            role,
        } => {
            let Some(role) = UserRole::parse(&role) else {
                bail!("unknown role {role}");
            };
            let id = storage
                .find_credentials(&username)
                .await?
                .map(|creds| creds.user.id)
                .unwrap_or_else(UserId::generate);
            let user = User {
                id,
                name: name.unwrap_or_else(|| username.clone()),
                username,
                role,
                is_active: true,
            };
            let hash = hash_password(&password, bcrypt::DEFAULT_COST).map_err(ApiException::from)?;
            storage.upsert_user(&user, &hash).await?;
            println!("saved user id={} username={} role={}", user.id, user.username, role.as_str());
        }
        Command::ListBatches => {
            let candidates = storage.list_candidates().await?;
            for batch in storage.list_batches().await? {
                let occupancy = ledger::occupancy(&batch, &candidates);
                let flag = if occupancy.is_overbooked() { " OVERBOOKED" } else { "" };
                println!(
                    "{}\t{}\t{}/{} seats ({:.1}%){flag}",
                    batch.id, batch.name, occupancy.filled_seats, batch.max_seats, occupancy.occupancy_percent
                );
            }
        }
        Command::ReconcilePayments { total_fees, dry_run } => {
            if total_fees <= 0 {
                bail!("total fees must be positive");
            }
            let mut changed = 0usize;
            for mut candidate in storage.list_candidates().await? {
                let before = candidate.payment_status;
                if ledger::apply_reconciliation(&mut candidate, total_fees) {
                    changed += 1;
                    println!(
                        "{}\t{} -> {}",
                        candidate.id,
                        before.as_str(),
                        candidate.payment_status.as_str()
                    );
                    if !dry_run {
                        storage.upsert_candidate(&candidate).await?;
                    }
                }
            }
            let verb = if dry_run { "would update" } else { "updated" };
            println!("{verb} {changed} candidate(s)");
        }
    }

    Ok(())
}
