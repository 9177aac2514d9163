//! Database maintenance: apply migrations, show their status, create the
//! first administrator account.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use tierphysio_manager::auth::password::{hash_password, validate_password};
use tierphysio_manager::config::AppConfig;
use tierphysio_manager::database::users::{UserRecord, ADMIN_ROLE};
use tierphysio_manager::database::Database;

#[derive(Parser)]
#[command(name = "tp-migrate")]
#[command(about = "Manage the Tierphysio Manager database")]
struct Cli {
    /// Override the configured database URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all pending migrations
    Up,
    /// List migrations and whether they are applied
    Status,
    /// Create an administrator account
    CreateAdmin {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        /// Password; read from TIERPHYSIO_ADMIN_PASSWORD when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;
    let database_url = cli.database_url.unwrap_or_else(|| config.database_url.clone());
    let database = Database::new(&database_url)
        .await
        .with_context(|| format!("failed to open {}", database_url))?;

    match cli.command {
        Commands::Up => {
            let applied = database.run_migrations().await?;
            if applied.is_empty() {
                println!("Database is up to date");
            }
            for name in applied {
                println!("applied {}", name);
            }
        }
        Commands::Status => {
            for migration in database.migration_status().await? {
                match migration.applied_at {
                    Some(at) => println!("{:<32} applied {}", migration.name, at.to_rfc3339()),
                    None => println!("{:<32} pending", migration.name),
                }
            }
        }
        Commands::CreateAdmin {
            username,
            email,
            password,
        } => {
            database.run_migrations().await?;
            let password = password
                .or_else(|| std::env::var("TIERPHYSIO_ADMIN_PASSWORD").ok())
                .ok_or_else(|| anyhow!("no password given (--password or TIERPHYSIO_ADMIN_PASSWORD)"))?;
            validate_password(&password)?;

            let hash = hash_password(&password, config.auth.bcrypt_cost).await?;
            let user = database
                .create_user(&UserRecord {
                    username,
                    email,
                    password_hash: Some(hash),
                    first_name: String::new(),
                    last_name: String::new(),
                    role: ADMIN_ROLE.to_string(),
                    is_active: true,
                })
                .await?;
            println!("Created administrator {} (id {})", user.username, user.id);
        }
    }

    database.close().await;
    Ok(())
}
