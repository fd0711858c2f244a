//! Vastra CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! vastra migrate
//!
//! # Create the protected roles and every permission key
//! vastra seed
//!
//! # Create a panel user
//! vastra panel-user create -e ops@vastra.in -n "Ops" -p 'long password' -r Admin
//!
//! # Delete expired bearer and reset tokens
//! vastra purge-tokens
//! ```
//!
//! Every command reads `DATABASE_URL` (a `.env` file is honoured).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "vastra")]
#[command(author, version, about = "Vastra CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Upsert the protected roles and every permission key
    Seed,
    /// Manage panel users
    PanelUser {
        #[command(subcommand)]
        action: PanelUserAction,
    },
    /// Delete expired tokens for customers and panel users
    PurgeTokens,
}

#[derive(Subcommand)]
enum PanelUserAction {
    /// Create a new panel user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Initial password (8-128 characters)
        #[arg(short, long)]
        password: String,

        /// Role name, e.g. `Admin`
        #[arg(short, long, default_value = "Admin")]
        role: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    let pool = commands::connect().await?;

    match cli.command {
        Commands::Migrate => commands::migrate::run(&pool).await?,
        Commands::Seed => commands::seed::run(&pool).await?,
        Commands::PanelUser { action } => match action {
            PanelUserAction::Create {
                email,
                name,
                password,
                role,
            } => {
                commands::panel_user::create(&pool, &email, &name, &password, &role).await?;
            }
        },
        Commands::PurgeTokens => commands::tokens::purge(&pool).await?,
    }
    Ok(())
}
