//! Spareline CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply schema migrations and the session table
//! spareline migrate
//!
//! # Create a staff account
//! spareline staff create -e ops@example.com -f Ana -l Silva -r admin
//!
//! # Load starter catalog data and settings
//! spareline seed
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `staff create` - Create staff users
//! - `seed` - Seed taxonomy, sample products and default settings

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "spareline")]
#[command(author, version, about = "Spareline CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage staff users
    Staff {
        #[command(subcommand)]
        action: StaffAction,
    },
    /// Seed starter data (safe to run repeatedly)
    Seed {
        /// Skip the sample products
        #[arg(long)]
        no_products: bool,
    },
}

#[derive(Subcommand)]
enum StaffAction {
    /// Create a new staff user
    Create {
        /// Staff email address
        #[arg(short, long)]
        email: String,

        /// First name
        #[arg(short, long)]
        first_name: String,

        /// Last name
        #[arg(short, long)]
        last_name: String,

        /// Role (`inventory_staff`, `sales_manager`, `admin`, `super_admin`)
        #[arg(short, long, default_value = "admin")]
        role: String,

        /// Initial password
        #[arg(long, env = "SPARELINE_STAFF_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Staff { action } => match action {
            StaffAction::Create {
                email,
                first_name,
                last_name,
                role,
                password,
            } => {
                let new = commands::staff::NewStaff {
                    email: &email,
                    first_name: &first_name,
                    last_name: &last_name,
                    role: &role,
                    password: password.into(),
                };
                commands::staff::create_user(new).await?;
            }
        },
        Commands::Seed { no_products } => commands::seed::run(!no_products).await?,
    }
    Ok(())
}
