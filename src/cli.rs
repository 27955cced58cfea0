use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::auth::{Role, password};
use crate::config::{self, Config};
use crate::db::{self, Database};
use crate::http::{self, AppState};
use crate::models::NewUser;
use crate::telemetry;

#[derive(Parser, Debug)]
#[command(name = "timesheet-manager")]
#[command(about = "Time tracking and project funding service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run migrations, then serve the HTTP API (default)
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Create a user; an existing username is left untouched
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        full_name: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "admin")]
        role: Role,
    },
    /// Print row counts per table
    CheckDb,
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = config::init()?;
    telemetry::init(config.log_format)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let db = Database::new(&config).await?;
            db.migrate().await?;
            info!("migrations applied");
            Ok(())
        }
        Command::CreateUser {
            username,
            password,
            full_name,
            email,
            role,
        } => {
            let db = Database::new(&config).await?;
            create_user(&db, &config, username, password, full_name, email, role).await
        }
        Command::CheckDb => {
            let db = Database::new(&config).await?;
            for (table, count) in db.table_counts().await? {
                println!("{table:<20} {count}");
            }
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("starting timesheet manager");
    let db = db::init(&config).await?;
    let state = AppState::new(db, config)?;
    http::serve(state).await
}

async fn create_user(
    db: &Database,
    config: &Config,
    username: String,
    password: String,
    full_name: String,
    email: String,
    role: Role,
) -> Result<()> {
    if db.username_exists(&username).await? {
        println!("User {username} already exists; nothing changed");
        return Ok(());
    }

    let password_hash = password::hash(password, config.bcrypt_cost).await?;
    let id = db
        .create_user(&NewUser {
            username: username.clone(),
            password_hash,
            full_name,
            email,
            role,
        })
        .await?;

    println!("Created user {username} (id {id}, role {role})");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["timesheet-manager"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn create_user_parses_role() {
        let cli = Cli::try_parse_from([
            "timesheet-manager",
            "create-user",
            "--username",
            "hr1",
            "--password",
            "secret",
            "--role",
            "hr",
        ])
        .unwrap();
        match cli.command {
            Some(Command::CreateUser { username, role, email, .. }) => {
                assert_eq!(username, "hr1");
                assert_eq!(role, Role::Hr);
                assert_eq!(email, "");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_roles_are_rejected() {
        let result = Cli::try_parse_from([
            "timesheet-manager",
            "create-user",
            "--username",
            "x",
            "--password",
            "y",
            "--role",
            "root",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn check_db_subcommand() {
        let cli = Cli::try_parse_from(["timesheet-manager", "check-db"]).unwrap();
        assert_eq!(cli.command, Some(Command::CheckDb));
    }
}
