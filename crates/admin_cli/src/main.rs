use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{CreateTeamCmd, Engine};
use migration::MigratorTrait;
use sea_orm::Database;

#[derive(Parser, Debug)]
#[command(name = "outlay_admin")]
#[command(about = "Admin utilities for Outlay (bootstrap teams, reconcile spending, reset alerts)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./outlay.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Team(Team),
}

#[derive(Args, Debug)]
struct Team {
    #[command(subcommand)]
    command: TeamCommand,
}

#[derive(Subcommand, Debug)]
enum TeamCommand {
    /// Create a team with an empty member list.
    Create(TeamCreateArgs),
    /// List teams with their cached spending aggregates.
    List,
    /// Recompute a team's spending aggregate from its approved expenses.
    Recompute(TeamIdArgs),
    /// Clear both budget-alert latches for a team.
    ResetAlerts(TeamIdArgs),
}

#[derive(Args, Debug)]
struct TeamCreateArgs {
    #[arg(long)]
    name: String,
    /// Budget in integer cents.
    #[arg(long)]
    budget_minor: i64,
}

#[derive(Args, Debug)]
struct TeamIdArgs {
    #[arg(long)]
    team_id: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = Database::connect(&cli.database_url).await?;
    migration::Migrator::up(&db, None).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Team(team) => match team.command {
            TeamCommand::Create(args) => {
                let id = engine
                    .create_team(CreateTeamCmd {
                        name: args.name,
                        budget_minor: args.budget_minor,
                        members: Vec::new(),
                    })
                    .await?;
                println!("created team {id}");
            }
            TeamCommand::List => {
                for team in engine.list_teams().await? {
                    println!(
                        "{}  {}  budget={}  spending={}  alerts(80/100)={}/{}",
                        team.id,
                        team.name,
                        team.budget_minor,
                        team.current_spending_minor,
                        team.eighty_percent_sent,
                        team.hundred_percent_sent,
                    );
                }
            }
            TeamCommand::Recompute(args) => {
                let spending = engine.recompute_team_spending(&args.team_id).await?;
                println!("recomputed spending for {}: {spending}", args.team_id);
            }
            TeamCommand::ResetAlerts(args) => {
                engine.reset_alert_latches(&args.team_id).await?;
                println!("reset alert latches for {}", args.team_id);
            }
        },
    }

    Ok(())
}
