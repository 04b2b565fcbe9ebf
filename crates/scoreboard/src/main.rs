//! Scoreboard operator CLI.

use std::env;

use clap::Parser;
use scoreboard::{cli, cms, relay_client};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    match cli.command.unwrap_or(cli::Commands::Watch) {
        cli::Commands::Watch => {
            let ws_url =
                env::var("RELAY_WS_URL").unwrap_or_else(|_| "ws://localhost:4000/ws".to_string());
            relay_client::run_ws_client(&ws_url).await?;
        }
        cli::Commands::PublishScore { team_id, score } => {
            let api_key = publish_api_key();
            let res =
                relay_client::publish_score(&relay_url(), api_key.as_deref(), &team_id, score)
                    .await?;
            println!(
                "scoreUpdate for team {} delivered to {} client(s)",
                team_id, res.receivers
            );
        }
        cli::Commands::PublishProjection {
            team_id,
            projection,
        } => {
            let api_key = publish_api_key();
            let res = relay_client::publish_projection(
                &relay_url(),
                api_key.as_deref(),
                &team_id,
                projection,
            )
            .await?;
            println!(
                "projectionUpdate for team {} delivered to {} client(s)",
                team_id, res.receivers
            );
        }
        cli::Commands::Teams => {
            let client = cms::CmsClient::from_env()?;
            let teams = cms::standings(client.fetch_teams().await);
            if teams.is_empty() {
                println!("No teams.");
            }
            for (rank, team) in teams.iter().enumerate() {
                println!(
                    "{:>2}. {:<28} {:>6} pts{}",
                    rank + 1,
                    team.name,
                    team.bid_points,
                    if team.qualified { "  (qualified)" } else { "" }
                );
            }
        }
        cli::Commands::Competitions => {
            let client = cms::CmsClient::from_env()?;
            let comps = cms::schedule(client.fetch_competitions().await);
            if comps.is_empty() {
                println!("No competitions.");
            }
            for comp in &comps {
                println!(
                    "{}  {}  {}  ({} teams)",
                    comp.date.as_deref().unwrap_or("TBD"),
                    comp.name,
                    comp.city.as_deref().unwrap_or(""),
                    comp.lineup.len()
                );
            }
        }
    }

    Ok(())
}

fn relay_url() -> String {
    env::var("RELAY_URL")
        .ok()
        .or_else(|| {
            env::var("RELAY_WS_URL")
                .ok()
                .map(|u| relay_client::http_base_url(&u))
        })
        .unwrap_or_else(|| "http://localhost:4000".to_string())
}

fn publish_api_key() -> Option<String> {
    env::var("PUBLISH_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
}
