//! CLI argument parsing.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "scoreboard")]
#[command(about = "Scoreboard operator CLI — live feed, publish trigger, CMS reader")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stream live score/projection events from the relay [default]
    Watch,

    /// Publish a team's new score to every connected client
    PublishScore {
        #[arg(value_name = "TEAM_ID")]
        team_id: String,

        #[arg(value_name = "SCORE", allow_negative_numbers = true)]
        score: f64,
    },

    /// Publish a team's new projection to every connected client
    PublishProjection {
        #[arg(value_name = "TEAM_ID")]
        team_id: String,

        #[arg(value_name = "PROJECTION", allow_negative_numbers = true)]
        projection: f64,
    },

    /// List team standings from the CMS, highest bid points first
    Teams,

    /// List competitions from the CMS by date
    Competitions,
}
