use clap::Subcommand;
use serde::Serialize;
use studyfocus_core::{CoreError, GoalProgress, SqliteGateway, Stats};

use super::{finish, open_session, print_json};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Totals, today, this week and streak
    Show,
    /// Progress toward the daily and weekly goals
    Goals,
    /// Recently completed sessions
    History {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

#[derive(Serialize)]
struct StatsReport<'a> {
    stats: &'a Stats,
    progress: GoalProgress,
}

pub fn run(action: StatsAction) -> Result<(), CoreError> {
    let mut session = open_session()?;
    session.refresh();

    match action {
        StatsAction::Show => {
            print_json(&StatsReport {
                stats: session.stats(),
                progress: session.progress(),
            })?;
        }
        StatsAction::Goals => print_json(&session.progress())?,
        StatsAction::History { limit } => {
            let db = SqliteGateway::open_default()?;
            print_json(&db.recent_sessions(limit)?)?;
        }
    }

    finish(&mut session)?;
    Ok(())
}
