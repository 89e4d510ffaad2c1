use clap::Subcommand;
use studyfocus_core::CoreError;

use super::{finish, open_session, print_json};

#[derive(Subcommand)]
pub enum SitesAction {
    /// Block a site (URL or host)
    Add { site: String },
    /// Unblock a site
    Remove { site: String },
    /// List blocked hosts
    List,
    /// Tell whether a URL is blocked
    Check { site: String },
}

pub fn run(action: SitesAction) -> Result<(), CoreError> {
    let mut session = open_session()?;

    match action {
        SitesAction::Add { site } => {
            let (host, added) = session.block_site(&site)?;
            if added {
                println!("blocked {host}");
            } else {
                println!("{host} is already blocked");
            }
        }
        SitesAction::Remove { site } => {
            if session.unblock_site(&site)? {
                println!("unblocked {site}");
            } else {
                println!("{site} was not blocked");
            }
        }
        SitesAction::List => print_json(&session.blocked_sites().to_vec())?,
        SitesAction::Check { site } => {
            let verdict = if session.blocked_sites().is_blocked(&site) {
                "blocked"
            } else {
                "allowed"
            };
            println!("{verdict}");
        }
    }

    finish(&mut session)?;
    Ok(())
}
