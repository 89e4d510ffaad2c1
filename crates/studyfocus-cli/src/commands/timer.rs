use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use studyfocus_core::{BackgroundGateway, CoreError, Event, FocusSession, Mode, SqliteGateway, Ticker};
use tokio::sync::Mutex;

use super::{configured_builder, finish, open_session, print_json};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start or resume the countdown
    Start,
    /// Pause the countdown
    Pause,
    /// Restart the current mode from its full duration
    Reset,
    /// Abandon the current session and move to the next mode
    Skip,
    /// Switch to a mode (work, break, long-break)
    Mode {
        mode: Mode,
    },
    /// End the current session now and credit it
    Complete,
    /// Print current timer state as JSON
    Status,
    /// Run the countdown in the foreground until the session completes
    Run {
        /// Start the next session automatically instead of exiting
        #[arg(long)]
        continuous: bool,
    },
}

pub fn run(action: TimerAction) -> Result<(), CoreError> {
    match action {
        TimerAction::Run { continuous } => run_foreground(continuous),
        action => run_once(action),
    }
}

fn run_once(action: TimerAction) -> Result<(), CoreError> {
    let mut session = open_session()?;

    match action {
        TimerAction::Start => {
            if !session.start() {
                print_json(&session.status())?;
            }
        }
        TimerAction::Pause => {
            if !session.pause() {
                print_json(&session.status())?;
            }
        }
        TimerAction::Reset => session.reset(),
        TimerAction::Skip => session.skip(),
        TimerAction::Mode { mode } => session.change_mode(mode),
        TimerAction::Complete => {
            session.complete_session();
        }
        TimerAction::Status => print_json(&session.status())?,
        // Long-running; dispatched by `run`.
        TimerAction::Run { .. } => {}
    }

    finish(&mut session)?;
    Ok(())
}

/// Drive the session from a ticker until it completes or Ctrl-C.
///
/// Snapshots are written by a background writer so saving never holds up a
/// tick. On Ctrl-C the countdown is left running; the next invocation catches
/// up with the time that passed.
fn run_foreground(continuous: bool) -> Result<(), CoreError> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_with_writer(continuous))
}

async fn run_with_writer(continuous: bool) -> Result<(), CoreError> {
    let gateway = Arc::new(BackgroundGateway::spawn(SqliteGateway::open_default()?));
    let mut session = configured_builder()?
        .gateway(Arc::clone(&gateway))
        .build();
    session.start();
    finish(&mut session)?;

    let outcome = drive(session, continuous).await;
    match Arc::try_unwrap(gateway) {
        Ok(gateway) => gateway.flush().await,
        Err(_) => tracing::warn!("snapshot writer still shared, last save may be lost"),
    }
    outcome
}

async fn drive(session: FocusSession, continuous: bool) -> Result<(), CoreError> {
    let session = Arc::new(Mutex::new(session));
    let ticker = Ticker::attach(Arc::clone(&session), Duration::from_secs(1)).await?;
    let mut report = tokio::time::interval(Duration::from_secs(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            _ = report.tick() => {
                let mut s = session.lock().await;
                show_countdown(&s);
                let events = match finish(&mut s) {
                    Ok(events) => events,
                    Err(e) => break Err(e),
                };
                let completed = events
                    .iter()
                    .any(|e| matches!(e, Event::SessionCompleted { .. }));
                if completed {
                    if !continuous {
                        break Ok(());
                    }
                    s.start();
                }
            }
        }
    };

    ticker.stop().await;
    eprintln!();
    outcome
}

fn show_countdown(session: &FocusSession) {
    let engine = session.engine();
    let remaining = engine.remaining_secs();
    eprint!(
        "\r{:<10} {:02}:{:02}  ",
        engine.mode().label(),
        remaining / 60,
        remaining % 60
    );
    let _ = std::io::stderr().flush();
}
