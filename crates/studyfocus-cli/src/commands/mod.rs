pub mod config;
pub mod sites;
pub mod stats;
pub mod task;
pub mod timer;

use serde::Serialize;
use studyfocus_core::{
    Config, CoreError, Event, FocusSession, FocusSessionBuilder, LogNotifier, SqliteGateway,
};

/// Open the persisted session with the user's configuration applied.
///
/// Catching up with the wall clock happens here, so a countdown started by
/// an earlier invocation has advanced by the time a command sees it.
pub fn open_session() -> Result<FocusSession, CoreError> {
    Ok(configured_builder()?
        .gateway(SqliteGateway::open_default()?)
        .build())
}

/// Builder carrying the user's configuration, without a gateway.
pub fn configured_builder() -> Result<FocusSessionBuilder, CoreError> {
    let config = Config::load()?;
    let sound = config
        .notifications
        .enabled
        .then(|| config.notifications.completion_sound.clone())
        .flatten();

    Ok(FocusSession::builder()
        .settings(config.timer.clone())
        .goals(config.goals.clone())
        .day_offset(config.day_offset())
        .notifier(LogNotifier)
        .completion_sound(sound))
}

/// Print and log the events produced by a command, and return them.
///
/// Completed sessions are appended to the session history.
pub fn finish(session: &mut FocusSession) -> Result<Vec<Event>, CoreError> {
    let events = session.drain_events();
    record_history(&events);
    for event in &events {
        print_json(event)?;
    }
    Ok(events)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CoreError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn record_history(events: &[Event]) {
    let completed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::SessionCompleted {
                mode,
                elapsed_secs,
                task_id,
                at,
                ..
            } => Some((*mode, *elapsed_secs, task_id.as_deref(), *at)),
            _ => None,
        })
        .collect();
    if completed.is_empty() {
        return;
    }

    let db = match SqliteGateway::open_default() {
        Ok(db) => db,
        Err(e) => {
            tracing::warn!("session history unavailable: {e}");
            return;
        }
    };
    for (mode, elapsed_secs, task_id, at) in completed {
        if let Err(e) = db.record_session(mode, elapsed_secs, task_id, at) {
            tracing::warn!("failed to record session: {e}");
        }
    }
}
