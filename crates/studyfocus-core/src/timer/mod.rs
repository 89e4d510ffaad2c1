mod clock;
mod engine;
mod settings;
mod ticker;

pub use clock::{Clock, FakeClock, SystemClock};
pub use engine::{next_mode, Completion, SessionState, Tick, TimerEngine};
pub use settings::{
    Mode, Settings, SettingsPatch, MAX_DURATION_MIN, MAX_SESSIONS_BEFORE_LONG_BREAK,
    MIN_DURATION_MIN,
};
pub use ticker::{Ticker, TickerHandle};
