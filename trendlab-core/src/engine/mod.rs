//! The backtest engine: per-day fill/exit processing over an owned `EngineState`.

pub mod config;
pub mod day_loop;
pub mod state;

pub use config::{EngineConfig, ExitMode, TieBreaker};
pub use day_loop::{apply_manual_exits, process_day, timeout_close_all, EngineError};
pub use state::EngineState;

#[cfg(test)]
mod tests {
    use super::*;

    /// Documents the invariant the signal generator's contract depends on:
    /// `EngineState` is owned exclusively by the engine, never by a trade.
    #[test]
    fn engine_state_is_send_sync() {
        fn require_send_sync<T: Send + Sync>() {}
        require_send_sync::<EngineState>();
        require_send_sync::<EngineConfig>();
    }
}
