//! Domain types for the weekly backtest engine.

pub mod bar;
pub mod equity;
pub mod position;
pub mod trade;

pub use bar::{Bar, BarError};
pub use equity::EquityPoint;
pub use position::{EntryType, OpenTrade, PendingEntry};
pub use trade::{ClosedTrade, ExitReason};

/// Symbol type alias.
pub type Symbol = String;
