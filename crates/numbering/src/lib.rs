//! Gap-free test numbering
//!
//! This crate hands out sequential, human-readable numbers ("Test #7") per
//! class, or per class and subject. It provides:
//! - A counter table advanced only inside database transactions
//! - An assignment log recording every issued number and the test it ends up on
//! - Label formatting (simple, zero-padded, roman)
//! - Advisory next-number suggestions based on gaps in the log
//!
//! Storage goes through SeaORM, so MySQL/TiDB and SQLite both work.

pub mod assignment;
pub mod cli;
pub mod config;
pub mod counter;
pub mod database;
pub mod entity;
pub mod error;
pub mod format;
pub mod scope;
pub mod service;
pub mod suggest;

pub use config::{LabelConfig, NumberingConfig};
pub use database::DatabaseManager;
pub use error::{NumberingError, Result};
pub use format::{format_number, to_roman, DisplayFormat, FormatError, NumberStyle};
pub use scope::{scope_key, Scope};
pub use service::{CounterStatus, IssuedNumber, NumberingService};
pub use suggest::{next_available, Suggestion};
