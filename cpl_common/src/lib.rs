//! Value types shared between the ChatPesa ledger engine and its HTTP server.
mod amount;

pub mod helpers;

pub use amount::{Amount, AmountConversionError, DEFAULT_CURRENCY_CODE};
