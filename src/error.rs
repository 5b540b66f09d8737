use thiserror::Error;

use crate::sim::Currency;

/// Reasons a withdrawal form cannot be submitted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WithdrawalError {
    #[error("target wallet address is required")]
    MissingAddress,

    #[error("amount {0:?} is not a positive number")]
    InvalidAmount(String),

    #[error("requested {requested} {currency} but only {available} available")]
    InsufficientFunds {
        currency: Currency,
        requested: f64,
        available: f64,
    },

    #[error("withdrawal form is not accepting input")]
    NotAccepting,
}

/// Failures talking to the insight provider. Never shown to the user; the
/// provider swaps in the fallback insight instead.
#[derive(Error, Debug)]
pub enum InsightError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider returned no text")]
    EmptyResponse,

    #[error("malformed insight payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("volatility index {0} outside 0-100")]
    VolatilityOutOfRange(i64),
}
