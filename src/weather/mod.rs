//! Meteomatics forecast retrieval
//!
//! `request` derives the time-windowed query URL for a coordinate,
//! `client` performs the HTTP call with the process-wide shared client.

pub mod client;
pub mod request;

pub use client::ForecastClient;
pub use request::{FORECAST_HORIZON_DAYS, FORECAST_PARAMETERS, ForecastRequest};
