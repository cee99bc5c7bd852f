//! Forecast request URLs
//!
//! `{base}/{start}--{end}:PT1H/{parameters}/{lat},{lon}/json`

use chrono::{DateTime, Duration, Utc};

use crate::auth::AccessToken;
use crate::models::Coordinate;

pub const DEFAULT_API_BASE_URL: &str = "https://api.meteomatics.com";

/// Wind speed, wind direction, hourly gusts and hourly precipitation
pub const FORECAST_PARAMETERS: [&str; 4] = [
    "wind_speed_10m:ms",
    "wind_dir_10m:d",
    "wind_gusts_10m_1h:ms",
    "precip_1h:mm",
];

pub const FORECAST_HORIZON_DAYS: i64 = 7;

/// ISO 8601 step between forecast values
pub const RESOLUTION: &str = "PT1H";

const OUTPUT_FORMAT: &str = "json";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Query for one coordinate, anchored at a fixed `now`
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub point: String,
}

impl ForecastRequest {
    #[must_use]
    pub fn new(coordinate: &Coordinate, now: DateTime<Utc>) -> Self {
        Self {
            start: now,
            end: now + Duration::days(FORECAST_HORIZON_DAYS),
            point: coordinate.point(),
        }
    }

    /// `{start}--{end}:PT1H`
    #[must_use]
    pub fn time_range(&self) -> String {
        format!(
            "{}--{}:{}",
            self.start.format(TIMESTAMP_FORMAT),
            self.end.format(TIMESTAMP_FORMAT),
            RESOLUTION
        )
    }

    /// Full data URL without credentials
    #[must_use]
    pub fn url(&self, base_url: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            base_url.trim_end_matches('/'),
            self.time_range(),
            FORECAST_PARAMETERS.join(","),
            self.point,
            OUTPUT_FORMAT
        )
    }
}

/// Build the data URL for `coordinate` with the window starting at `now`
#[must_use]
pub fn build_url(base_url: &str, coordinate: &Coordinate, now: DateTime<Utc>) -> String {
    ForecastRequest::new(coordinate, now).url(base_url)
}

/// Append the token as the `access_token` query credential
#[must_use]
pub fn with_access_token(url: &str, token: &AccessToken) -> String {
    format!("{url}?access_token={}", urlencoding::encode(token.secret()))
}
