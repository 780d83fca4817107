use std::env::var;

use dotenvy::dotenv;

use crate::{
    application::handlers::dispatch_queue::ShutdownPolicy, domain::models::DEFAULT_PROFILE,
    infrastructure::messaging::Endpoints,
};

pub const DEFAULT_LOG_FILTER: &str = "messages=info";

#[derive(Debug, Clone)]
pub struct Config {
    pub profile: String,
    pub shutdown_policy: ShutdownPolicy,
    pub log_filter: String,
    /// Provider API base URLs, overridable with `TELEGRAM_API_URL`,
    /// `SLACK_API_URL` and `TWILIO_API_URL`.
    pub endpoints: Endpoints,
}

impl Config {
    pub fn try_parse() -> Result<Config, String> {
        let _ = dotenv();
        Self::try_parse_with(|key| var(key).ok())
    }

    pub fn try_parse_with(env: impl Fn(&str) -> Option<String>) -> Result<Config, String> {
        let shutdown_policy = match env("MESSAGES_SHUTDOWN") {
            Some(value) => value
                .parse::<ShutdownPolicy>()
                .map_err(|err| format!("An error occured while parsing MESSAGES_SHUTDOWN env param: {err}"))?,
            None => ShutdownPolicy::default(),
        };

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            telegram: env("TELEGRAM_API_URL").unwrap_or(defaults.telegram),
            slack: env("SLACK_API_URL").unwrap_or(defaults.slack),
            twilio: env("TWILIO_API_URL").unwrap_or(defaults.twilio),
        };

        Ok(Config {
            profile: env("MESSAGES_PROFILE")
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
            shutdown_policy,
            log_filter: env("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            endpoints,
        })
    }
}
