use anyhow::{Context, bail};
use secrecy::SecretString;
use serde_json::{Map, Value};

use crate::{
    application::usecases::send_message::{Delivery, SendMessageRequest},
    config::Config,
    domain::models::MessageFields,
    presentation::cli::SendArgs,
};

pub async fn map_send_request(args: SendArgs, config: &Config) -> anyhow::Result<SendMessageRequest> {
    let body = match (&args.body, &args.file) {
        (_, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read body from {}", path.display()))?,
        (Some(body), None) => body.clone(),
        (None, None) => String::new(),
    };

    let fields = MessageFields {
        from: args.from,
        to: trim_all(args.to),
        cc: trim_all(args.cc),
        bcc: trim_all(args.bcc),
        subject: args.subject,
        body,
        attachments: trim_all(args.attachments),
        params: parse_params(&args.params)?,
        profile: Some(args.profile.unwrap_or_else(|| config.profile.clone())),
        credentials: args.credentials.map(SecretString::from),
        verbose: args.verbose,
    };

    Ok(SendMessageRequest {
        channel: args.channel,
        fields,
        delivery: if args.queued {
            Delivery::Queued
        } else {
            Delivery::Immediate
        },
        dry_run: args.dry_run,
    })
}

fn trim_all(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Parses `key=value` pairs; values that are valid JSON keep their type.
pub fn parse_params(pairs: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut params = Map::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid param '{pair}', expected key=value");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("invalid param '{pair}', key is empty");
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(params)
}
