//! Command-line client for the lenkwerk decision service.
//!
//! Talks to a running `lenkwerk-api` instance over HTTP and prints the raw
//! JSON responses, so it slots into shell pipelines and jq.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "lenkwerk", version, about = "Client for the lenkwerk decision service")]
struct Cli {
    /// Base URL of the running service
    #[arg(long, default_value = "http://127.0.0.1:8791")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a decision over the given candidate actions
    Act {
        /// Candidate action id (repeatable)
        #[arg(short, long = "action", required = true)]
        actions: Vec<String>,

        /// Context feature as key=value (repeatable)
        #[arg(short, long = "feature")]
        features: Vec<String>,
    },
    /// Report an observed reward for an action
    Learn {
        /// Action the reward belongs to
        action_id: String,

        /// Observed reward
        reward: f64,

        /// Context feature as key=value (repeatable)
        #[arg(short, long = "feature")]
        features: Vec<String>,
    },
    /// Probe service liveness
    Health,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = reqwest::blocking::Client::new();

    let response = match cli.command {
        Commands::Act { actions, features } => {
            let payload = json!({
                "state": {"features": feature_map(&features)?},
                "actions": actions,
            });
            client
                .post(format!("{}/rl/act", cli.url))
                .json(&payload)
                .send()
        }
        Commands::Learn {
            action_id,
            reward,
            features,
        } => {
            let payload = json!({
                "state": {"features": feature_map(&features)?},
                "action_id": action_id,
                "reward": reward,
            });
            client
                .post(format!("{}/rl/learn", cli.url))
                .json(&payload)
                .send()
        }
        Commands::Health => client.get(format!("{}/health", cli.url)).send(),
    }
    .context("request to lenkwerk service failed")?;

    let status = response.status();
    let body: Value = response.json().context("non-JSON response from service")?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        bail!("service answered with {status}");
    }
    Ok(())
}

/// Parses repeated `key=value` arguments into a JSON feature object.
/// Values that read as numbers are sent as numbers, everything else as a
/// string (the service drops non-numeric entries on its side).
fn feature_map(raw: &[String]) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for item in raw {
        let Some((key, value)) = item.split_once('=') else {
            bail!("feature '{item}' is not of the form key=value");
        };
        if key.is_empty() {
            bail!("feature '{item}' has an empty key");
        }
        let value = match value.parse::<f64>() {
            Ok(n) => json!(n),
            Err(_) => Value::String(value.to_string()),
        };
        map.insert(key.to_string(), value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn features_parse_into_numbers_where_possible() {
        let map = feature_map(&[
            "load=0.9".to_string(),
            "zone=edge".to_string(),
            "retries=3".to_string(),
        ])
        .unwrap();
        assert_eq!(map["load"], json!(0.9));
        assert_eq!(map["zone"], json!("edge"));
        assert_eq!(map["retries"], json!(3.0));
    }

    #[test]
    fn malformed_features_are_rejected() {
        assert!(feature_map(&["no-equals".to_string()]).is_err());
        assert!(feature_map(&["=1.0".to_string()]).is_err());
    }

    #[test]
    fn later_duplicate_keys_win() {
        let map = feature_map(&["a=1".to_string(), "a=2".to_string()]).unwrap();
        assert_eq!(map["a"], json!(2.0));
    }
}
