//! Account scoring commands

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tabled::Tabled;

use crate::client::{ApiClient, PredictionResponse};
use crate::output::{
    color_status, color_verdict, format_probability, print_error, print_json, print_success,
    OutputFormat,
};

/// Account features, given as flags or as a JSON file
#[derive(Args, Debug, Default)]
pub struct AccountArgs {
    /// JSON file holding the account features
    #[arg(long, conflicts_with_all = FEATURE_FLAGS)]
    pub file: Option<PathBuf>,

    #[arg(long)]
    pub username_length: Option<f64>,
    #[arg(long)]
    pub num_posts: Option<f64>,
    #[arg(long)]
    pub num_followers: Option<f64>,
    #[arg(long)]
    pub num_following: Option<f64>,
    #[arg(long)]
    pub account_age_days: Option<f64>,
    /// 1 if the account has a profile picture, 0 otherwise
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub has_profile_picture: Option<u8>,
    /// 1 if the account has a bio, 0 otherwise
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub has_bio: Option<u8>,
    #[arg(long)]
    pub engagement_ratio: Option<f64>,
    /// 1 if the account is verified, 0 otherwise
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub is_verified: Option<u8>,
}

const FEATURE_FLAGS: [&str; 9] = [
    "username_length",
    "num_posts",
    "num_followers",
    "num_following",
    "account_age_days",
    "has_profile_picture",
    "has_bio",
    "engagement_ratio",
    "is_verified",
];

impl AccountArgs {
    /// Build the request body. Flags left out are omitted so the service
    /// reports exactly which field is missing.
    pub fn to_body(&self) -> Result<Value> {
        if let Some(path) = &self.file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let body: Value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            if !body.is_object() {
                bail!("{} must contain a JSON object", path.display());
            }
            return Ok(body);
        }

        let mut map = Map::new();
        let numbers = [
            ("username_length", self.username_length),
            ("num_posts", self.num_posts),
            ("num_followers", self.num_followers),
            ("num_following", self.num_following),
            ("account_age_days", self.account_age_days),
            ("engagement_ratio", self.engagement_ratio),
        ];
        for (name, value) in numbers {
            if let Some(v) = value {
                map.insert(name.to_string(), json!(v));
            }
        }
        let flags = [
            ("has_profile_picture", self.has_profile_picture),
            ("has_bio", self.has_bio),
            ("is_verified", self.is_verified),
        ];
        for (name, value) in flags {
            if let Some(v) = value {
                map.insert(name.to_string(), json!(v));
            }
        }

        if map.is_empty() {
            bail!("Provide account features as flags (e.g. --username-length 12) or with --file");
        }
        Ok(Value::Object(map))
    }
}

/// The account used by `smoke`
pub fn sample_account() -> Value {
    json!({
        "username_length": 12,
        "num_posts": 45,
        "num_followers": 234,
        "num_following": 156,
        "account_age_days": 120,
        "has_profile_picture": 1,
        "has_bio": 1,
        "engagement_ratio": 0.192,
        "is_verified": 0
    })
}

#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Verdict")]
    verdict: String,
    #[tabled(rename = "P(fake)")]
    fake: String,
    #[tabled(rename = "P(real)")]
    real: String,
    #[tabled(rename = "Model")]
    model_version: String,
}

fn print_prediction(result: &PredictionResponse) {
    let row = PredictionRow {
        verdict: color_verdict(result.is_fake),
        fake: format_probability(result.confidence.fake_account),
        real: format_probability(result.confidence.real_account),
        model_version: result.model_version.clone().unwrap_or_else(|| "-".to_string()),
    };
    let table = tabled::Table::new([row])
        .with(tabled::settings::Style::rounded())
        .to_string();
    println!("{}", table);
}

/// Score one account
pub async fn predict(client: &ApiClient, args: &AccountArgs, format: OutputFormat) -> Result<()> {
    let body = args.to_body()?;
    let result = client.predict(&body).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print_prediction(&result),
    }
    Ok(())
}

/// Exercise health, predict and model-info against a running service
pub async fn smoke(client: &ApiClient, format: OutputFormat) -> Result<()> {
    println!("Checking {}", client.base_url());

    let health = client
        .health()
        .await
        .map_err(|e| {
            print_error("Health check failed");
            e
        })
        .context("Is the detector running?")?;
    print_success(&format!(
        "Health: {} (model loaded: {})",
        color_status(health.state.as_deref().unwrap_or(&health.status)),
        health.model_loaded
    ));

    let result = client.predict(&sample_account()).await.map_err(|e| {
        print_error("Prediction failed");
        e
    })?;
    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_success("Prediction succeeded");
            print_prediction(&result);
        }
    }

    let info = client.model_info().await.map_err(|e| {
        print_error("Model info failed");
        e
    })?;
    print_success(&format!(
        "Model: {} with {} features",
        info.model_type,
        info.features.len()
    ));

    print_success("All checks passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_build_body() {
        let args = AccountArgs {
            username_length: Some(12.0),
            has_bio: Some(1),
            ..Default::default()
        };
        let body = args.to_body().unwrap();
        assert_eq!(body["username_length"], json!(12.0));
        assert_eq!(body["has_bio"], json!(1));
        assert!(body.get("num_posts").is_none());
    }

    #[test]
    fn test_no_features_is_an_error() {
        assert!(AccountArgs::default().to_body().is_err());
    }

    #[test]
    fn test_file_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("account.json");
        std::fs::write(&path, sample_account().to_string()).unwrap();

        let args = AccountArgs {
            file: Some(path.clone()),
            ..Default::default()
        };
        assert_eq!(args.to_body().unwrap(), sample_account());

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(args.to_body().is_err());
    }
}
