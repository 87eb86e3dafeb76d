//! Model lifecycle commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_score, color_status, format_timestamp, print_info, print_json, print_success,
    print_warning, OutputFormat,
};

#[derive(Tabled)]
struct ImportanceRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Importance")]
    importance: String,
}

#[derive(Tabled)]
struct ClassRow {
    #[tabled(rename = "Class")]
    class: &'static str,
    #[tabled(rename = "Precision")]
    precision: String,
    #[tabled(rename = "Recall")]
    recall: String,
    #[tabled(rename = "F1")]
    f1: String,
    #[tabled(rename = "Support")]
    support: usize,
}

/// Show service health
pub async fn health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Table => {
            println!("Status:        {}", color_status(&health.status));
            if let Some(state) = &health.state {
                println!("Serving state: {}", color_status(state));
            }
            println!("Model loaded:  {}", health.model_loaded);
            println!("Scaler loaded: {}", health.scaler_loaded);
            if let Some(version) = &health.model_version {
                println!("Model version: {}", version);
            }
            if !health.model_loaded {
                print_warning("No model is loaded; run `fad train`");
            }
        }
    }
    Ok(())
}

/// Retrain the model
pub async fn train(client: &ApiClient, format: OutputFormat) -> Result<()> {
    if let OutputFormat::Table = format {
        print_info("Training a new model, this can take a while...");
    }
    let result = client.train().await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_success(&result.message);
            println!("Accuracy: {}", color_score(result.accuracy));
            println!("Trained:  {}", format_timestamp(&result.timestamp));
            if let Some(version) = &result.version {
                println!("Version:  {}", version);
            }
        }
    }
    Ok(())
}

/// Show model metadata and feature importances
pub async fn info(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let info = client.model_info().await?;

    match format {
        OutputFormat::Json => print_json(&info)?,
        OutputFormat::Table => {
            println!("Model type: {}", info.model_type);
            if let Some(version) = &info.version {
                println!("Version:    {}", version);
            }
            if let Some(trained_at) = &info.trained_at {
                println!("Trained:    {}", format_timestamp(trained_at));
            }
            if let (Some(trees), Some(depth)) = (info.n_estimators, info.max_depth) {
                println!("Forest:     {} trees, max depth {}", trees, depth);
            }
            println!("Features:   {}", info.features.len());

            if let Some(eval) = &info.evaluation {
                println!("\nHeld-out accuracy: {}", color_score(eval.accuracy));
                let rows = [("real", &eval.real), ("fake", &eval.fake)]
                    .into_iter()
                    .map(|(class, m)| ClassRow {
                        class,
                        precision: color_score(m.precision),
                        recall: color_score(m.recall),
                        f1: color_score(m.f1),
                        support: m.support,
                    });
                let table = tabled::Table::new(rows)
                    .with(tabled::settings::Style::rounded())
                    .to_string();
                println!("{}", table);
            }

            if info.feature_importance.is_empty() {
                print_warning("No feature importances reported");
            } else {
                let rows = info
                    .feature_importance
                    .iter()
                    .enumerate()
                    .map(|(i, f)| ImportanceRow {
                        rank: i + 1,
                        feature: f.feature.clone(),
                        importance: format!("{:.4}", f.importance),
                    });
                let table = tabled::Table::new(rows)
                    .with(tabled::settings::Style::rounded())
                    .to_string();
                println!("\n{}", table);
            }
        }
    }
    Ok(())
}
