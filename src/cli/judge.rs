//! Judge a photo end to end against the configured classifier.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use console::style;

use rechtbank::config::Settings;
use rechtbank::models::PhotoMetadata;
use rechtbank::services::{ServiceError, VerdictService};

pub async fn cmd_judge(
    settings: &Settings,
    file: &Path,
    raw: bool,
    deadline: Option<u64>,
) -> anyhow::Result<()> {
    let data =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let metadata = PhotoMetadata {
        filename: file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        content_type: String::new(),
        size: data.len() as u64,
    };

    let mut service = VerdictService::from_settings(settings)?;
    if let Some(secs) = deadline {
        service = service.with_deadline(Duration::from_secs(secs));
    }

    match service.judge_photo(&data, &metadata).await {
        Ok(response) => {
            if raw {
                println!("{}", response.raw_json);
            } else {
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!(
                "{} {} (HTTP {})",
                style("✗").red(),
                e,
                style(e.status_code()).dim()
            );
            if let ServiceError::Analysis(analysis) = &e {
                if let Some(wait) = analysis.retry_after() {
                    eprintln!("  Retry after {}s", wait.as_secs());
                }
            }
            Err(e.into())
        }
    }
}
