//! Image inspection commands.

use std::path::Path;

use anyhow::Context;
use console::style;

use rechtbank::config::Settings;
use rechtbank::imaging::{ImageAsset, NormalizeOutcome, Normalizer};
use rechtbank::utils::{format_reduction, format_size};

/// Print format, size and dimensions of an image file.
pub fn cmd_detect(file: &Path) -> anyhow::Result<()> {
    let data =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let asset = ImageAsset::new(&data);

    println!("{}", style(file.display()).bold());
    println!("  {:<12} {}", "Format:", asset.format());
    println!(
        "  {:<12} {}",
        "MIME type:",
        asset.format().mime_type().unwrap_or("-")
    );
    println!("  {:<12} {}", "Size:", format_size(asset.len() as u64));
    match asset.dimensions() {
        Some((w, h)) => println!("  {:<12} {}x{}", "Dimensions:", w, h),
        None => println!("  {:<12} {}", "Dimensions:", style("unreadable").dim()),
    }

    Ok(())
}

/// Normalize an image file and report the branch taken.
pub fn cmd_normalize(settings: &Settings, file: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let data =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let normalizer = Normalizer::new(settings.normalize.clone());
    let result = normalizer.normalize(&data);

    let outcome = match result.outcome {
        NormalizeOutcome::Compressed => style(result.outcome.as_str()).green(),
        NormalizeOutcome::DecodeFailed | NormalizeOutcome::EncodeFailed => {
            style(result.outcome.as_str()).red()
        }
        _ => style(result.outcome.as_str()).yellow(),
    };

    println!("{}", style(file.display()).bold());
    println!("  {:<10} {}", "Format:", result.format);
    println!("  {:<10} {}", "Outcome:", outcome);
    println!("  {:<10} {}", "Resized:", if result.resized { "yes" } else { "no" });
    println!(
        "  {:<10} {}",
        "Size:",
        format_reduction(result.original_size as u64, result.len() as u64)
    );

    if let Some(output) = output {
        std::fs::write(output, &result.bytes)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("  {:<10} {}", "Written:", output.display());
    }

    Ok(())
}
