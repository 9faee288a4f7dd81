//! Offline image and snapshot comparison

use std::path::Path;

use console::style;
use storyprobe::{load_snapshot, DiffEntry, ImageComparator, ProbeError};

use crate::commands::{ImageDiffArgs, SnapshotDiffArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Outcome of `diff image`
#[derive(Debug, Clone, PartialEq)]
pub struct ImageReport {
    /// Differing pixels
    pub diff_pixels: u64,
    /// Compared pixels
    pub total_pixels: u64,
    /// Fraction of differing pixels
    pub mismatch_ratio: f64,
    /// Threshold applied
    pub threshold: f64,
    /// Whether the diff image was written
    pub diff_written: bool,
}

impl ImageReport {
    /// Ratio within the threshold
    #[must_use]
    pub fn passed(&self) -> bool {
        self.mismatch_ratio <= self.threshold
    }
}

/// Execute `diff image`
pub fn execute_image(config: &CliConfig, args: &ImageDiffArgs) -> CliResult<()> {
    let threshold = match args.threshold {
        Some(t) => t,
        None => config.probe_config()?.visual.threshold,
    };
    let report = compare_images(args, threshold)?;
    if !config.verbosity.is_quiet() {
        let verdict = if report.passed() {
            style("PASS").green().bold()
        } else {
            style("FAIL").red().bold()
        };
        println!(
            "{verdict} {}/{} pixels differ (ratio {:.4}, threshold {})",
            report.diff_pixels, report.total_pixels, report.mismatch_ratio, report.threshold
        );
        if report.diff_written {
            if let Some(ref out) = args.diff_out {
                println!("diff image: {}", out.display());
            }
        }
    }
    if report.passed() {
        Ok(())
    } else {
        Err(CliError::mismatch("images"))
    }
}

/// Compare two PNG files, writing the diff image on mismatch when asked
pub fn compare_images(args: &ImageDiffArgs, threshold: f64) -> CliResult<ImageReport> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(CliError::invalid_argument(format!(
            "threshold must be within 0.0..=1.0, got {threshold}"
        )));
    }
    let baseline = read_input(&args.baseline)?;
    let candidate = read_input(&args.candidate)?;
    let diff = ImageComparator::new()
        .with_color_threshold(args.color_threshold)
        .compare(&baseline, &candidate)?;

    let mut report = ImageReport {
        diff_pixels: diff.diff_pixels,
        total_pixels: diff.total_pixels,
        mismatch_ratio: diff.mismatch_ratio(),
        threshold,
        diff_written: false,
    };
    if !report.passed() {
        if let (Some(out), Some(png)) = (&args.diff_out, &diff.diff_image) {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, png)?;
            report.diff_written = true;
        }
    }
    Ok(report)
}

/// Execute `diff snapshot`
pub fn execute_snapshot(config: &CliConfig, args: &SnapshotDiffArgs) -> CliResult<()> {
    let entries = compare_snapshots(args)?;
    if entries.is_empty() {
        if !config.verbosity.is_quiet() {
            println!("{} snapshots match", style("PASS").green().bold());
        }
        return Ok(());
    }
    if !config.verbosity.is_quiet() {
        println!(
            "{} {} difference(s)",
            style("FAIL").red().bold(),
            entries.len()
        );
        for entry in &entries {
            println!("  {entry}");
        }
    }
    Err(CliError::mismatch("snapshots"))
}

/// Structural differences between two snapshot files
pub fn compare_snapshots(args: &SnapshotDiffArgs) -> CliResult<Vec<DiffEntry>> {
    let baseline = load_snapshot(&args.baseline)?;
    let candidate = load_snapshot(&args.candidate)?;
    Ok(baseline.diff(&candidate))
}

fn read_input(path: &Path) -> CliResult<Vec<u8>> {
    if !path.is_file() {
        return Err(ProbeError::BaselineNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(std::fs::read(path)?)
}
