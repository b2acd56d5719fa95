use std::path::{Path, PathBuf};

use console::Style;
use lightcurve_core::pipeline::config::PipelineConfig;
use lightcurve_core::pipeline::BatchReport;
use lightcurve_core::quality::QualityVerdict;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
    good: Style,
    failed: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
            good: Style::new().green().bold(),
            failed: Style::new().red().bold(),
        }
    }
}

pub fn print_run_summary(config: &PipelineConfig, batches: &[PathBuf], output: &Path) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Light Curve Extraction"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(22)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Batches"),
        s.value.apply_to(batches.len())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(output.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Telescope"),
        s.value.apply_to(&config.archive.telescope)
    );
    println!();

    println!("  {}", s.header.apply_to("Source"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Format"),
        s.method.apply_to(config.source.format)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Gain"),
        s.method.apply_to(config.source.gain)
    );
    if config.calibration.use_dark_flat {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Calibration"),
            s.value.apply_to("bias, dark, flat")
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Calibration"),
            s.disabled.apply_to("bias only")
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Reference"));
    if config.stacking.count == 0 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Stack"),
            s.disabled.apply_to("disabled")
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Stack"),
            s.method.apply_to(format!(
                "{} of frames {}..{}",
                config.stacking.method,
                config.stacking.start,
                config.stacking.start + config.stacking.count
            ))
        );
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Threshold"),
        s.value.apply_to(format!("{} sigma", config.detection.threshold_sigma))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Min stars"),
        s.value.apply_to(config.detection.min_stars)
    );
    println!();

    println!("  {}", s.header.apply_to("Photometry"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Aperture"),
        s.value.apply_to(format!("{} px", config.photometry.aperture_radius))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Annulus"),
        s.value.apply_to(format!(
            "+{} .. +{} px",
            config.photometry.annulus_inner, config.photometry.annulus_outer
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Edge"),
        s.value.apply_to(format!("{} px", config.photometry.edge_margin))
    );
    println!();
}

pub fn print_batch_reports(reports: &[BatchReport]) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Results"));
    for report in reports {
        let name = report
            .directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| report.directory.display().to_string());

        match &report.outcome {
            Ok(result) => {
                println!(
                    "    {:<28}{} {} frames, {} stars, {} good",
                    s.label.apply_to(&name),
                    s.good.apply_to("ok"),
                    result.frame_count(),
                    result.star_count(),
                    s.value.apply_to(result.good_count()),
                );
                let rejected: Vec<String> = [
                    QualityVerdict::TooShort,
                    QualityVerdict::TrackingFailure,
                    QualityVerdict::LowSnr,
                ]
                .into_iter()
                .filter_map(|v| {
                    let n = result.count_verdict(v);
                    (n > 0).then(|| format!("{n} {v}"))
                })
                .collect();
                if !rejected.is_empty() {
                    println!(
                        "    {:<28}{}",
                        "",
                        s.disabled.apply_to(rejected.join(", "))
                    );
                }
                if result.skipped_frames > 0 {
                    println!(
                        "    {:<28}{}",
                        "",
                        s.disabled
                            .apply_to(format!("{} unreadable frames skipped", result.skipped_frames))
                    );
                }
                if let Some(dir) = &result.archive_dir {
                    println!("    {:<28}{}", "", s.path.apply_to(dir.display()));
                }
            }
            Err(failure) => {
                println!(
                    "    {:<28}{} {}",
                    s.label.apply_to(&name),
                    s.failed.apply_to("failed"),
                    failure
                );
            }
        }
    }
    println!();
}
