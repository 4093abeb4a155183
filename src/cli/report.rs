//! Console summaries printed at the end of each subcommand

use crate::augment::AugmentReport;
use crate::clean::{IntegrityReport, SimilarityReport};
use crate::dataset::{RepairReport, SetupOutcome};
use crate::segment::SegmentationReport;
use std::path::Path;

fn rule(width: usize) -> String {
    "=".repeat(width)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn print_aborted(reason: &str) {
    println!("❌ {reason}");
}

pub(crate) fn print_setup(outcome: &SetupOutcome) {
    match outcome {
        SetupOutcome::AlreadyPrepared { class_dirs } => {
            println!("Dataset appears to be ready ({class_dirs} class folders detected).");
        },
        SetupOutcome::Completed {
            classes,
            images,
            raw_root,
        } => {
            println!("Setup complete.");
            println!("   - Classes: {classes}");
            println!("   - Total images: {images}");
            println!("   - Location: {}", raw_root.display());
        },
        SetupOutcome::Aborted { reason } => print_aborted(reason),
    }
}

pub(crate) fn print_repair(report: &RepairReport) {
    println!("\n{}", rule(40));
    println!("Verification complete.");
    println!("   - Source images: {}", report.total);
    println!("   - Matches: {}", report.matched);
    println!("   - Fixed: {}", report.restored);
    println!("{}", rule(40));
}

pub(crate) fn print_segmentation(report: &SegmentationReport) {
    println!("\n{}", rule(40));
    println!("Completed in {:.2}s", report.elapsed.as_secs_f64());
    println!("Success: {}", report.succeeded);
    println!("Skipped: {}", report.skipped);
    println!("Failed: {}", report.failed);
    println!("Output: {}", report.output_root.display());
    println!("{}", rule(40));
}

pub(crate) fn print_augment(report: &AugmentReport) {
    println!("Found {} raw images", report.sources);
    println!("Task complete! Total generated: {}", report.generated);
    println!("Output: {}", report.output_root.display());
}

pub(crate) fn print_integrity(report: &IntegrityReport) {
    println!("\n{}", rule(50));
    println!("📊 Scan Report - {}", report.root.display());
    println!("{}", rule(50));
    println!("✅ Valid files: {}", report.valid());
    println!("❌ Corrupted files: {}", report.corrupt());

    if report.failures.is_empty() {
        println!("✨ Perfect! No corrupted files found.");
        return;
    }

    println!("\n[Corrupted File Details]");
    for (i, failure) in report.itemized().iter().enumerate() {
        let status = if failure.deleted { "Deleted" } else { "Pending" };
        println!("  {}. [{status}] {}: {}", i + 1, failure.issue, file_name(&failure.path));
    }
    if report.corrupt() > report.itemized().len() {
        println!("  ... and {} more files", report.corrupt() - report.itemized().len());
    }

    println!("{}", "-".repeat(50));
    if report.delete_mode {
        println!("🗑️  Successfully cleaned {} corrupted files.", report.deleted());
        println!("🚀 You can now re-run the generation step to fill these gaps.");
    } else {
        println!(
            "💡 Found {} corrupted files. Run with --delete to clean them.",
            report.corrupt()
        );
        println!(
            "   Example: petaug clean-integrity --target-dir {} --delete",
            report.root.display()
        );
    }
}

pub(crate) fn print_similarity(report: &SimilarityReport) {
    println!(
        "🔍 Scanned {} augmented images ({} audited, {} without a source)",
        report.scanned, report.audited, report.skipped
    );
    println!("\n{}", rule(50));
    println!("📊 Cleaning Report");
    println!("{}", rule(50));

    if report.substandard.is_empty() {
        println!("✨ All images meet quality standards!");
        return;
    }

    println!(
        "❌ Found {} substandard images (Similarity < {}):",
        report.substandard.len(),
        report.threshold
    );
    for (i, finding) in report.itemized().iter().enumerate() {
        let status = if finding.deleted { "Deleted" } else { "Suggested Delete" };
        println!(
            "  {}. [{status}] Score {:.3}: {}",
            i + 1,
            finding.score,
            file_name(&finding.path)
        );
    }
    if report.substandard.len() > report.itemized().len() {
        println!("  ... and {} others", report.substandard.len() - report.itemized().len());
    }

    if report.delete_mode {
        println!("🗑️ Successfully deleted {} garbage images.", report.deleted());
    } else {
        println!(
            "\n💡 Run: petaug clean-similarity --delete --aug-dir {} to execute deletion.",
            report.root.display()
        );
    }
}
