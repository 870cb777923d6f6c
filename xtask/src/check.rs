use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

/// Bare-metal target the boot stage runs on.
const EMBEDDED_TARGET: &str = "thumbv7em-none-eabihf";

struct Step {
    label: &'static str,
    args: &'static [&'static str],
    /// Failing steps abort the run; advisory ones only warn.
    required: bool,
}

const STEPS: &[Step] = &[
    Step {
        label: "platform crate (no_std)",
        args: &["check", "-p", "platform", "--target", EMBEDDED_TARGET, "--no-default-features"],
        required: true,
    },
    Step {
        label: "sdcard crate (no_std, defmt)",
        args: &["check", "-p", "sdcard", "--target", EMBEDDED_TARGET, "--features", "defmt"],
        required: true,
    },
    Step {
        label: "library crate (no_std, defmt)",
        args: &["check", "-p", "library", "--target", EMBEDDED_TARGET, "--features", "defmt"],
        required: true,
    },
    Step {
        label: "host tooling",
        args: &["check", "-p", "xtask"],
        required: true,
    },
    Step {
        label: "clippy lints",
        args: &["clippy", "--workspace", "--all-targets", "--all-features", "--", "-D", "warnings"],
        required: false,
    },
    Step {
        label: "code formatting",
        args: &["fmt", "--all", "--check"],
        required: false,
    },
];

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking storage crates...".cyan().bold());
    println!();

    let total_start = Instant::now();

    for step in STEPS {
        println!("{}", format!("  Checking {}...", step.label).cyan());
        let start = Instant::now();

        let output = Command::new("cargo")
            .args(step.args)
            .output()
            .with_context(|| format!("Failed to run {}", step.label))?;

        if output.status.success() {
            println!(
                "{}",
                format!("  ✓ {} passed in {:.2}s", step.label, start.elapsed().as_secs_f64()).green()
            );
        } else if step.required {
            eprintln!("{}", format!("  ✗ {} failed", step.label).red().bold());
            eprintln!();
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
            anyhow::bail!("{} failed", step.label);
        } else {
            eprintln!("{}", format!("  ⚠ {} reported issues", step.label).yellow().bold());
            eprintln!();
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        }
        println!();
    }

    println!(
        "{}",
        format!(
            "✓ All checks completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}
