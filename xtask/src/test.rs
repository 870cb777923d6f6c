use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

pub fn run(unit_only: bool, integration_only: bool) -> Result<()> {
    println!();
    println!("{}", "🧪 Running tests...".cyan().bold());
    println!();

    let total_start = Instant::now();

    let run_unit = !integration_only;
    let run_integration = !unit_only;

    if run_unit {
        run_suite("Unit tests", &["test", "--lib", "--workspace"], true)?;
    }

    // Integration tests are gated on `std` / `sim`, so enable every feature.
    if run_integration {
        run_suite(
            "Integration tests",
            &["test", "--tests", "--workspace", "--all-features"],
            true,
        )?;
    }

    run_suite("Doc tests", &["test", "--doc", "--workspace", "--all-features"], false)?;

    println!(
        "{}",
        format!(
            "✓ All tests completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}

fn run_suite(label: &str, args: &[&str], required: bool) -> Result<()> {
    println!("{}", format!("  Running {}...", label.to_lowercase()).cyan());
    let start = Instant::now();

    let output = Command::new("cargo")
        .args(args)
        .output()
        .with_context(|| format!("Failed to run {}", label.to_lowercase()))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if output.status.success() {
        println!(
            "{}",
            format!(
                "  ✓ {} passed {} in {:.2}s",
                label,
                extract_test_summary(&stdout),
                start.elapsed().as_secs_f64()
            )
            .green()
        );
    } else if required {
        eprintln!("{}", format!("  ✗ {label} failed").red().bold());
        eprintln!();
        for line in stdout.lines() {
            eprintln!("  {}", line);
        }
        anyhow::bail!("{label} failed");
    } else {
        eprintln!("{}", format!("  ⚠ {label} failed").yellow().bold());
    }
    println!();
    Ok(())
}

/// Sum the `test result:` lines of a multi-crate run.
fn extract_test_summary(output: &str) -> String {
    let mut passed = 0u32;
    let mut failed = 0u32;
    let mut seen = false;
    for line in output.lines() {
        let Some(summary) = line.split("test result:").nth(1) else {
            continue;
        };
        seen = true;
        for part in summary.split(';') {
            let mut words = part.split_whitespace().rev();
            let (Some(kind), Some(count)) = (words.next(), words.next()) else {
                continue;
            };
            let count: u32 = count.parse().unwrap_or(0);
            match kind {
                "passed" => passed = passed.saturating_add(count),
                "failed" => failed = failed.saturating_add(count),
                _ => {}
            }
        }
    }
    if seen {
        format!("({passed} passed; {failed} failed)")
    } else {
        "(summary not available)".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn summary_adds_up_crates() {
        let out = "\
test result: ok. 5 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out
test result: ok. 12 passed; 1 failed; 2 ignored; 0 measured; 0 filtered out";
        assert_eq!(extract_test_summary(out), "(17 passed; 1 failed)");
    }

    #[test]
    fn summary_missing() {
        assert_eq!(extract_test_summary("nothing here"), "(summary not available)");
    }
}
