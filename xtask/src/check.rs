use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::Step;

const EMBEDDED_TARGET: &str = "thumbv7em-none-eabihf";

const HOST: &[Step] = &[
    Step::required(
        "Host build (all features)",
        &["check", "--workspace", "--all-targets", "--features", "st7789v/emulator"],
    ),
];

const NO_STD: &[Step] = &[
    Step::required(
        "st7789v-platform (no_std)",
        &["check", "-p", "st7789v-platform", "--target", EMBEDDED_TARGET],
    ),
    Step::required(
        "st7789v (no_std)",
        &["check", "-p", "st7789v", "--target", EMBEDDED_TARGET],
    ),
    Step::required(
        "st7789v (no_std + defmt)",
        &["check", "-p", "st7789v", "--target", EMBEDDED_TARGET, "--features", "defmt"],
    ),
];

const LINT: &[Step] = &[
    Step::advisory(
        "Clippy",
        &["clippy", "--workspace", "--all-targets", "--features", "st7789v/emulator", "--", "-D", "warnings"],
    ),
    Step::advisory("Formatting", &["fmt", "--all", "--check"]),
];

pub fn run(host_only: bool) -> Result<()> {
    println!();
    println!("{}", "🔍 Checking driver builds...".cyan().bold());
    println!();

    let total_start = Instant::now();

    let mut steps: Vec<&Step> = HOST.iter().collect();
    if !host_only {
        steps.extend(NO_STD);
    }
    steps.extend(LINT);

    for step in steps {
        step.run()?;
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
