use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::step::Step;

const BUILD: Step = Step::required(
    "Documentation",
    &["doc", "--workspace", "--no-deps", "--features", "st7789v/emulator"],
);

const BUILD_AND_OPEN: Step = Step::required(
    "Documentation",
    &["doc", "--workspace", "--no-deps", "--features", "st7789v/emulator", "--open"],
);

const INDEX: &str = "target/doc/st7789v/index.html";

pub fn run(open: bool) -> Result<()> {
    println!();
    println!("{}", "📚 Building documentation...".cyan().bold());
    println!();

    let step = if open { &BUILD_AND_OPEN } else { &BUILD };
    step.run()?;

    if !open {
        let hint = if Path::new(INDEX).exists() {
            format!("Open {INDEX}, or run 'cargo xtask doc --open'")
        } else {
            "Run 'cargo xtask doc --open' to browse the docs".to_string()
        };
        println!("   {}", hint.dimmed());
    }
    println!();

    Ok(())
}
