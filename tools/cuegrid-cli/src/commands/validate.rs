//! Validate a show file.

use std::path::{Path, PathBuf};

use cuegrid_show_model::Show;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating show at: {}", path.display());

    let show = Show::load(&path).map_err(|e| anyhow::anyhow!("Failed to load show: {e}"))?;

    println!("  Name: {}", show.name);
    println!("  Version: {}", show.version);
    println!("  Slots: {}", show.grid.len());
    println!("  Trigger columns: {}", show.grid.trigger_columns().len());

    let base_dir = path.parent().unwrap_or(Path::new("."));
    let errors = show.validate_media(base_dir);
    if errors.is_empty() {
        println!("  Media: All present");
        println!("\nShow is valid.");
    } else {
        println!("\nValidation issues:");
        for error in &errors {
            println!("  - {error}");
        }
        println!(
            "\n{} issue(s) found. Affected slots will refuse to play.",
            errors.len()
        );
    }

    Ok(())
}
