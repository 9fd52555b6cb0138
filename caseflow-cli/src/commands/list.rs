//! caseflow list - show installed logic packages

use std::path::Path;

use anyhow::Result;
use caseflow_runtime::{DylibLoader, LogicLoader, version};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

use crate::config::ConfigLoader;

pub fn run() -> Result<()> {
    let config = ConfigLoader::load()?;
    let dir = &config.plugins.dir;
    let versions = version::scan_versions(dir);

    if versions.is_empty() {
        println!("No logic installed in {}", dir.display());
        println!();
        println!("To install packages from the registry:");
        println!("  caseflow fetch            # everything, latest versions");
        println!("  caseflow fetch <name>     # one package");
        return Ok(());
    }

    println!("{}", render(dir, &versions));
    Ok(())
}

fn render(dir: &Path, versions: &version::VersionMap) -> Table {
    let extension = DylibLoader.extension();
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Logic").fg(Color::Cyan),
            Cell::new("Version").fg(Color::Cyan),
            Cell::new("Entry").fg(Color::Cyan),
        ]);

    for (name, latest) in versions {
        let entry = version::entry_file_path(dir, name, latest, extension);
        let status = if entry.is_file() {
            Cell::new("✓").fg(Color::Green)
        } else {
            Cell::new("✗ missing").fg(Color::Red)
        };
        table.add_row(vec![Cell::new(name), Cell::new(latest), status]);
    }

    table
}
