//! `jobflow render`, `jobflow plan` and `jobflow validate`.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use jobflow_core::definition::{AutomationFile, load_automation_file};
use jobflow_core::executor::plan_waves;
use jobflow_core::generator::{self, GeneratorOptions};
use jobflow_core::graph::{Automation, BuildMode};
use jobflow_types::config::GlobalConfig;

use super::DocumentFormat;

fn load(file: &Path) -> Result<AutomationFile> {
    load_automation_file(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn build(definition: &AutomationFile, mode: BuildMode) -> Result<Automation> {
    definition
        .build(mode)
        .with_context(|| format!("Automation '{}' is invalid", definition.name))
}

// ---------------------------------------------------------------------------
// Render
// ---------------------------------------------------------------------------

pub fn handle_render(file: &Path, format: DocumentFormat, config: &GlobalConfig, json: bool) -> Result<()> {
    let automation = build(&load(file)?, BuildMode::Generate)?;
    let document = generator::render(&automation, &GeneratorOptions::from_config(config));

    let text = if json || format == DocumentFormat::Json {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_yaml_ng::to_string(&document).context("Failed to serialize document")?
    };
    println!("{}", text.trim_end());
    Ok(())
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

pub fn handle_plan(file: &Path, json: bool) -> Result<()> {
    let automation = build(&load(file)?, BuildMode::Local)?;
    let waves = plan_waves(automation.graph());

    if json {
        println!("{}", serde_json::to_string_pretty(&waves)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Wave").fg(Color::Cyan),
            Cell::new("Jobs"),
        ]);
    for (i, wave) in waves.iter().enumerate() {
        let jobs: Vec<&str> = wave.iter().map(|j| j.as_str()).collect();
        table.add_row(vec![Cell::new(i + 1), Cell::new(jobs.join(", "))]);
    }

    println!();
    println!(
        "  {} Plan for '{}' ({} waves if every job succeeds)",
        style("*").green().bold(),
        style(automation.name()).cyan(),
        waves.len()
    );
    println!();
    println!("{table}");
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

pub fn handle_validate(file: &Path, json: bool) -> Result<()> {
    let definition = load(file)?;
    let generate = build(&definition, BuildMode::Generate)?;
    let local = build(&definition, BuildMode::Local)?;

    let generate_graph = generate.graph();
    let local_graph = local.graph();

    if json {
        let out = serde_json::json!({
            "name": definition.name,
            "tasks": definition.tasks.len(),
            "jobs": generate_graph.len(),
            "local_units": local_graph.len(),
            "edges": generate_graph.edges().len(),
            "acyclic": generate_graph.is_acyclic() && local_graph.is_acyclic(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} '{}' is valid",
        style("✓").green(),
        style(&definition.name).cyan()
    );
    println!("  Tasks: {}", definition.tasks.len());
    println!(
        "  Jobs: {} ({} local units after matrix expansion)",
        generate_graph.len(),
        local_graph.len()
    );
    println!("  Edges: {}", generate_graph.edges().len());
    println!();
    Ok(())
}
