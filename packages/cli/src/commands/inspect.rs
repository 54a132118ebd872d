use crate::commands::print_dirty_report;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use screenplay_editor::{is_temporary, strip_markup, ScriptDocument};
use std::fs;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Document state written by `replay --out`
    pub state: PathBuf,

    /// Show ids and positions for every line
    #[arg(short, long)]
    pub ids: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub fn inspect(args: InspectArgs, _cwd: &str) -> Result<()> {
    let content = fs::read_to_string(&args.state)
        .with_context(|| format!("cannot read {}", args.state.display()))?;
    let document: ScriptDocument = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a saved document state", args.state.display()))?;

    if args.format == "json" {
        let segments: Vec<_> = document
            .segments()
            .iter()
            .map(|segment| {
                serde_json::json!({
                    "segmentId": segment.segment_id,
                    "segmentPosition": segment.segment_position,
                    "elements": segment.elements,
                })
            })
            .collect();
        let output = serde_json::json!({
            "scriptId": document.script_id,
            "revision": document.revision(),
            "pagination": document.pagination(),
            "segments": segments,
            "dirty": document.dirty_report(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("🔍 {} {}", "Inspecting".green().bold(), document.script_id);
    println!("   State:    {}", args.state.display());
    println!("   Revision: {}", document.revision());
    let pagination = document.pagination();
    println!(
        "   Loaded:   {} of {} segments{}",
        pagination.offset(),
        pagination
            .total()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "?".to_string()),
        if pagination.has_more() { " (more available)" } else { "" }
    );
    println!();

    for segment in document.segments() {
        let marker = if is_temporary(segment.segment_id) {
            "new".yellow()
        } else {
            "saved".dimmed()
        };
        println!(
            "{} {} {}",
            "■".bright_blue(),
            segment
                .heading()
                .map(|h| strip_markup(&h.content))
                .unwrap_or_else(|| "(no heading)".to_string())
                .bold(),
            marker
        );
        if args.ids {
            println!("  {} @ {}", segment.segment_id.dimmed(), segment.segment_position);
        }

        for element in &segment.elements {
            let flag = if element.is_new { "+".green() } else { " ".normal() };
            println!(
                "  {} {:<14} {}",
                flag,
                element.element_type.as_str(),
                strip_markup(&element.content)
            );
            if args.ids {
                println!(
                    "      {} {} @ {}",
                    element.local_id.dimmed(),
                    element.component_id.dimmed(),
                    element.position
                );
            }
        }
    }
    println!();

    print_dirty_report(&document.dirty_report());
    Ok(())
}
