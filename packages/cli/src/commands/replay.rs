use crate::commands::print_dirty_report;
use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use screenplay_editor::{Mutation, SavePlan, ScriptDocument, SegmentsPage};
use screenplay_session::{InMemoryBackend, SaveOutcome, ScriptSession};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// First page of the script, as returned by a segment fetch
    #[arg(long)]
    pub page: PathBuf,

    /// JSON array of mutations to apply in order
    #[arg(long)]
    pub edits: PathBuf,

    /// Write the resulting document state here
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Also save through an in-memory backend and reconcile the answer
    #[arg(long)]
    pub save: bool,

    /// Script id (overrides config)
    #[arg(long)]
    pub script_id: Option<String>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub fn replay(args: ReplayArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let script_id = args.script_id.clone().unwrap_or_else(|| config.script_id.clone());

    let page: SegmentsPage = read_json(&args.page)?;
    let mutations: Vec<Mutation> = read_json(&args.edits)?;

    if args.format == "text" {
        println!("🎬 {} {}", "Replaying".green().bold(), script_id);
        println!("   Page:  {} ({} segments)", args.page.display(), page.segments.len());
        println!("   Edits: {} ({} mutations)", args.edits.display(), mutations.len());
        println!();
    }

    let document = if args.save {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(replay_with_save(&script_id, page, &mutations, config, &args))?
    } else {
        let mut document = ScriptDocument::new(script_id, config.session.editor.clone());
        document.load_first_page(page);
        for (step, mutation) in mutations.iter().enumerate() {
            let mutation = resolve_ids(&document, mutation);
            mutation
                .apply(&mut document)
                .with_context(|| format!("mutation {} failed", step + 1))?;
        }
        report_plan(&document.build_save_plan()?, &document, &args.format)?;
        document
    };

    if let Some(out) = &args.out {
        fs::write(out, serde_json::to_string_pretty(&document)?)?;
        if args.format == "text" {
            println!("   {} Wrote {}", "✓".green(), out.display());
        }
    }

    Ok(())
}

async fn replay_with_save(
    script_id: &str,
    page: SegmentsPage,
    mutations: &[Mutation],
    config: Config,
    args: &ReplayArgs,
) -> Result<ScriptDocument> {
    let backend = Arc::new(InMemoryBackend::new());
    backend.insert_script(script_id, page.segments).await;

    let session = ScriptSession::open(script_id, backend.clone(), config.session).await?;
    for (step, mutation) in mutations.iter().enumerate() {
        let mutation = session.read(|document| resolve_ids(document, mutation)).await;
        session
            .apply(&mutation)
            .await
            .with_context(|| format!("mutation {} failed", step + 1))?;
    }

    let document = session.snapshot().await;
    report_plan(&document.build_save_plan()?, &document, &args.format)?;

    match session.save().await? {
        SaveOutcome::Saved(outcome) => {
            if args.format == "json" {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!(
                    "💾 {} {} segment ids, {} component ids",
                    "Saved".green().bold(),
                    outcome.segments_mapped,
                    outcome.components_mapped
                );
            }
        }
        SaveOutcome::NothingToSave => {
            if args.format == "text" {
                println!("   {} Nothing to save", "✓".green());
            }
        }
        other => return Err(anyhow!("save did not complete: {:?}", other)),
    }

    let document = session.snapshot().await;
    session.close().await;
    Ok(document)
}

/// Edit logs may name a line by its backend component id instead of its
/// local id; map those onto the line's local id.
fn resolve_ids(document: &ScriptDocument, mutation: &Mutation) -> Mutation {
    let resolve = |id: &String| -> String {
        if document.element(id).is_some() {
            return id.clone();
        }
        document
            .elements()
            .iter()
            .find(|e| &e.component_id == id)
            .map(|e| e.local_id.clone())
            .unwrap_or_else(|| id.clone())
    };

    match mutation {
        Mutation::InsertAfter {
            after_local_id,
            element_type,
        } => Mutation::InsertAfter {
            after_local_id: resolve(after_local_id),
            element_type: *element_type,
        },
        Mutation::ChangeType {
            local_id,
            element_type,
        } => Mutation::ChangeType {
            local_id: resolve(local_id),
            element_type: *element_type,
        },
        Mutation::ChangeContent { local_id, content } => Mutation::ChangeContent {
            local_id: resolve(local_id),
            content: content.clone(),
        },
        Mutation::Delete { local_id } => Mutation::Delete {
            local_id: resolve(local_id),
        },
        Mutation::BackspaceEmpty { local_id } => Mutation::BackspaceEmpty {
            local_id: resolve(local_id),
        },
    }
}

fn report_plan(plan: &SavePlan, document: &ScriptDocument, format: &str) -> Result<()> {
    let report = document.dirty_report();

    if format == "json" {
        let output = serde_json::json!({
            "dirty": report,
            "hasUnsavedChanges": report.has_unsaved_changes(),
            "request": plan.request,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_dirty_report(&report);
    println!();

    if plan.is_empty() {
        println!("   {} Save payload is empty", "✓".green());
    } else {
        println!("{}", "Save payload".bright_blue().bold());
        println!("{}", serde_json::to_string_pretty(&plan.request)?);
    }
    println!();

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use screenplay_editor::{EditorConfig, ElementType};

    const PAGE: &str = r#"{
        "segments": [{
            "id": "seg-1",
            "position": 1000,
            "components": [
                { "id": "c-1", "component_type": "HEADING", "position": 1000, "content": "INT. HALL - DAY" },
                { "id": "c-2", "component_type": "ACTION", "position": 2000, "content": "Footsteps." }
            ]
        }],
        "total": 1
    }"#;

    fn loaded() -> ScriptDocument {
        let mut document = ScriptDocument::new("script-1", EditorConfig::default());
        document.load_first_page(serde_json::from_str(PAGE).unwrap());
        document
    }

    #[test]
    fn test_component_ids_resolve_to_local_ids() {
        let document = loaded();
        let action = document.elements()[1].local_id.clone();

        let resolved = resolve_ids(
            &document,
            &Mutation::ChangeContent {
                local_id: "c-2".to_string(),
                content: "Running.".to_string(),
            },
        );
        assert_eq!(resolved.local_id(), action);
    }

    #[test]
    fn test_local_ids_and_unknown_ids_pass_through() {
        let document = loaded();
        let heading = document.elements()[0].local_id.clone();

        let known = Mutation::InsertAfter {
            after_local_id: heading.clone(),
            element_type: ElementType::Action,
        };
        assert_eq!(resolve_ids(&document, &known), known);

        let unknown = Mutation::Delete {
            local_id: "missing".to_string(),
        };
        assert_eq!(resolve_ids(&document, &unknown), unknown);
    }

    #[test]
    fn test_replayed_edits_produce_a_payload() {
        let mut document = loaded();
        let edits: Vec<Mutation> = serde_json::from_str(
            r#"[{ "ChangeContent": { "local_id": "c-2", "content": "Running footsteps." } }]"#,
        )
        .unwrap();

        for mutation in &edits {
            resolve_ids(&document, mutation).apply(&mut document).unwrap();
        }

        let plan = document.build_save_plan().unwrap();
        assert_eq!(plan.request.changed_segments["seg-1"][0].content, "Running footsteps.");
    }
}
