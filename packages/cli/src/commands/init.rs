use crate::config::{Config, DEFAULT_CONFIG_NAME};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Script id written to the config
    #[arg(short, long, default_value = "local-script")]
    pub script_id: String,

    /// Segments requested per page
    #[arg(short, long, default_value_t = screenplay_editor::DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

const SAMPLE_PAGE: &str = r#"{
  "segments": [
    {
      "id": "seg-1",
      "position": 1000,
      "created_at": "2024-01-01T00:00:00Z",
      "components": [
        { "id": "c-1", "component_type": "HEADING", "position": 1000, "content": "INT. KITCHEN - NIGHT" },
        { "id": "c-2", "component_type": "ACTION", "position": 2000, "content": "A kettle screams." }
      ]
    }
  ],
  "total": 1
}
"#;

const SAMPLE_EDITS: &str = r#"[
  { "InsertAfter": { "after_local_id": "c-2", "element_type": "character" } },
  { "ChangeContent": { "local_id": "c-2", "content": "A kettle screams. Nobody moves." } }
]
"#;

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

    // Check if config already exists
    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing screenplay workspace...".bright_blue().bold());

    let mut config = Config {
        script_id: args.script_id.clone(),
        ..Config::default()
    };
    config.session.editor.page_size = args.page_size;

    let config_json = serde_json::to_string_pretty(&config)?;
    fs::write(&config_path, config_json)?;
    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);

    for (name, content) in [("page.json", SAMPLE_PAGE), ("edits.json", SAMPLE_EDITS)] {
        let path = PathBuf::from(cwd).join(name);
        if !path.exists() {
            fs::write(&path, content)?;
            println!("  {} Created {}", "✓".green(), name);
        }
    }

    println!();
    println!("{}", "✅ Workspace initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Edit edits.json");
    println!("  2. Run: screenplay replay --page page.json --edits edits.json --out state.json");
    println!("  3. Run: screenplay inspect state.json");

    Ok(())
}
