//! `template-editor` command line: inspect, clean and check templates without a browser.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use signage_markup::parse_html;

use crate::capability::ElementType;
use crate::config::EditorConfig;
use crate::controller::{inject_runtime, HostController};
use crate::decoration::find_artifacts;
use crate::error::{EditorError, EditorResult};
use crate::identity::ElementId;
use crate::runtime::EditorRuntime;

#[derive(Parser)]
#[command(name = "template-editor")]
#[command(about = "Inspect and clean signage templates the way the visual editor sees them")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "YAML editor configuration (defaults plus SIGNAGE_EDITOR_* otherwise)")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "List editable elements with their id, capability and tag")]
    Inspect {
        #[arg(help = "Template HTML file")]
        file: PathBuf,
    },

    #[command(about = "Load a template in the editor and print the serialized document")]
    Clean {
        #[arg(help = "Template HTML file")]
        file: PathBuf,
    },

    #[command(about = "Verify the serialized document is free of editor artifacts and stable")]
    Check {
        #[arg(help = "Template HTML file")]
        file: PathBuf,
    },
}

/// One editable element as the runtime sees it after boot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryInfo {
    pub element_id: ElementId,
    pub element_type: ElementType,
    pub tag_name: String,
}

pub async fn run(cli: Cli) -> EditorResult<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Inspect { file } => {
            let boundaries = inspect_template(&read_template(&file)?, &config);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&boundaries)?);
            } else {
                for b in &boundaries {
                    println!(
                        "{:<8} {:<10} <{}>",
                        b.element_id.as_str(),
                        format!("{:?}", b.element_type).to_lowercase(),
                        b.tag_name
                    );
                }
                tracing::info!(count = boundaries.len(), "editable elements");
            }
        }
        Commands::Clean { file } => {
            let html = clean_template(&read_template(&file)?, &config).await?;
            print!("{}", html);
        }
        Commands::Check { file } => {
            check_template(&read_template(&file)?, &config).await?;
            tracing::info!(file = %file.display(), "template is clean and stable");
            if cli.json {
                println!("{}", serde_json::json!({ "file": file.display().to_string(), "ok": true }));
            }
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> EditorResult<EditorConfig> {
    let config = match path {
        Some(path) => EditorConfig::from_yaml(&std::fs::read_to_string(path)?)?,
        None => EditorConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

fn read_template(path: &Path) -> EditorResult<String> {
    std::fs::read_to_string(path).map_err(|e| EditorError::Io(format!("{}: {}", path.display(), e)))
}

/// Boot a runtime over the template and report its editable elements in document order.
pub fn inspect_template(template_html: &str, config: &EditorConfig) -> Vec<BoundaryInfo> {
    let html = inject_runtime(template_html, &config.runtime_src);
    let mut runtime = EditorRuntime::new(parse_html(&html), config, Vec::new());
    runtime.boot();
    runtime
        .boundaries()
        .into_iter()
        .filter_map(|node| {
            Some(BoundaryInfo {
                element_id: runtime.identity(node)?,
                element_type: runtime.element_type(node),
                tag_name: runtime.document().tag_name(node)?.to_string(),
            })
        })
        .collect()
}

/// Full host round trip: mount, wait for the runtime, serialize, close.
pub async fn clean_template(template_html: &str, config: &EditorConfig) -> EditorResult<String> {
    let controller = HostController::new(config.clone());
    controller.mount(template_html);
    tokio::time::timeout(config.serialize_timeout(), controller.wait_ready())
        .await
        .map_err(|_| EditorError::FrameUnavailable)??;
    let html = controller.serialize().await;
    controller.close();
    html
}

/// The serialization carries no editor artifacts and re-editing it changes nothing.
pub async fn check_template(template_html: &str, config: &EditorConfig) -> EditorResult<()> {
    let first = clean_template(template_html, config).await?;
    let artifacts = find_artifacts(&parse_html(&first));
    if !artifacts.is_empty() {
        return Err(EditorError::CheckFailed(artifacts.join("; ")));
    }
    let second = clean_template(&first, config).await?;
    if first != second {
        return Err(EditorError::CheckFailed(
            "serializing the cleaned document changed it".to_string(),
        ));
    }
    Ok(())
}
