use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use keyline_core::{
    Engine, ExportScope, KeylineConfig, NameConflictPolicy,
    diagnostics::init_tracing_with_options,
    fixtures::{demo_animation, demo_host},
    persistence::{list_animation_files, load_document},
};

#[derive(Debug, Parser)]
#[command(name = "keyline-cli")]
#[command(about = "Headless tools for Keyline animation documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Writes the demo animations as an exchange document.
    DemoExport {
        #[arg(long, default_value = "data/exports/demo.json")]
        output: PathBuf,

        #[arg(long, value_enum, default_value = "pose-and-all")]
        scope: ScopeArg,

        /// Animation name when `--scope single` is used.
        #[arg(long)]
        animation: Option<String>,
    },
    /// Prints the clips of a document.
    Inspect { path: PathBuf },
    /// Imports a document into the demo entity and prints the summary.
    Import {
        path: PathBuf,

        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
    /// Lists animation documents under a folder.
    List { directory: Option<PathBuf> },
}

#[derive(Debug, Clone, ValueEnum)]
enum ScopeArg {
    PoseAndAll,
    All,
    Single,
}

#[derive(Debug, Clone, ValueEnum)]
enum PolicyArg {
    Rename,
    Replace,
}

impl From<PolicyArg> for NameConflictPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Rename => Self::Rename,
            PolicyArg::Replace => Self::Replace,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = KeylineConfig::load()?;
    let log_dir = cli
        .log_dir
        .clone()
        .unwrap_or_else(|| config.diagnostics.logs_dir.clone());
    let _telemetry = init_tracing_with_options(
        &log_dir,
        &config.diagnostics.trace_file_prefix,
        &config.diagnostics.rust_log_filter,
    )?;

    match cli.command {
        Commands::DemoExport {
            output,
            scope,
            animation,
        } => {
            let scope = match scope {
                ScopeArg::PoseAndAll => ExportScope::PoseAndAllAnimations,
                ScopeArg::All => ExportScope::AllAnimations,
                ScopeArg::Single => ExportScope::Animation(
                    animation.ok_or_else(|| anyhow::anyhow!("--animation is required for --scope single"))?,
                ),
            };
            let mut engine = Engine::with_config(demo_host(), config)?;
            engine.replace_animation(demo_animation());
            let path = engine.export_to_path(&output, &scope)?;
            tracing::info!(path = %path.display(), "demo animation exported");
        }
        Commands::Inspect { path } => {
            let document = load_document(&path)?;
            println!("atom type: {}", document.atom_type);
            for clip in &document.clips {
                println!(
                    "[{}] {}: {:.3}s, {} targets, {} keyframes{}{}",
                    clip.animation_layer,
                    clip.animation_name,
                    clip.animation_length(),
                    clip.targets().len(),
                    clip.keyframe_count(),
                    if clip.is_looping() { ", loop" } else { "" },
                    if clip.is_transition() { ", transition" } else { "" },
                );
            }
            for name in document.controllers_state.keys() {
                println!("controller state: {name}");
            }
        }
        Commands::Import { path, policy } => {
            let mut config = config;
            if let Some(policy) = policy {
                config.editing.name_conflict_policy = policy.into();
            }
            let mut engine = Engine::with_config(demo_host(), config)?;
            engine.replace_animation(demo_animation());
            let summary = engine.import_from_path(&path)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::List { directory } => {
            let directory = directory.unwrap_or_else(|| config.io.save_folder.clone());
            for entry in list_animation_files(&directory, &config.io.extension)? {
                println!("{}\t{}", entry.name, entry.path.display());
            }
        }
    }

    Ok(())
}
