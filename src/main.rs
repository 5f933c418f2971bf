mod app;
mod config;
mod document;
mod logging;
mod markdown;
mod pipeline;
mod plugin;
mod selection;
mod theme;
mod workspace;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::warn;
use markdown::{HtmlRenderer, MarkdownRenderer};
use pipeline::Pipeline;
use plugin::PluginRegistry;
use selection::PluginSelection;
use std::fs;
use std::path::{Path, PathBuf};
use workspace::Workspace;

#[derive(Parser)]
#[command(name = "notemark", version, about = "Markdown notes in the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Markdown file to import as an extra note (never written back)
    file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the config file in $EDITOR (default: nvim)
    Config,
    /// List available themes
    Themes,
    /// List plugins in the order they run
    Plugins,
    /// Run a file through the plugin pipeline and print the result
    Render {
        /// Markdown file to render
        file: PathBuf,
        /// Enable a plugin by name (repeatable)
        #[arg(short, long = "plugin")]
        plugins: Vec<String>,
        /// Print the transformed markdown instead of HTML
        #[arg(long)]
        markdown: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    // Before any config parse, so a malformed file can still be opened.
    if let Some(Commands::Config) = cli.command {
        return config::open_config_in_editor();
    }

    let cfg = config::load_config()?;
    if let Some(dir) = cfg.effective_log_dir() {
        logging::init_logging(&cfg.log_level, &dir)?;
    }

    if let Some(command) = cli.command {
        return match command {
            Commands::Config => config::open_config_in_editor(),
            Commands::Themes => {
                let startup = theme::find_theme(&cfg.theme).unwrap_or_else(theme::default_theme);
                for t in theme::THEME_CATALOG {
                    let marker = if t == startup { "*" } else { " " };
                    println!("{marker} {}\t{}", t.name, t.class);
                }
                Ok(())
            }
            Commands::Plugins => {
                for (i, p) in PluginRegistry::builtin()?.iter().enumerate() {
                    let props = p.properties();
                    println!(
                        "{}. {}\t{}\tpure={} idempotent={}",
                        i + 1,
                        p.name(),
                        p.description(),
                        props.pure,
                        props.idempotent
                    );
                }
                Ok(())
            }
            Commands::Render {
                file,
                plugins,
                markdown,
            } => render_file(&file, &plugins, markdown),
        };
    }

    let startup = theme::find_theme(&cfg.theme).unwrap_or_else(|| {
        warn!("event=config_theme status=unknown name={:?}", cfg.theme);
        theme::default_theme()
    });
    let mut workspace = Workspace::seeded(startup)?;
    if let Some(path) = cli.file.as_deref() {
        import_file(&mut workspace, path)?;
    }
    app::run_app(workspace, cfg)
}

fn import_file(workspace: &mut Workspace, path: &Path) -> Result<()> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Imported");
    workspace
        .import_note(title, content)
        .with_context(|| format!("Cannot derive a note title from {}", path.display()))?;
    Ok(())
}

fn render_file(path: &Path, plugins: &[String], markdown: bool) -> Result<()> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let registry = PluginRegistry::builtin()?;
    let selection = enabled_selection(plugins);
    let pipeline = Pipeline::new(&registry, &selection);
    for name in pipeline.unresolved() {
        warn!("event=render_cli status=unresolved plugin={name:?}");
        eprintln!("warning: no plugin named {name:?}; ignoring");
    }

    let transformed = pipeline.apply(&content);
    if markdown {
        print!("{transformed}");
    } else {
        print!("{}", HtmlRenderer.render(&transformed)?);
    }
    Ok(())
}

/// Selection with every named plugin switched on; repeating a name keeps it on.
fn enabled_selection(names: &[String]) -> PluginSelection {
    let mut selection = PluginSelection::new();
    for name in names {
        if !selection.is_active(name) {
            selection.toggle(name);
        }
    }
    selection
}
