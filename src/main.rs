use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use parking_lot::RwLock;
use quickdoc::collector::NO_EXAMPLE_FOUND;
use quickdoc::config::Config;
use quickdoc::error::Error;
use quickdoc::examples::{self, DirectorySnippets, EmbeddedSnippets, SnippetLoader};
use quickdoc::manager::DocumentationManager;
use quickdoc::providers::ProviderRegistry;
use quickdoc::resolver::{EditorContext, Resolution, TargetResolver};
use quickdoc::settings::{self, Settings};
use quickdoc::source::SourceTree;
use quickdoc::surface::{MemoryHost, SurfaceKind};
use quickdoc::types::{FileId, ProjectId};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "QUICKDOC_LOG";

/// Upper bound for background work in one CLI invocation.
const RUN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "quickdoc", about = "Example-driven quick documentation for Java and Rust sources")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered example snippets
    Examples {
        /// Print a JSON array instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the example lookup key for the element at a position
    Key(Position),
    /// Print the documentation a surface would show for a position
    Show {
        #[command(flatten)]
        position: Position,
        /// Persist preferences in this TOML file instead of memory
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Show in the docked tool window instead of a popup
        #[arg(long)]
        tool_window: bool,
    },
}

/// One registry entry in `examples --json` output.
#[derive(Serialize)]
struct ExampleJson {
    /// Lookup key, e.g. `java.util.stream.Stream.map1`.
    key: &'static str,
    /// Resource path of the snippet.
    resource: &'static str,
}

/// A caret position inside a project file.
#[derive(Args)]
struct Position {
    /// 1-based column, in bytes
    #[arg(long, requires = "line")]
    column: Option<usize>,
    /// Source file, relative to the current directory
    file: PathBuf,
    /// 1-based line
    #[arg(long, conflicts_with = "offset", requires = "column")]
    line: Option<usize>,
    /// Byte offset
    #[arg(long)]
    offset: Option<usize>,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| return EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Examples { json } => {
            cmd_examples(json);
            Ok(ExitCode::SUCCESS)
        },
        Commands::Key(position) => cmd_key(&position),
        Commands::Show {
            position,
            settings,
            tool_window,
        } => cmd_show(&position, settings.as_deref(), tool_window),
    };
    return match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        },
    };
}

/// Print every registry entry as `key -> resource`, or as JSON.
fn cmd_examples(json: bool) {
    if json {
        let entries: Vec<ExampleJson> = examples::entries()
            .map(|(key, resource)| return ExampleJson { key, resource })
            .collect();
        // Serializing plain strings cannot fail.
        let text = serde_json::to_string_pretty(&entries).unwrap_or_default();
        println!("{text}");
        return;
    }
    for (key, path) in examples::entries() {
        println!("{key} -> {path}");
    }
}

/// Resolve the target at a position and print its registry key.
///
/// # Errors
///
/// Returns errors from loading the config or locating the position.
fn cmd_key(position: &Position) -> Result<ExitCode, Error> {
    let root = PathBuf::from(".");
    let config = Config::load(&root)?;
    let tree = load_project(&root, &config);
    let context = editor_context(&tree, position)?;
    let resolver = TargetResolver::new(tree.project(), ProviderRegistry::with_defaults());

    let element = match resolver.resolve(&tree, &context) {
        Resolution::Target(element) => element,
        Resolution::NotReady => return Err(Error::IndexNotReady),
        Resolution::Nothing => {
            eprintln!("nothing to document at this position");
            return Ok(ExitCode::from(1));
        },
    };
    let Some(key) = tree.element(&element).and_then(|e| return e.example_key()) else {
        eprintln!("{element} has no example key");
        return Ok(ExitCode::from(1));
    };
    let registered = examples::lookup(&key).unwrap_or("(not registered)");
    println!("{} -> {registered}", key.lookup_key());
    return Ok(ExitCode::SUCCESS);
}

/// Drive the documentation manager for one trigger and print what the surface shows.
///
/// # Errors
///
/// Returns errors from loading the project, config, or settings.
fn cmd_show(position: &Position, settings_path: Option<&Path>, tool_window: bool) -> Result<ExitCode, Error> {
    let root = PathBuf::from(".");
    let config = Config::load(&root)?;
    let tree = load_project(&root, &config);
    let context = editor_context(&tree, position)?;

    let mut settings = match settings_path {
        Some(path) => Settings::open(path)?,
        None => Settings::in_memory(),
    };
    if tool_window {
        settings.set_bool(settings::SHOW_IN_TOOL_WINDOW, true)?;
    }
    let kind = if settings.show_in_tool_window() {
        SurfaceKind::ToolWindow
    } else {
        SurfaceKind::Popup
    };

    let loader: Arc<dyn SnippetLoader> = match &config.snippets_dir {
        Some(dir) => Arc::new(DirectorySnippets::new(&root.join(dir))),
        None => Arc::new(EmbeddedSnippets),
    };
    let host = MemoryHost::new(&config.tool_window_id);
    let mut manager =
        DocumentationManager::new(host, Arc::new(RwLock::new(tree)), config, settings, loader)?;
    manager.show_for_editor(context, true);
    if !manager.run_until_idle(RUN_TIMEOUT) {
        eprintln!("timed out waiting for documentation");
        return Ok(ExitCode::from(2));
    }

    let Some(binding) = manager.binding(kind) else {
        eprintln!("no documentation");
        return Ok(ExitCode::from(1));
    };
    println!("{}", binding.text);
    if binding.text == NO_EXAMPLE_FOUND {
        return Ok(ExitCode::from(1));
    }
    return Ok(ExitCode::SUCCESS);
}

/// Parse every Java and Rust file under `root` that the config includes.
/// Files that cannot be read or parsed are skipped with a warning.
fn load_project(root: &Path, config: &Config) -> SourceTree {
    let mut tree = SourceTree::new(ProjectId(0), config.max_file_bytes);
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| return e.file_type().is_file())
        .filter(|e| return e.path().extension().is_some_and(|ext| return ext == "java" || ext == "rs"))
    {
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if !config.should_load(&relative.to_string_lossy()) {
            continue;
        }
        let loaded = std::fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|text| return tree.add_file(relative, &text));
        if let Err(e) = loaded {
            tracing::warn!(file = %relative.display(), error = %e, "project.skip_file");
        }
    }
    tracing::debug!(files = tree.files().count(), "project.loaded");
    return tree;
}

/// Caret context for a CLI position.
///
/// # Errors
///
/// Returns `Error::FileNotFound` if the file is not part of the project or the position is outside it.
fn editor_context(tree: &SourceTree, position: &Position) -> Result<EditorContext, Error> {
    let not_found = || {
        return Error::FileNotFound {
            path: position.file.clone(),
        };
    };
    let relative = position.file.strip_prefix(".").unwrap_or(&position.file);
    let id: FileId = tree.file_by_path(relative).ok_or_else(not_found)?;
    let text = tree.file(id).map(|f| return f.text.as_str()).ok_or_else(not_found)?;
    let offset = match (position.offset, position.line, position.column) {
        (Some(offset), _, _) => offset,
        (None, Some(line), Some(column)) => line_column_offset(text, line, column).ok_or_else(not_found)?,
        _ => 0,
    };
    if offset > text.len() {
        return Err(not_found());
    }
    return Ok(EditorContext::at(id, offset));
}

/// Byte offset of a 1-based line and column.
fn line_column_offset(text: &str, line: usize, column: usize) -> Option<usize> {
    let mut start: usize = 0;
    for (index, content) in text.split_inclusive('\n').enumerate() {
        if index.saturating_add(1) == line {
            let within = column.checked_sub(1)?;
            return (within <= content.len()).then(|| return start.saturating_add(within));
        }
        start = start.saturating_add(content.len());
    }
    return None;
}
