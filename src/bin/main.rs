use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use highlight_sync::config::{load_user_settings, merge_settings};
use highlight_sync::error::LockResultExt;
use highlight_sync::text::char_len;
use highlight_sync::{
    Edit, HighlightCoordinator, HighlightHost, HighlightSettings, Layer, TreeSitterLayerParser,
};

/// Inspect optimistic and authoritative Go highlighting from the command line
#[derive(Parser)]
#[command(name = "highlight-sync")]
#[command(version)]
#[command(about = "Inspect optimistic and authoritative Go highlighting")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Highlight a Go file and print its layers
    Dump {
        /// The Go source file to highlight
        file: PathBuf,

        /// Replay an edit as AT:REMOVE:INSERT (char offset, chars removed,
        /// inserted text with \n and \t escapes). Repeatable; one batch.
        #[arg(long = "edit", value_name = "AT:REMOVE:INSERT")]
        edits: Vec<EditSpec>,

        /// Settings file (default: the user config, if any)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print layers as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone)]
struct EditSpec {
    at: usize,
    remove: usize,
    insert: String,
}

impl FromStr for EditSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(at), Some(remove), Some(insert)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("expected AT:REMOVE:INSERT, got '{}'", s));
        };
        let at = at
            .parse()
            .map_err(|e| format!("invalid offset '{}': {}", at, e))?;
        let remove = remove
            .parse()
            .map_err(|e| format!("invalid removal length '{}': {}", remove, e))?;
        Ok(Self {
            at,
            remove,
            insert: insert.replace("\\n", "\n").replace("\\t", "\t"),
        })
    }
}

impl EditSpec {
    /// Resolve against the text the edit applies to
    fn to_edit(&self, text: &str) -> Edit {
        let at = self.at.min(char_len(text));
        let removed: String = text.chars().skip(at).take(self.remove).collect();
        Edit::new(at, removed, self.insert.clone())
    }
}

/// Host backed by an in-memory buffer
#[derive(Default)]
struct BufferHost {
    text: Mutex<String>,
    layers: Mutex<Vec<Layer>>,
}

impl HighlightHost for BufferHost {
    fn current_text(&self) -> String {
        self.text.lock().recover_poison("BufferHost::current_text").clone()
    }

    fn current_layers(&self) -> Vec<Layer> {
        self.layers
            .lock()
            .recover_poison("BufferHost::current_layers")
            .clone()
    }

    fn replace_layers(&self, layers: Vec<Layer>) {
        *self.layers.lock().recover_poison("BufferHost::replace_layers") = layers;
    }
}

/// Collects each stage's layers and prints them as a table or JSON
struct Report {
    json: bool,
    stages: serde_json::Map<String, serde_json::Value>,
}

impl Report {
    fn new(json: bool) -> Self {
        Self {
            json,
            stages: serde_json::Map::new(),
        }
    }

    fn stage(&mut self, heading: &str, text: &str, layers: &[Layer]) -> Result<(), String> {
        if self.json {
            let value = serde_json::to_value(layers).map_err(|e| e.to_string())?;
            self.stages.insert(heading.to_string(), value);
            return Ok(());
        }

        println!("== {}", heading);
        for layer in layers {
            println!("[{}] {} regions", layer.name, layer.regions.len());
            for region in &layer.regions {
                let covered: String = text
                    .chars()
                    .skip(region.start)
                    .take(region.len())
                    .collect();
                println!(
                    "  {:>6}..{:<6} {:<20} {:?}",
                    region.start, region.end, region.kind, covered
                );
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<(), String> {
        if self.json {
            let output = serde_json::to_string_pretty(&self.stages).map_err(|e| e.to_string())?;
            println!("{}", output);
        }
        Ok(())
    }
}

fn load_settings(config: Option<PathBuf>) -> Result<HighlightSettings, String> {
    let user = load_user_settings().map_err(|e| e.to_string())?;
    let explicit = config
        .map(|path| HighlightSettings::load(&path))
        .transpose()
        .map_err(|e| e.to_string())?;
    Ok(merge_settings(Some(user), explicit).unwrap_or_default())
}

async fn dump(
    file: PathBuf,
    edits: Vec<EditSpec>,
    config: Option<PathBuf>,
    json: bool,
) -> Result<(), String> {
    let text = std::fs::read_to_string(&file)
        .map_err(|e| format!("failed to read {}: {}", file.display(), e))?;
    let settings = load_settings(config)?;

    let parser = TreeSitterLayerParser::go(settings.clone()).map_err(|e| e.to_string())?;
    let host = Arc::new(BufferHost::default());
    *host.text.lock().recover_poison("dump") = text.clone();

    let coordinator = HighlightCoordinator::in_current_runtime(
        Arc::new(parser),
        host.clone(),
        settings,
    )
    .map_err(|e| e.to_string())?;
    let mut report = Report::new(json);

    coordinator.init(text.clone());
    coordinator.wait_idle().await;
    report.stage("initial", &text, &coordinator.layers())?;

    if !edits.is_empty() {
        let batch: Vec<Edit> = {
            let mut buffer = host.text.lock().recover_poison("dump");
            edits
                .iter()
                .map(|spec| {
                    let edit = spec.to_edit(&buffer);
                    edit.apply_to(&mut buffer);
                    edit
                })
                .collect()
        };
        coordinator.on_edits(&batch);

        let edited = host.current_text();
        report.stage("optimistic", &edited, &coordinator.layers())?;

        coordinator.wait_idle().await;
        report.stage("settled", &edited, &coordinator.layers())?;
    }

    coordinator.shutdown();
    coordinator.wait_drained().await;
    report.finish()
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Dump {
            file,
            edits,
            config,
            json,
        } => dump(file, edits, config, json).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
