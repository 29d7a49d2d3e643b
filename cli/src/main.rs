use std::io::Write;
use std::path::PathBuf;

use ankiframe_core::{AnkiTable, Config, Frame, IdResolver, TableKind, WriteMode};
use ankiframe_sqlite::SqliteCollection;
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// CLI-specific write mode enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliWriteMode {
    Update,
    Append,
    Replace,
}

impl From<CliWriteMode> for WriteMode {
    fn from(mode: CliWriteMode) -> Self {
        match mode {
            CliWriteMode::Update => Self::Update,
            CliWriteMode::Append => Self::Append,
            CliWriteMode::Replace => Self::Replace,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "ankiframe")]
#[command(about = "Inspect and edit Anki collections as tables")]
struct Cli {
    /// Collection file (overrides the config file).
    #[arg(long, global = true)]
    collection: Option<PathBuf>,
    /// YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an empty collection file.
    Init(InitArgs),
    /// Print a table as JSON lines.
    Show(ShowArgs),
    /// List deck names.
    Decks,
    /// List note types with their fields.
    Models,
    /// List the tags used by any note.
    Tags,
    /// Convert a table to the convenience format and back, reporting
    /// every cell that does not survive the round trip.
    Check(CheckArgs),
    /// Add or remove note tags and write the notes back.
    Tag(TagArgs),
}

#[derive(Debug, Args)]
struct InitArgs {
    /// Add a note type with this name.
    #[arg(long, requires = "fields")]
    model: Option<String>,
    /// Comma-separated field names of the note type.
    #[arg(long, requires = "model")]
    fields: Option<String>,
    /// Zero-based position of the sort field.
    #[arg(long, default_value_t = 0)]
    sort_field: usize,
    /// Add a deck with this name (repeatable).
    #[arg(long)]
    deck: Vec<String>,
}

#[derive(Debug, Args)]
struct ShowArgs {
    /// Table to print: notes, cards or revs.
    table: TableKind,
    /// Print native rows instead of the convenience format.
    #[arg(long)]
    raw: bool,
    /// Print at most this many rows.
    #[arg(long)]
    limit: Option<usize>,
    /// Give every note field its own column.
    #[arg(long, conflicts_with = "raw")]
    fields_as_columns: bool,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Table to check: notes, cards or revs.
    table: TableKind,
}

#[derive(Debug, Args)]
struct TagArgs {
    /// Comma-separated tags to add.
    #[arg(long)]
    add: Option<String>,
    /// Comma-separated tags to remove.
    #[arg(long)]
    remove: Option<String>,
    /// Only edit notes that carry any of these comma-separated tags.
    #[arg(long)]
    has: Option<String>,
    /// Write mode (defaults to the configured one).
    #[arg(long, value_enum)]
    mode: Option<CliWriteMode>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let result = load_config(&cli).and_then(|config| match cli.command {
        Command::Init(args) => run_init(&config, args),
        Command::Show(args) => run_show(&config, args),
        Command::Decks => run_decks(&config),
        Command::Models => run_models(&config),
        Command::Tags => run_tags(&config),
        Command::Check(args) => run_check(&config, args),
        Command::Tag(args) => run_tag(&config, args),
    });

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

/// Reads the config file, if any, and applies command-line overrides.
fn load_config(cli: &Cli) -> Result<Config, String> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?,
        None => Config::default(),
    };
    if let Some(path) = &cli.collection {
        config.collection = Some(path.clone());
    }
    debug!(?config, "resolved configuration");
    Ok(config)
}

fn collection_path(config: &Config) -> Result<&PathBuf, String> {
    config.collection.as_ref().ok_or_else(|| {
        "No collection given; pass --collection or set `collection` in the config file".to_string()
    })
}

fn open_collection(config: &Config) -> Result<SqliteCollection, String> {
    let path = collection_path(config)?;
    SqliteCollection::open(path)
        .map_err(|e| format!("Failed to open collection '{}': {e}", path.display()))
}

// ---------------------------------------------------------------------------
// init command
// ---------------------------------------------------------------------------

fn run_init(config: &Config, args: InitArgs) -> Result<(), String> {
    let path = collection_path(config)?;
    if path.exists() {
        return Err(format!("'{}' already exists", path.display()));
    }
    let collection = SqliteCollection::create(path)
        .map_err(|e| format!("Failed to create collection '{}': {e}", path.display()))?;

    if let Some(model) = &args.model {
        let fields = parse_csv_list(args.fields);
        let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
        collection
            .add_model(model, &fields, args.sort_field)
            .map_err(|e| format!("Failed to add note type '{model}': {e}"))?;
    }
    for deck in &args.deck {
        collection
            .add_deck(deck)
            .map_err(|e| format!("Failed to add deck '{deck}': {e}"))?;
    }

    println!("Created collection '{}'.", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// show command
// ---------------------------------------------------------------------------

fn run_show(config: &Config, args: ShowArgs) -> Result<(), String> {
    let collection = open_collection(config)?;
    let ids = IdResolver::new(&collection);
    let mut table = if args.raw {
        AnkiTable::load_raw(&ids, args.table)
    } else {
        AnkiTable::load(&ids, args.table)
    }
    .map_err(|e| format!("Failed to load {}: {e}", args.table))?;

    table.set_fields_prefix(config.fields_prefix.clone());
    if args.fields_as_columns {
        table
            .fields_as_columns(&ids, false)
            .map_err(|e| format!("Failed to split note fields: {e}"))?;
    }

    let limit = args.limit.unwrap_or(table.len()).min(table.len());
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for pos in 0..limit {
        if let Some(record) = table.frame().record(pos) {
            writeln!(out, "{}", serde_json::Value::Object(record))
                .map_err(|e| format!("Failed to write output: {e}"))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// listing commands
// ---------------------------------------------------------------------------

fn run_decks(config: &Config) -> Result<(), String> {
    let collection = open_collection(config)?;
    let ids = IdResolver::new(&collection);
    let decks = AnkiTable::list_decks(&ids).map_err(|e| format!("Failed to list decks: {e}"))?;
    for deck in decks {
        println!("{deck}");
    }
    Ok(())
}

fn run_models(config: &Config) -> Result<(), String> {
    let collection = open_collection(config)?;
    let ids = IdResolver::new(&collection);
    let mut models = ids
        .models()
        .map_err(|e| format!("Failed to list note types: {e}"))?
        .to_vec();
    models.sort_by(|a, b| a.name.cmp(&b.name));
    for model in models {
        let sort = model.fields.get(model.sort_field).map_or("", String::as_str);
        println!("{}: {} (sort: {sort})", model.name, model.fields.join(", "));
    }
    Ok(())
}

fn run_tags(config: &Config) -> Result<(), String> {
    let collection = open_collection(config)?;
    let ids = IdResolver::new(&collection);
    let notes = AnkiTable::load(&ids, TableKind::Notes)
        .map_err(|e| format!("Failed to load notes: {e}"))?;
    let tags = notes
        .list_tags()
        .map_err(|e| format!("Failed to list tags: {e}"))?;
    for tag in tags {
        println!("{tag}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// check command
// ---------------------------------------------------------------------------

fn run_check(config: &Config, args: CheckArgs) -> Result<(), String> {
    let collection = open_collection(config)?;
    let ids = IdResolver::new(&collection);
    let stored = AnkiTable::load_raw(&ids, args.table)
        .map_err(|e| format!("Failed to load {}: {e}", args.table))?;
    let rebuilt = stored
        .normalized(&ids, false)
        .and_then(|table| table.to_raw(&ids, false))
        .map_err(|e| format!("Round trip of {} failed: {e}", args.table))?;

    let diffs = differing_cells(stored.frame(), rebuilt.frame());
    for diff in &diffs {
        println!("{diff}");
    }
    if !diffs.is_empty() {
        return Err(format!(
            "{} of {} rows: {} cells differ after the round trip",
            args.table,
            stored.len(),
            diffs.len()
        ));
    }
    println!("{}: {} rows survive the round trip.", args.table, stored.len());
    Ok(())
}

/// Describes every cell of `stored` that differs in `rebuilt`.
fn differing_cells(stored: &Frame, rebuilt: &Frame) -> Vec<String> {
    if stored.len() != rebuilt.len() {
        return vec![format!(
            "row count changed from {} to {}",
            stored.len(),
            rebuilt.len()
        )];
    }
    let ids = stored.column("id").unwrap_or_default();
    let mut diffs = Vec::new();
    for column in stored.columns() {
        let Some(values) = rebuilt.column(&column.name) else {
            diffs.push(format!("column '{}' is missing", column.name));
            continue;
        };
        for (pos, (before, after)) in column.values.iter().zip(values).enumerate() {
            if before != after {
                let id = ids.get(pos).map(ToString::to_string).unwrap_or_default();
                diffs.push(format!("id {id} {}: {before:?} -> {after:?}", column.name));
            }
        }
    }
    diffs
}

// ---------------------------------------------------------------------------
// tag command
// ---------------------------------------------------------------------------

fn run_tag(config: &Config, args: TagArgs) -> Result<(), String> {
    let add = parse_csv_list(args.add);
    let remove = parse_csv_list(args.remove);
    let has = parse_csv_list(args.has);
    if add.is_empty() && remove.is_empty() {
        return Err("Nothing to do; pass --add or --remove".to_string());
    }
    let mode = args.mode.map(WriteMode::from).unwrap_or(config.write_mode);
    if mode == WriteMode::Replace && !has.is_empty() {
        return Err("--has cannot be combined with replace mode, which would delete the other notes".to_string());
    }

    let collection = open_collection(config)?;
    let ids = IdResolver::new(&collection);
    let mut notes = AnkiTable::load(&ids, TableKind::Notes)
        .map_err(|e| format!("Failed to load notes: {e}"))?;

    if !has.is_empty() {
        let mask = notes
            .has_tag(Some(as_refs(&has).as_slice()))
            .map_err(|e| format!("Failed to select notes: {e}"))?;
        let selected = notes.frame().filter(&mask);
        *notes.frame_mut() = selected;
    }
    if !add.is_empty() {
        notes
            .add_tag(&as_refs(&add))
            .map_err(|e| format!("Failed to add tags: {e}"))?;
    }
    if !remove.is_empty() {
        notes
            .remove_tag(Some(as_refs(&remove).as_slice()))
            .map_err(|e| format!("Failed to remove tags: {e}"))?;
    }

    let changed = notes
        .was_modified(&ids, None)
        .map_err(|e| format!("Failed to compare notes: {e}"))?
        .into_iter()
        .filter(|modified| *modified)
        .count();
    notes
        .write(&ids, mode)
        .map_err(|e| format!("Failed to write notes: {e}"))?;
    println!("Changed tags of {changed} of {} notes.", notes.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parses a comma-separated list, trimming whitespace and dropping empty items.
fn parse_csv_list(raw: Option<String>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(ToString::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn as_refs(items: &[String]) -> Vec<&str> {
    items.iter().map(String::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ankiframe_core::Value;

    #[test]
    fn test_parse_csv_list_trims_and_drops_empty() {
        let parsed = parse_csv_list(Some(" verb, ,jlpt5 ,".to_string()));
        assert_eq!(parsed, vec!["verb".to_string(), "jlpt5".to_string()]);
    }

    #[test]
    fn test_parse_csv_list_none_is_empty() {
        assert!(parse_csv_list(None).is_empty());
    }

    #[test]
    fn test_differing_cells_reports_id_and_column() {
        let stored = Frame::from_rows(
            ["id", "tags"],
            vec![
                vec![Value::Int(1), Value::from("a  b")],
                vec![Value::Int(2), Value::from("c")],
            ],
        )
        .unwrap();
        let rebuilt = Frame::from_rows(
            ["id", "tags"],
            vec![
                vec![Value::Int(1), Value::from("a b")],
                vec![Value::Int(2), Value::from("c")],
            ],
        )
        .unwrap();
        let diffs = differing_cells(&stored, &rebuilt);
        assert_eq!(diffs.len(), 1);
        assert!(diffs[0].starts_with("id 1 tags:"));
    }

    #[test]
    fn test_cli_parses_global_collection_after_subcommand() {
        let cli = Cli::parse_from(["ankiframe", "show", "revs", "--collection", "c.anki2"]);
        assert_eq!(cli.collection, Some(PathBuf::from("c.anki2")));
        assert!(matches!(
            cli.command,
            Command::Show(ShowArgs {
                table: TableKind::Revs,
                ..
            })
        ));
    }

    #[test]
    fn test_cli_rejects_unknown_table() {
        assert!(Cli::try_parse_from(["ankiframe", "show", "decks"]).is_err());
    }
}
