use std::fs;
use std::path::{Path, PathBuf};
use std::process::Output;

use ankiframe_core::{AnkiTable, IdResolver, NoteBatch, NoteFields, TableKind, WriteMode};
use ankiframe_sqlite::SqliteCollection;
use tempfile::TempDir;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn ankiframe(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_ankiframe"))
        .args(args)
        .output()
        .expect("failed to run ankiframe")
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(ToString::to_string)
        .collect()
}

/// Creates a collection through `ankiframe init` and fills it with notes
/// through the library.
fn seeded_collection(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("collection.anki2");
    let output = ankiframe(&[
        "init",
        "--collection",
        path.to_str().unwrap(),
        "--model",
        "Basic",
        "--fields",
        "Front,Back",
        "--deck",
        "Default",
    ]);
    assert!(output.status.success(), "init should succeed");

    let collection = SqliteCollection::open(&path).unwrap();
    let ids = IdResolver::new(&collection);
    let mut notes = AnkiTable::load(&ids, TableKind::Notes).unwrap();
    notes
        .add_notes(
            &ids,
            NoteBatch::new(
                "Basic",
                NoteFields::Positional(vec![
                    strings(&["taberu", "to eat"]),
                    strings(&["mizu", "water"]),
                ]),
            )
            .with_tags(vec![strings(&["verb"]), strings(&["noun"])]),
        )
        .unwrap();
    notes.write(&ids, WriteMode::Append).unwrap();
    path
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

// ---------------------------------------------------------------------------
// init and listing
// ---------------------------------------------------------------------------

#[test]
fn init_creates_model_and_deck() {
    let dir = TempDir::new().unwrap();
    let path = seeded_collection(&dir);

    let models = ankiframe(&["models", "--collection", arg(&path)]);
    assert!(models.status.success());
    assert_eq!(stdout_lines(&models), vec!["Basic: Front, Back (sort: Front)"]);

    let decks = ankiframe(&["decks", "--collection", arg(&path)]);
    assert_eq!(stdout_lines(&decks), vec!["Default"]);
}

#[test]
fn init_refuses_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = seeded_collection(&dir);
    let output = ankiframe(&["init", "--collection", arg(&path)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));
}

#[test]
fn missing_collection_is_an_error() {
    let output = ankiframe(&["decks"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No collection given"));
}

#[test]
fn opening_a_non_collection_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.anki2");
    fs::write(&path, b"").unwrap();
    let output = ankiframe(&["tags", "--collection", arg(&path)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to open collection"));
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

#[test]
fn show_prints_json_lines() {
    let dir = TempDir::new().unwrap();
    let path = seeded_collection(&dir);

    let output = ankiframe(&["show", "notes", "--collection", arg(&path)]);
    assert!(output.status.success());
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 2);
    let first: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(first["nmodel"], "Basic");
    assert_eq!(first["ntags"], serde_json::json!(["verb"]));
    assert_eq!(first["nflds"], serde_json::json!(["taberu", "to eat"]));
    assert!(first["nid"].is_i64());
}

#[test]
fn show_raw_with_limit() {
    let dir = TempDir::new().unwrap();
    let path = seeded_collection(&dir);

    let output = ankiframe(&[
        "show",
        "notes",
        "--raw",
        "--limit",
        "1",
        "--collection",
        arg(&path),
    ]);
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1);
    let row: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(row["flds"], "taberu\u{1f}to eat");
    assert_eq!(row["tags"], "verb");
}

#[test]
fn show_fields_as_columns_uses_configured_prefix() {
    let dir = TempDir::new().unwrap();
    let path = seeded_collection(&dir);
    let config = dir.path().join("ankiframe.yml");
    fs::write(
        &config,
        format!("collection: {}\nfields_prefix: f_\n", path.display()),
    )
    .unwrap();

    let output = ankiframe(&[
        "show",
        "notes",
        "--fields-as-columns",
        "--config",
        arg(&config),
    ]);
    assert!(output.status.success());
    let row: serde_json::Value = serde_json::from_str(&stdout_lines(&output)[1]).unwrap();
    assert_eq!(row["f_Front"], "mizu");
    assert_eq!(row["f_Back"], "water");
    assert!(row.get("nflds").is_none());
}

#[test]
fn show_rejects_unknown_table() {
    let dir = TempDir::new().unwrap();
    let path = seeded_collection(&dir);
    let output = ankiframe(&["show", "graves", "--collection", arg(&path)]);
    assert!(!output.status.success());
}

// ---------------------------------------------------------------------------
// tags
// ---------------------------------------------------------------------------

#[test]
fn tag_add_with_filter_only_touches_matching_notes() {
    let dir = TempDir::new().unwrap();
    let path = seeded_collection(&dir);

    let output = ankiframe(&[
        "tag",
        "--add",
        "jlpt5",
        "--has",
        "verb",
        "--collection",
        arg(&path),
    ]);
    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["Changed tags of 1 of 1 notes."]);

    let tags = ankiframe(&["tags", "--collection", arg(&path)]);
    assert_eq!(stdout_lines(&tags), vec!["jlpt5", "noun", "verb"]);

    let collection = SqliteCollection::open(&path).unwrap();
    let ids = IdResolver::new(&collection);
    let notes = AnkiTable::load(&ids, TableKind::Notes).unwrap();
    assert_eq!(
        notes.has_tag(Some(&["jlpt5"])).unwrap(),
        vec![true, false]
    );
}

#[test]
fn tag_remove_everywhere() {
    let dir = TempDir::new().unwrap();
    let path = seeded_collection(&dir);

    let output = ankiframe(&["tag", "--remove", "noun,verb", "--collection", arg(&path)]);
    assert!(output.status.success());
    let tags = ankiframe(&["tags", "--collection", arg(&path)]);
    assert!(stdout_lines(&tags).is_empty());
}

#[test]
fn tag_requires_an_edit() {
    let dir = TempDir::new().unwrap();
    let path = seeded_collection(&dir);
    let output = ankiframe(&["tag", "--has", "verb", "--collection", arg(&path)]);
    assert!(!output.status.success());
}

#[test]
fn tag_filter_refuses_replace_mode() {
    let dir = TempDir::new().unwrap();
    let path = seeded_collection(&dir);
    let output = ankiframe(&[
        "tag",
        "--add",
        "x",
        "--has",
        "verb",
        "--mode",
        "replace",
        "--collection",
        arg(&path),
    ]);
    assert!(!output.status.success());

    let tags = ankiframe(&["tags", "--collection", arg(&path)]);
    assert_eq!(stdout_lines(&tags), vec!["noun", "verb"]);
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn check_passes_on_clean_collection() {
    let dir = TempDir::new().unwrap();
    let path = seeded_collection(&dir);
    for table in ["notes", "cards", "revs"] {
        let output = ankiframe(&["check", table, "--collection", arg(&path)]);
        assert!(output.status.success(), "check {table} should succeed");
        assert!(String::from_utf8_lossy(&output.stdout).contains("survive the round trip"));
    }
}

#[test]
fn check_passes_with_numeric_sort_field() {
    let dir = TempDir::new().unwrap();
    let path = seeded_collection(&dir);
    {
        let collection = SqliteCollection::open(&path).unwrap();
        let ids = IdResolver::new(&collection);
        let mut notes = AnkiTable::load(&ids, TableKind::Notes).unwrap();
        notes
            .add_note(
                &ids,
                "Basic",
                NoteFields::Positional(vec![strings(&["42", "the answer"])]),
                Vec::new(),
            )
            .unwrap();
        notes.write(&ids, WriteMode::Append).unwrap();
    }

    let output = ankiframe(&["check", "notes", "--collection", arg(&path)]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("3 rows survive"));
}

#[test]
fn check_reports_lossy_tag_whitespace() {
    let dir = TempDir::new().unwrap();
    let path = seeded_collection(&dir);
    let collection = SqliteCollection::open(&path).unwrap();
    collection
        .connection()
        .execute("UPDATE notes SET tags = ' verb  spaced '", [])
        .unwrap();
    drop(collection);

    let output = ankiframe(&["check", "notes", "--collection", arg(&path)]);
    assert!(!output.status.success());
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(" tags: "));
    assert!(String::from_utf8_lossy(&output.stderr).contains("2 cells differ"));
}
