//! Import, merge and export
//!
//! JSON and YAML payloads are trusted: their records are taken as canonical
//! templates. CSV is free-form, so every row goes through
//! [`build_template`](crate::builder::build_template) first. Both paths end in
//! the same upsert-by-id merge.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::builder::build_template;
use crate::error::{Result, StoreError};
use crate::repository::StoreRepository;
use crate::template::{Store, Template};

const INVALID_STRUCTURE: &str = "expected an object with a 'templates' array";

/// Payload formats for import and export
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PayloadFormat {
    Json,
    Yaml,
    Csv,
}

impl PayloadFormat {
    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Extension used when archiving a payload of this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Csv => "csv",
        }
    }
}

impl std::fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "JSON"),
            Self::Yaml => write!(f, "YAML"),
            Self::Csv => write!(f, "CSV"),
        }
    }
}

/// Outcome of an import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Templates appended to the store
    pub created: usize,
    /// Templates that replaced an existing entry
    pub updated: usize,
    /// Where the raw payload was archived, if anything was imported
    pub archived: Option<PathBuf>,
}

impl std::fmt::Display for ImportReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "created: {}, updated: {}", self.created, self.updated)
    }
}

/// Upsert `candidates` into `store` by id, returning `(created, updated)`
///
/// Candidates without an id are skipped and counted nowhere. A matching id
/// replaces the whole entry at its current position; a new id is appended and
/// indexed, so a repeat later in the same batch updates it instead of
/// duplicating it.
pub fn merge_templates<I>(store: &mut Store, candidates: I) -> (usize, usize)
where
    I: IntoIterator<Item = Template>,
{
    let mut index: HashMap<String, usize> = store
        .templates
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.id.is_empty())
        .map(|(i, t)| (t.id.clone(), i))
        .collect();

    let (mut created, mut updated) = (0, 0);
    for candidate in candidates {
        if candidate.id.is_empty() {
            debug!(name = %candidate.name, "Skipping candidate without id");
            continue;
        }
        match index.get(&candidate.id) {
            Some(&pos) => {
                store.templates[pos] = candidate;
                updated += 1;
            }
            None => {
                index.insert(candidate.id.clone(), store.templates.len());
                store.templates.push(candidate);
                created += 1;
            }
        }
    }
    (created, updated)
}

/// Decode a payload into candidate templates
///
/// An empty or whitespace-only payload yields no candidates.
pub fn parse_payload(payload: &[u8], format: PayloadFormat) -> Result<Vec<Template>> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    match format {
        PayloadFormat::Json => parse_json(payload),
        PayloadFormat::Yaml => parse_yaml(payload),
        PayloadFormat::Csv => parse_csv(payload),
    }
}

fn parse_json(payload: &[u8]) -> Result<Vec<Template>> {
    let value: serde_json::Value = serde_json::from_slice(payload)?;
    match value {
        serde_json::Value::Object(mut map) => match map.remove("templates") {
            Some(templates @ serde_json::Value::Array(_)) => Ok(serde_json::from_value(templates)?),
            _ => Err(StoreError::InvalidStructure(INVALID_STRUCTURE.to_string())),
        },
        _ => Err(StoreError::InvalidStructure(INVALID_STRUCTURE.to_string())),
    }
}

fn parse_yaml(payload: &[u8]) -> Result<Vec<Template>> {
    let value: serde_yaml::Value = serde_yaml::from_slice(payload)?;
    match value.get("templates") {
        Some(templates @ serde_yaml::Value::Sequence(_)) => Ok(serde_yaml::from_value(templates.clone())?),
        _ => Err(StoreError::InvalidStructure(INVALID_STRUCTURE.to_string())),
    }
}

/// UTF-8, falling back to Latin-1 so spreadsheet exports still load
fn decode_text(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => payload.iter().map(|&b| b as char).collect(),
    }
}

fn parse_csv(payload: &[u8]) -> Result<Vec<Template>> {
    let text = decode_text(payload);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    // Blank header cells name no field; their values are ignored
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let mut templates = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        let fields: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .filter(|(h, _)| !h.is_empty())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        templates.push(build_template(&fields, index));
    }
    debug!(count = templates.len(), "Parsed CSV rows");
    Ok(templates)
}

/// Parse, merge, save and archive one payload
///
/// Nothing is written when the payload holds no candidates.
pub fn import_payload(
    repo: &StoreRepository,
    store: &mut Store,
    payload: &[u8],
    format: PayloadFormat,
) -> Result<ImportReport> {
    let candidates = parse_payload(payload, format)?;
    if candidates.is_empty() {
        info!(%format, "Import payload contained no templates");
        return Ok(ImportReport::default());
    }

    let (created, updated) = merge_templates(store, candidates);
    repo.save(store)?;
    let archived = repo.record_import(payload, format.extension())?;

    info!(%format, created, updated, "Imported templates");
    Ok(ImportReport {
        created,
        updated,
        archived: Some(archived),
    })
}

#[derive(Serialize)]
struct TemplateBundle<'a> {
    templates: [&'a Template; 1],
}

fn render<T: Serialize>(value: &T, format: PayloadFormat) -> Result<String> {
    match format {
        PayloadFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        PayloadFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        PayloadFormat::Csv => Err(StoreError::UnsupportedExport(format)),
    }
}

/// Serialize the whole store
pub fn export_store(store: &Store, format: PayloadFormat) -> Result<String> {
    render(store, format)
}

/// Serialize one template wrapped as `{"templates": [template]}`
pub fn export_template(template: &Template, format: PayloadFormat) -> Result<String> {
    render(&TemplateBundle { templates: [template] }, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tpl(name: &str, user: &str) -> Template {
        Template::new(name).with_prompts("", user)
    }

    #[test]
    fn test_merge_created_and_updated() {
        let mut store = Store::new();
        store.templates.push(tpl("Welcome Email", "v1"));
        store.templates.push(tpl("Other", "keep"));

        let (created, updated) = merge_templates(&mut store, vec![tpl("Welcome Email", "v2"), tpl("New Template", "n")]);

        assert_eq!((created, updated), (1, 1));
        assert_eq!(store.len(), 3);
        assert_eq!(store.templates[0].id, "welcome-email");
        assert_eq!(store.templates[0].user, "v2");
        assert_eq!(store.templates[2].id, "new-template");
    }

    #[test]
    fn test_merge_skips_missing_id() {
        let mut store = Store::new();
        let mut orphan = tpl("Orphan", "x");
        orphan.id.clear();

        assert_eq!(merge_templates(&mut store, vec![orphan]), (0, 0));
        assert!(store.is_empty());
    }

    #[test]
    fn test_merge_duplicate_ids_in_batch_last_wins() {
        let mut store = Store::new();
        let (created, updated) = merge_templates(&mut store, vec![tpl("Same", "first"), tpl("Same", "second")]);

        assert_eq!((created, updated), (1, 1));
        assert_eq!(store.len(), 1);
        assert_eq!(store.templates[0].user, "second");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let batch = vec![tpl("A", "a"), tpl("B", "b")];
        let mut store = Store::new();

        assert_eq!(merge_templates(&mut store, batch.clone()), (2, 0));
        let first = store.templates.clone();
        assert_eq!(merge_templates(&mut store, batch), (0, 2));
        assert_eq!(store.templates, first);
    }

    #[test]
    fn test_parse_json_and_yaml() {
        let json = br#"{"templates": [{"id": "a", "name": "A", "user": "Hi {{who}}"}]}"#;
        let templates = parse_payload(json, PayloadFormat::Json).unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].user, "Hi {{who}}");

        let yaml = b"templates:\n  - id: b\n    name: B\n    tags: [x, y]\n";
        let templates = parse_payload(yaml, PayloadFormat::Yaml).unwrap();
        assert_eq!(templates[0].tags, vec!["x", "y"]);
    }

    #[test]
    fn test_parse_keeps_given_ids() {
        let json = br#"{"templates": [{"id": "custom-id", "name": "Different Name"}]}"#;
        let templates = parse_payload(json, PayloadFormat::Json).unwrap();
        assert_eq!(templates[0].id, "custom-id");
    }

    #[test]
    fn test_parse_invalid_structure() {
        let err = parse_payload(br#"[{"id": "a", "name": "A"}]"#, PayloadFormat::Json).unwrap_err();
        assert!(matches!(err, StoreError::InvalidStructure(_)));

        let err = parse_payload(b"templates: nope\n", PayloadFormat::Yaml).unwrap_err();
        assert!(matches!(err, StoreError::InvalidStructure(_)));

        let err = parse_payload(b"{ broken", PayloadFormat::Json).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_parse_empty_payload() {
        for format in [PayloadFormat::Json, PayloadFormat::Yaml, PayloadFormat::Csv] {
            assert!(parse_payload(b"", format).unwrap().is_empty());
            assert!(parse_payload(b"  \n", format).unwrap().is_empty());
        }
    }

    #[test]
    fn test_parse_csv_blank_row_skipped() {
        let csv = b"name,prompt\n,\n";
        assert!(parse_payload(csv, PayloadFormat::Csv).unwrap().is_empty());
    }

    #[test]
    fn test_parse_csv_blank_headers_use_defaults() {
        let templates = parse_payload(b",,\nWrite a poem,x,y\n", PayloadFormat::Csv).unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name, "Imported Prompt 1");
        assert_eq!(templates[0].id, "imported-prompt-1");
        assert_eq!(templates[0].tags, vec!["imported"]);
    }

    #[test]
    fn test_parse_csv_rows() {
        let csv = b"title,prompt,tags\nRevenue Summary,Summarize revenue,\"finance, weekly\"\n,Explain churn,\n";
        let templates = parse_payload(csv, PayloadFormat::Csv).unwrap();

        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].id, "revenue-summary");
        assert_eq!(templates[0].tags, vec!["finance", "weekly"]);
        assert!(templates[0].user.contains("User request: Summarize revenue"));
        assert_eq!(templates[1].name, "Imported Prompt 2");
        assert_eq!(templates[1].tags, vec!["imported"]);
    }

    #[test]
    fn test_parse_csv_latin1() {
        let mut csv = b"name,prompt\nCaf".to_vec();
        csv.push(0xe9);
        csv.extend_from_slice(b" Menu,Describe the menu\n");

        let templates = parse_payload(&csv, PayloadFormat::Csv).unwrap();
        assert_eq!(templates[0].name, "Caf\u{e9} Menu");
        assert_eq!(templates[0].id, "cafe-menu");
    }

    #[test]
    fn test_import_payload_saves_and_archives() {
        let temp = TempDir::new().unwrap();
        let repo = StoreRepository::open(temp.path());
        let mut store = repo.load().unwrap();

        let payload = b"name,prompt\nDaily Standup,Summarize yesterday\n";
        let report = import_payload(&repo, &mut store, payload, PayloadFormat::Csv).unwrap();

        assert_eq!((report.created, report.updated), (1, 0));
        let archived = report.archived.unwrap();
        assert_eq!(std::fs::read(&archived).unwrap(), payload);
        assert_eq!(repo.load().unwrap().templates[0].id, "daily-standup");
        assert_eq!(repo.list_snapshots().unwrap().len(), 1);
    }

    #[test]
    fn test_import_empty_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let repo = StoreRepository::open(temp.path());
        let mut store = repo.load().unwrap();

        let report = import_payload(&repo, &mut store, b"name,prompt\n", PayloadFormat::Csv).unwrap();
        assert_eq!(report, ImportReport::default());
        assert!(!repo.data_path().exists());
    }

    #[test]
    fn test_export_formats() {
        let mut store = Store::new();
        store.templates.push(tpl("Zeta", "z"));

        let json = export_store(&store, PayloadFormat::Json).unwrap();
        assert!(json.contains("\n  \"meta\""));

        let yaml = export_template(&store.templates[0], PayloadFormat::Yaml).unwrap();
        let id_pos = yaml.find("id: zeta").unwrap();
        let name_pos = yaml.find("name: Zeta").unwrap();
        let created_pos = yaml.find("created_at:").unwrap();
        assert!(yaml.starts_with("templates:"));
        assert!(id_pos < name_pos && name_pos < created_pos);

        let back = parse_payload(yaml.as_bytes(), PayloadFormat::Yaml).unwrap();
        assert_eq!(back[0], store.templates[0]);

        assert!(matches!(
            export_store(&store, PayloadFormat::Csv),
            Err(StoreError::UnsupportedExport(PayloadFormat::Csv))
        ));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(PayloadFormat::from_path(Path::new("a/b.YML")), Some(PayloadFormat::Yaml));
        assert_eq!(PayloadFormat::from_path(Path::new("x.csv")), Some(PayloadFormat::Csv));
        assert_eq!(PayloadFormat::from_path(Path::new("x.txt")), None);
        assert_eq!(PayloadFormat::from_path(Path::new("noext")), None);
    }
}
