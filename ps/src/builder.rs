//! Template builder
//!
//! Turns loosely structured records (a CSV row keyed by header) into canonical
//! [`Template`]s. All defaulting for tabular input happens here; nothing in this
//! module fails.

use std::collections::HashMap;

use tracing::warn;

use crate::template::{Safety, Template, TemplateStatus, Variable, now, slugify};

/// Columns tried in order for the seed text of generated prompts
pub const PROMPT_FIELDS: [&str; 4] = ["prompt", "raw_prompt", "user", "text"];

/// Tag applied when a record carries none
pub const DEFAULT_TAG: &str = "imported";

const DEFAULT_DESCRIPTION: &str = "Imported from CSV";
const DEFAULT_USE_CASE: &str = "General analysis";
const DEFAULT_AUDIENCE: &str = "Business stakeholders";
const DEFAULT_TONE: &str = "Analytical and clear";
const DEFAULT_MODEL_FAMILY: &str = "OpenAI";
const DEFAULT_OWNER: &str = "csv-import";

const SCAFFOLD_SYSTEM: &str = "You are a thoughtful AI assistant. Analyse each request carefully, clarify assumptions, \
     and provide precise, actionable answers. When data is missing, outline how it could be \
     obtained and be transparent about limitations.";

const SCAFFOLD_WORKFLOW: &str = "Follow this workflow before answering:\n\
     1. Note any missing context or assumptions you must make.\n\
     2. Think through the request step by step and surface key metrics or considerations.\n\
     3. Present the final answer with a concise summary and, when relevant, bullet points for key numbers.";

/// Wrap a free-form request in the structured system/user scaffold
///
/// Returns two empty strings when `raw_prompt` is blank.
pub fn optimize_prompt_text(raw_prompt: &str) -> (String, String) {
    let prompt = raw_prompt.trim();
    if prompt.is_empty() {
        return (String::new(), String::new());
    }

    let user = format!("{}\n\nUser request: {}", SCAFFOLD_WORKFLOW, prompt);
    (SCAFFOLD_SYSTEM.to_string(), user)
}

/// Split a comma-separated tag list, falling back to the `imported` tag
pub fn parse_tags(value: &str) -> Vec<String> {
    let tags: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();

    if tags.is_empty() {
        vec![DEFAULT_TAG.to_string()]
    } else {
        tags
    }
}

/// Parse `name:description:default` triples separated by `;`
///
/// Chunks with an empty name are dropped. Only the first two colons split, so a
/// default such as `https://example.com` survives intact.
pub fn parse_variables(raw: &str) -> Vec<Variable> {
    raw.split(';')
        .filter_map(|chunk| {
            let mut parts = chunk.splitn(3, ':').map(str::trim);
            let name = parts.next().filter(|n| !n.is_empty())?;
            Some(Variable {
                name: name.to_string(),
                description: parts.next().unwrap_or_default().to_string(),
                default: parts.next().unwrap_or_default().to_string(),
            })
        })
        .collect()
}

/// Split on line breaks, trimming and dropping blank lines
pub fn split_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Read-only view over one record with the lookup rules importers rely on
struct Record<'a> {
    fields: &'a HashMap<String, String>,
}

impl<'a> Record<'a> {
    /// Value of `key` when present and non-empty
    fn non_empty(&self, key: &str) -> Option<&'a str> {
        self.fields.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Value of `key` when present (even if empty), else `default`
    fn or(&self, key: &str, default: &str) -> String {
        self.fields.get(key).cloned().unwrap_or_else(|| default.to_string())
    }

    fn trimmed(&self, key: &str) -> String {
        self.fields.get(key).map(|v| v.trim().to_string()).unwrap_or_default()
    }

    fn lines(&self, key: &str) -> Vec<String> {
        self.non_empty(key).map(split_lines).unwrap_or_default()
    }
}

/// Build a canonical template from a record keyed by field name
///
/// `index` is the record's position in its batch and only feeds the fallback
/// name `Imported Prompt {index + 1}`. When `system` or `user` is blank, the
/// blank side is filled from [`optimize_prompt_text`] applied to the first
/// non-empty of [`PROMPT_FIELDS`].
pub fn build_template(fields: &HashMap<String, String>, index: usize) -> Template {
    let record = Record { fields };

    let prompt_text = PROMPT_FIELDS
        .iter()
        .find_map(|key| record.non_empty(key))
        .map(|v| v.trim().to_string())
        .unwrap_or_default();

    let name = record
        .non_empty("name")
        .or_else(|| record.non_empty("title"))
        .map(String::from)
        .unwrap_or_else(|| format!("Imported Prompt {}", index + 1));

    let mut system = record.trimmed("system");
    let mut user = record.trimmed("user");
    if system.is_empty() || user.is_empty() {
        let seed = if prompt_text.is_empty() { &user } else { &prompt_text };
        let (gen_system, gen_user) = optimize_prompt_text(seed);
        if system.is_empty() {
            system = gen_system;
        }
        if user.is_empty() {
            user = gen_user;
        }
    }

    let status = match record.non_empty("status") {
        None => TemplateStatus::Draft,
        Some(raw) => TemplateStatus::parse(raw).unwrap_or_else(|| {
            warn!(status = raw, name = %name, "Unknown status in imported record, using draft");
            TemplateStatus::Draft
        }),
    };

    let evaluation = record
        .non_empty("evaluation")
        .or_else(|| record.non_empty("evaluation_criteria"))
        .unwrap_or_default()
        .to_string();

    let ts = now();
    Template {
        id: slugify(&name),
        description: record.or("description", DEFAULT_DESCRIPTION),
        use_case: record.or("use_case", DEFAULT_USE_CASE),
        audience: record.or("audience", DEFAULT_AUDIENCE),
        tone: record.or("tone", DEFAULT_TONE),
        model_family: record.or("model_family", DEFAULT_MODEL_FAMILY),
        tags: parse_tags(record.non_empty("tags").unwrap_or_default()),
        owner: record.or("owner", DEFAULT_OWNER),
        status,
        variables: parse_variables(record.non_empty("variables").unwrap_or_default()),
        system,
        user,
        tools: record.or("tools", ""),
        safety: Safety {
            r#do: record.lines("safety_do"),
            dont: record.lines("safety_dont"),
        },
        evaluation,
        references: record.lines("references"),
        created_at: ts,
        updated_at: ts,
        name,
    }
}
