//! Template and Store types
//!
//! `Template` is the unit of persistence; `Store` is the whole collection plus
//! metadata, written to disk in one piece. Every field has a serde default so
//! hand-written or older payloads deserialize without re-checking optional
//! fields downstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Store schema version written by this crate
pub const STORE_VERSION: u32 = 1;

/// Current UTC time
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Slugify a name for use as a template ID
///
/// Transliterates to ASCII and joins alphanumeric runs with `-`, so
/// `Don't Panic` becomes `don-t-panic` and `Café Menu` becomes `cafe-menu`.
pub fn slugify(name: &str) -> String {
    slug::slugify(name)
}

/// Treat an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Review state of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemplateStatus {
    #[default]
    Draft,
    Approved,
    Deprecated,
}

impl TemplateStatus {
    /// Parse a status name, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "approved" => Some(Self::Approved),
            "deprecated" => Some(Self::Deprecated),
            _ => None,
        }
    }
}

impl std::fmt::Display for TemplateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Approved => write!(f, "approved"),
            Self::Deprecated => write!(f, "deprecated"),
        }
    }
}

impl std::str::FromStr for TemplateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown status '{}': expected draft, approved or deprecated", s))
    }
}

/// A substitution slot declared by a template
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Variable {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub default: String,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Do/don't guidance attached to a template
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Safety {
    #[serde(rename = "do", deserialize_with = "null_as_default")]
    pub r#do: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub dont: Vec<String>,
}

/// A named prompt definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Slug of `name`; unique within a store
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,

    /// Display name; required when saving through the editor path
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub use_case: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub audience: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tone: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub model_family: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub owner: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub status: TemplateStatus,

    #[serde(default, deserialize_with = "null_as_default")]
    pub variables: Vec<Variable>,

    /// System prompt text, may contain placeholders
    #[serde(default, deserialize_with = "null_as_default")]
    pub system: String,

    /// User prompt text, may contain placeholders
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: String,

    /// Tool/function instructions
    #[serde(default, deserialize_with = "null_as_default")]
    pub tools: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub safety: Safety,

    /// Acceptance criteria for model output
    #[serde(default, deserialize_with = "null_as_default")]
    pub evaluation: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub references: Vec<String>,

    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// Create a template with its ID derived from the name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let ts = now();
        Self {
            id: slugify(&name),
            name,
            description: String::new(),
            use_case: String::new(),
            audience: String::new(),
            tone: String::new(),
            model_family: String::new(),
            tags: Vec::new(),
            owner: String::new(),
            status: TemplateStatus::Draft,
            variables: Vec::new(),
            system: String::new(),
            user: String::new(),
            tools: String::new(),
            safety: Safety::default(),
            evaluation: String::new(),
            references: Vec::new(),
            created_at: ts,
            updated_at: ts,
        }
    }

    /// Set the system and user prompt text
    pub fn with_prompts(mut self, system: impl Into<String>, user: impl Into<String>) -> Self {
        self.system = system.into();
        self.user = user.into();
        self
    }

    /// Set the tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Look up a declared variable by name (first match)
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }
}

/// Store metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    STORE_VERSION
}

impl Default for StoreMeta {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            updated_at: now(),
        }
    }
}

/// The full template collection; insertion order is display and export order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Store {
    #[serde(default)]
    pub meta: StoreMeta,

    #[serde(default)]
    pub templates: Vec<Template>,
}

impl Store {
    /// An empty store stamped with the current time
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
