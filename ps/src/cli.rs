//! CLI argument parsing for promptstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::import::PayloadFormat;
use crate::template::TemplateStatus;

#[derive(Parser, Debug)]
#[command(name = "pst")]
#[command(author, version, about = "Local catalog of reusable prompt templates", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory (overrides config)
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List templates, optionally filtered
    List {
        /// Keyword matched against name, description, prompts, tags and owner
        #[arg(short, long)]
        query: Option<String>,

        /// Require this tag (repeatable; all must match)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Restrict to these model families
        #[arg(short, long = "model")]
        models: Vec<String>,

        /// Restrict to these statuses
        #[arg(short, long = "status")]
        statuses: Vec<TemplateStatus>,

        /// Restrict to these owners
        #[arg(short, long = "owner")]
        owners: Vec<String>,
    },

    /// Show one template as YAML
    Show {
        #[arg(required = true)]
        id: String,
    },

    /// Create a template, or update the one whose name slugs to the same id
    Save(SaveArgs),

    /// Delete a template
    Delete {
        #[arg(required = true)]
        id: String,
    },

    /// Copy a template under `<id>-copy`
    Duplicate {
        #[arg(required = true)]
        id: String,
    },

    /// Import templates from a JSON, YAML or CSV file
    Import {
        #[arg(required = true)]
        path: PathBuf,

        /// Payload format (default: from file extension)
        #[arg(short, long)]
        format: Option<PayloadFormat>,
    },

    /// Export the store, or a single template
    Export {
        /// Output format
        #[arg(short, long, default_value = "json")]
        format: PayloadFormat,

        /// Export only this template
        #[arg(short, long)]
        id: Option<String>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a template with variable values
    Render {
        #[arg(required = true)]
        id: String,

        /// Variable value as key=value (repeatable)
        #[arg(long = "var", value_parser = parse_key_value)]
        vars: Vec<(String, String)>,
    },

    /// List the placeholders used by a template
    Placeholders {
        #[arg(required = true)]
        id: String,
    },

    /// List saved snapshots, oldest first
    Snapshots,

    /// Make a snapshot the current state
    Restore {
        /// Snapshot file name, e.g. prompts-20240501-123000.json
        #[arg(required = true)]
        snapshot: String,
    },

    /// Delete old snapshots
    Prune {
        /// Number of most recent snapshots to keep (at least 1)
        #[arg(short, long, required = true)]
        keep: usize,
    },
}

#[derive(clap::Args, Debug)]
pub struct SaveArgs {
    /// Display name; the id is derived from it
    #[arg(short, long, required = true)]
    pub name: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long, default_value = "")]
    pub use_case: String,

    #[arg(long, default_value = "")]
    pub audience: String,

    #[arg(long, default_value = "")]
    pub tone: String,

    #[arg(long, default_value = "OpenAI")]
    pub model_family: String,

    /// Comma-separated tags
    #[arg(long, default_value = "")]
    pub tags: String,

    #[arg(long, default_value = "")]
    pub owner: String,

    #[arg(long, default_value = "draft")]
    pub status: TemplateStatus,

    /// System prompt text
    #[arg(long, default_value = "")]
    pub system: String,

    /// User prompt text; use {{name}} for variables
    #[arg(long, default_value = "")]
    pub user: String,

    /// Tool/function instructions
    #[arg(long, default_value = "")]
    pub tools: String,

    /// Evaluation criteria
    #[arg(long, default_value = "")]
    pub evaluation: String,

    /// Reference link or note (repeatable)
    #[arg(long = "reference")]
    pub references: Vec<String>,

    /// Safety guideline to follow (repeatable)
    #[arg(long = "safety-do")]
    pub safety_do: Vec<String>,

    /// Safety guideline to avoid (repeatable)
    #[arg(long = "safety-dont")]
    pub safety_dont: Vec<String>,

    /// Variable as name:description:default (repeatable)
    #[arg(long = "var")]
    pub vars: Vec<String>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("Expected key=value, got '{}'", s))
}
