//! Catalog operations on a loaded store
//!
//! Create/edit, delete, duplicate, filtering and render previews. Everything
//! here mutates or reads the in-memory [`Store`]; persisting is the caller's
//! job via [`StoreRepository::save`](crate::repository::StoreRepository::save).

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::error::{Result, StoreError};
use crate::placeholder::{extract_placeholders, render_with_vars, token_estimate};
use crate::template::{Store, Template, TemplateStatus, Variable, now, slugify};

/// Whether a save appended a new template or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Saved {
    Created,
    Updated,
}

impl Store {
    /// Find a template by id
    pub fn find(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.templates.iter().position(|t| t.id == id)
    }

    /// Create or update a template from editor input
    ///
    /// The name is trimmed and required. The id is re-derived from the name,
    /// so renaming produces a different template. An existing id keeps its
    /// position and `created_at`.
    pub fn save_template(&mut self, mut template: Template) -> Result<Saved> {
        template.name = template.name.trim().to_string();
        if template.name.is_empty() {
            return Err(StoreError::Validation("Name is required".to_string()));
        }
        template.id = slugify(&template.name);
        if template.id.is_empty() {
            return Err(StoreError::Validation(format!(
                "Name '{}' has no characters usable in an id",
                template.name
            )));
        }
        template.variables.retain(|v| !v.name.is_empty());

        let ts = now();
        template.updated_at = ts;
        match self.position(&template.id) {
            Some(pos) => {
                template.created_at = self.templates[pos].created_at;
                debug!(id = %template.id, "Updating template");
                self.templates[pos] = template;
                Ok(Saved::Updated)
            }
            None => {
                template.created_at = ts;
                debug!(id = %template.id, "Creating template");
                self.templates.push(template);
                Ok(Saved::Created)
            }
        }
    }

    /// Remove a template; returns false if the id was unknown
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.templates.len();
        self.templates.retain(|t| t.id != id);
        self.templates.len() != before
    }

    /// Append a copy of `id` as `<id>-copy` with fresh timestamps
    ///
    /// If `<id>-copy` is taken the first free `<id>-copy-N` (N >= 2) is used,
    /// keeping ids unique.
    pub fn duplicate(&mut self, id: &str) -> Result<&Template> {
        let original = self.find(id).ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;

        let mut copy = original.clone();
        copy.id = self.free_copy_id(id);
        copy.name = format!("{} (Copy)", original.name);
        let ts = now();
        copy.created_at = ts;
        copy.updated_at = ts;

        self.templates.push(copy);
        Ok(&self.templates[self.templates.len() - 1])
    }

    fn free_copy_id(&self, id: &str) -> String {
        let base = format!("{}-copy", id);
        if self.find(&base).is_none() {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}-{}", base, n);
            if self.find(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    /// Every tag in use, sorted
    pub fn all_tags(&self) -> Vec<String> {
        facet(self.templates.iter().flat_map(|t| t.tags.iter()))
    }

    /// Every owner in use, sorted
    pub fn owners(&self) -> Vec<String> {
        facet(self.templates.iter().map(|t| &t.owner))
    }

    /// Every model family in use, sorted
    pub fn model_families(&self) -> Vec<String> {
        facet(self.templates.iter().map(|t| &t.model_family))
    }

    /// Templates matching `filter`, in store order
    pub fn filter<'a>(&'a self, filter: &'a Filter) -> impl Iterator<Item = &'a Template> + 'a {
        self.templates.iter().filter(move |t| filter.matches(t))
    }
}

fn facet<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    values
        .filter(|v| !v.is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Append a blank variable for each placeholder in `texts` not yet declared
///
/// The list is owned by the caller and returned in order; existing entries are
/// never removed or reordered.
pub fn sync_variables(mut variables: Vec<Variable>, texts: &[&str]) -> Vec<Variable> {
    let detected: BTreeSet<String> = texts.iter().flat_map(|t| extract_placeholders(t)).collect();
    for name in detected {
        if !variables.iter().any(|v| v.name == name) {
            variables.push(Variable::new(name));
        }
    }
    variables
}

/// Catalog search criteria; empty selections match everything
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Case-insensitive substring of name, description, prompts, tags or owner
    pub query: Option<String>,
    /// All of these tags must be present
    pub tags: Vec<String>,
    pub model_families: Vec<String>,
    pub statuses: Vec<TemplateStatus>,
    pub owners: Vec<String>,
}

impl Filter {
    pub fn matches(&self, template: &Template) -> bool {
        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let blob = [
                template.name.as_str(),
                template.description.as_str(),
                template.system.as_str(),
                template.user.as_str(),
                template.tags.join(" ").as_str(),
                template.owner.as_str(),
            ]
            .join(" ")
            .to_lowercase();
            if !blob.contains(&query.to_lowercase()) {
                return false;
            }
        }
        if !self.tags.iter().all(|tag| template.tags.contains(tag)) {
            return false;
        }
        if !self.model_families.is_empty() && !self.model_families.contains(&template.model_family) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&template.status) {
            return false;
        }
        if !self.owners.is_empty() && !self.owners.contains(&template.owner) {
            return false;
        }
        true
    }
}

/// A template with its variables substituted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
    /// Heuristic, see [`token_estimate`]
    pub estimated_tokens: usize,
}

impl RenderedPrompt {
    /// Plain-text form with `[SYSTEM]` and `[USER]` sections
    pub fn to_text(&self) -> String {
        format!("[SYSTEM]\n{}\n\n[USER]\n{}", self.system, self.user)
    }
}

/// Render a template using variable defaults overlaid with `overrides`
pub fn render_template(template: &Template, overrides: &HashMap<String, String>) -> RenderedPrompt {
    let mut values: HashMap<String, String> = template
        .variables
        .iter()
        .map(|v| (v.name.clone(), v.default.clone()))
        .collect();
    values.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

    let system = render_with_vars(&template.system, &values);
    let user = render_with_vars(&template.user, &values);
    let estimated_tokens = token_estimate(&format!("{}{}", system, user));
    RenderedPrompt {
        system,
        user,
        estimated_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(names: &[&str]) -> Store {
        let mut store = Store::new();
        for name in names {
            store.save_template(Template::new(*name)).unwrap();
        }
        store
    }

    #[test]
    fn test_save_template_requires_name() {
        let mut store = Store::new();
        let err = store.save_template(Template::new("   ")).unwrap_err();
        assert!(err.is_validation_error());
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_template_preserves_created_at_and_position() {
        let mut store = store_with(&["Welcome Email", "Second"]);
        let created = store.templates[0].created_at;

        let edited = Template::new("Welcome Email").with_prompts("sys", "Hello {{name}}");
        assert_eq!(store.save_template(edited).unwrap(), Saved::Updated);

        assert_eq!(store.len(), 2);
        assert_eq!(store.templates[0].user, "Hello {{name}}");
        assert_eq!(store.templates[0].created_at, created);
        assert!(store.templates[0].updated_at >= created);
    }

    #[test]
    fn test_save_template_rederives_id_and_drops_blank_vars() {
        let mut store = Store::new();
        let mut tpl = Template::new(" Launch Plan ");
        tpl.id = "something-else".to_string();
        tpl.variables = vec![Variable::new(""), Variable::new("date")];

        assert_eq!(store.save_template(tpl).unwrap(), Saved::Created);
        assert_eq!(store.templates[0].id, "launch-plan");
        assert_eq!(store.templates[0].name, "Launch Plan");
        assert_eq!(store.templates[0].variables, vec![Variable::new("date")]);
    }

    #[test]
    fn test_delete() {
        let mut store = store_with(&["A", "B"]);
        assert!(store.delete("a"));
        assert!(!store.delete("a"));
        assert_eq!(store.templates[0].id, "b");
    }

    #[test]
    fn test_duplicate() {
        let mut store = store_with(&["Welcome Email"]);
        let original = store.templates[0].clone();

        let copy = store.duplicate("welcome-email").unwrap().clone();
        assert_eq!(copy.id, "welcome-email-copy");
        assert_eq!(copy.name, "Welcome Email (Copy)");
        assert!(copy.created_at >= original.created_at);
        assert_eq!(store.templates[0], original);

        let again = store.duplicate("welcome-email").unwrap();
        assert_eq!(again.id, "welcome-email-copy-2");

        assert!(matches!(store.duplicate("missing"), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_sync_variables() {
        let existing = vec![Variable {
            name: "name".to_string(),
            description: "Recipient".to_string(),
            default: "friend".to_string(),
        }];
        let synced = sync_variables(existing, &["Hi {{name}} from {{ company }}", "{{a.b}}"]);

        let names: Vec<&str> = synced.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["name", "a.b", "company"]);
        assert_eq!(synced[0].default, "friend");
    }

    #[test]
    fn test_filter() {
        let mut store = Store::new();
        let mut a = Template::new("Onboarding Email").with_tags(["email", "onboarding"]);
        a.owner = "growth".to_string();
        a.model_family = "Anthropic".to_string();
        a.status = TemplateStatus::Approved;
        let mut b = Template::new("Code Review").with_tags(["code"]);
        b.user = "Review this EMAIL parser".to_string();
        b.owner = "platform".to_string();
        store.save_template(a).unwrap();
        store.save_template(b).unwrap();

        let ids = |f: &Filter| store.filter(f).map(|t| t.id.clone()).collect::<Vec<_>>();

        assert_eq!(ids(&Filter::default()).len(), 2);
        assert_eq!(
            ids(&Filter {
                query: Some("email".to_string()),
                ..Default::default()
            }),
            vec!["onboarding-email", "code-review"]
        );
        assert_eq!(
            ids(&Filter {
                tags: vec!["email".to_string(), "onboarding".to_string()],
                ..Default::default()
            }),
            vec!["onboarding-email"]
        );
        assert_eq!(
            ids(&Filter {
                statuses: vec![TemplateStatus::Draft],
                ..Default::default()
            }),
            vec!["code-review"]
        );
        assert!(
            ids(&Filter {
                owners: vec!["growth".to_string()],
                model_families: vec!["OpenAI".to_string()],
                ..Default::default()
            })
            .is_empty()
        );
    }

    #[test]
    fn test_facets() {
        let mut store = Store::new();
        let mut a = Template::new("A").with_tags(["b", "a"]);
        a.owner = "team".to_string();
        let b = Template::new("B").with_tags(["a", "c"]);
        store.save_template(a).unwrap();
        store.save_template(b).unwrap();

        assert_eq!(store.all_tags(), vec!["a", "b", "c"]);
        assert_eq!(store.owners(), vec!["team"]);
        assert!(store.model_families().is_empty());
    }

    #[test]
    fn test_render_template() {
        let mut tpl = Template::new("Greeting").with_prompts("You greet {{audience}}.", "Hello {{name}}, {{missing}}");
        tpl.variables = vec![
            Variable {
                name: "name".to_string(),
                description: String::new(),
                default: "friend".to_string(),
            },
            Variable {
                name: "audience".to_string(),
                description: String::new(),
                default: "customers".to_string(),
            },
        ];

        let overrides = HashMap::from([("name".to_string(), "Ada".to_string())]);
        let rendered = render_template(&tpl, &overrides);

        assert_eq!(rendered.system, "You greet customers.");
        assert_eq!(rendered.user, "Hello Ada, {{missing}}");
        assert_eq!(
            rendered.estimated_tokens,
            token_estimate("You greet customers.Hello Ada, {{missing}}")
        );
        assert_eq!(
            rendered.to_text(),
            "[SYSTEM]\nYou greet customers.\n\n[USER]\nHello Ada, {{missing}}"
        );
    }
}
