use std::collections::HashMap;
use std::fs;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use promptstore::cli::{Cli, Command, SaveArgs};
use promptstore::config::Config;
use promptstore::{
    Filter, PayloadFormat, Safety, Saved, Store, StoreRepository, Template, export_store, export_template,
    extract_placeholders, import_payload, parse_variables, render_template, sync_variables,
};

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    debug!(data_dir = %config.data_dir.display(), "promptstore starting");

    let repo = config.repository();
    let mut store = repo.load().context("Failed to load store")?;

    match cli.command {
        Command::List {
            query,
            tags,
            models,
            statuses,
            owners,
        } => {
            let filter = Filter {
                query,
                tags,
                model_families: models,
                statuses,
                owners,
            };
            let mut found = 0;
            for t in store.filter(&filter) {
                found += 1;
                println!(
                    "{}  {}  [{}]  {}",
                    t.id.cyan(),
                    t.name,
                    t.tags.join(", ").yellow(),
                    t.status.to_string().dimmed()
                );
            }
            if found == 0 {
                println!("No templates found");
            }
        }
        Command::Show { id } => {
            let template = find(&store, &id)?;
            print!("{}", export_template(template, PayloadFormat::Yaml)?);
        }
        Command::Save(args) => {
            let template = template_from_args(args);
            let id = template.id.clone();
            let outcome = store.save_template(template)?;
            repo.save(&mut store)?;
            match outcome {
                Saved::Created => println!("{} Created template: {}", "✓".green(), id.cyan()),
                Saved::Updated => println!("{} Updated template: {}", "✓".green(), id.cyan()),
            }
        }
        Command::Delete { id } => {
            if !store.delete(&id) {
                return Err(eyre!("Template not found: {}", id));
            }
            repo.save(&mut store)?;
            println!("{} Deleted template: {}", "✓".green(), id);
        }
        Command::Duplicate { id } => {
            let copy_id = store.duplicate(&id)?.id.clone();
            repo.save(&mut store)?;
            println!("{} Duplicated {} as {}", "✓".green(), id, copy_id.cyan());
        }
        Command::Import { path, format } => {
            let format = format
                .or_else(|| PayloadFormat::from_path(&path))
                .ok_or_else(|| eyre!("Cannot infer format of {}; pass --format", path.display()))?;
            let payload = fs::read(&path).context(format!("Failed to read {}", path.display()))?;

            let report = import_payload(&repo, &mut store, &payload, format)?;
            if report.created + report.updated == 0 {
                println!("{} {} file did not contain any prompts to import", "!".yellow(), format);
            } else {
                println!(
                    "{} Imported {} new, updated {} templates from {}",
                    "✓".green(),
                    report.created,
                    report.updated,
                    format
                );
            }
        }
        Command::Export { format, id, output } => {
            let content = match id {
                Some(id) => export_template(find(&store, &id)?, format)?,
                None => export_store(&store, format)?,
            };
            match output {
                Some(path) => {
                    fs::write(&path, content).context(format!("Failed to write {}", path.display()))?;
                    info!("Exported to {}", path.display());
                }
                None => print!("{}", content),
            }
        }
        Command::Render { id, vars } => {
            let template = find(&store, &id)?;
            let overrides: HashMap<String, String> = vars.into_iter().collect();
            let rendered = render_template(template, &overrides);
            println!("{}", rendered.to_text());
            println!();
            println!("{}", format!("Estimated tokens: ~{}", rendered.estimated_tokens).dimmed());
        }
        Command::Placeholders { id } => {
            let template = find(&store, &id)?;
            let mut names = extract_placeholders(&template.system);
            names.extend(extract_placeholders(&template.user));
            for name in names {
                let declared = if template.variable(&name).is_some() { "" } else { " (undeclared)" };
                println!("{}{}", name.cyan(), declared.dimmed());
            }
        }
        Command::Snapshots => cmd_snapshots(&repo)?,
        Command::Restore { snapshot } => {
            let mut restored = repo.load_snapshot(&snapshot)?;
            repo.save(&mut restored)?;
            println!(
                "{} Restored {} ({} templates)",
                "✓".green(),
                snapshot.cyan(),
                restored.templates.len()
            );
        }
        Command::Prune { keep } => {
            let removed = repo.prune_snapshots(keep)?;
            println!("{} Removed {} snapshots", "✓".green(), removed);
        }
    }

    Ok(())
}

fn find<'a>(store: &'a Store, id: &str) -> Result<&'a Template> {
    store.find(id).ok_or_else(|| eyre!("Template not found: {}", id))
}

fn cmd_snapshots(repo: &StoreRepository) -> Result<()> {
    let snapshots = repo.list_snapshots()?;
    if snapshots.is_empty() {
        println!("No snapshots found");
    }
    for snapshot in snapshots {
        println!("{}", snapshot.name);
    }
    Ok(())
}

fn non_blank(lines: Vec<String>) -> Vec<String> {
    lines.into_iter().filter(|l| !l.trim().is_empty()).collect()
}

fn template_from_args(args: SaveArgs) -> Template {
    let mut template = Template::new(args.name);
    template.description = args.description;
    template.use_case = args.use_case;
    template.audience = args.audience;
    template.tone = args.tone;
    template.model_family = args.model_family;
    template.tags = args
        .tags
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    template.owner = args.owner;
    template.status = args.status;
    template.tools = args.tools;
    template.evaluation = args.evaluation;
    template.references = non_blank(args.references);
    template.safety = Safety {
        r#do: non_blank(args.safety_do),
        dont: non_blank(args.safety_dont),
    };

    let declared = args.vars.iter().flat_map(|v| parse_variables(v)).collect();
    template.variables = sync_variables(declared, &[args.system.as_str(), args.user.as_str()]);
    template.system = args.system;
    template.user = args.user;
    template
}
