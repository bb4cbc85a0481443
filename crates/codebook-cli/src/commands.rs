//! Command implementations.

use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table, presets::UTF8_FULL_CONDENSED};
use tracing::info;

use codebook_core::{BuildRequest, CodebookBuild, build};
use codebook_ingest::{CodebookCatalog, DirectorySource, SourceKind};
use codebook_model::NodeKind;
use codebook_registry::Registry;

use crate::cli::{CodebooksArgs, TreeArgs};

/// Build one (codebook, document, language) and print the tree.
pub fn run_tree(args: &TreeArgs) -> Result<()> {
    let catalog = CodebookCatalog::load(&args.catalog)
        .with_context(|| format!("load catalog {}", args.catalog.display()))?;
    let settings = catalog.get(&args.codebook)?;

    let source = Arc::new(DirectorySource::new(&args.cache_dir));
    let registry = Registry::new(Arc::clone(&source) as Arc<dyn codebook_ingest::DocumentSource>);
    let request = BuildRequest {
        document: args.document.clone(),
        language: args.language.clone(),
    };

    info!(
        codebook = %args.codebook,
        document = %args.document,
        language = %args.language,
        "building codebook tree"
    );
    let result = build(&registry, source.as_ref(), settings, &request)?;
    print_tree(&result, args.codelists);

    if result.has_issues() {
        eprintln!();
        eprintln!("{} item(s) could not be fully built:", result.issues.len());
        for issue in &result.issues {
            eprintln!("  {}: {}", issue.item_id, issue.message);
        }
    }
    Ok(())
}

fn print_tree(result: &CodebookBuild, codelists: bool) {
    for (node, depth) in result.tree.walk() {
        let item = result.tree.item(node);
        let indent = "  ".repeat(depth);
        match item.kind {
            NodeKind::Group => println!("{indent}{} ({})", item.name, item.kind),
            NodeKind::LeafInfo => println!("{indent}[info] {}", item.description),
            NodeKind::Leaf => {
                let mut line = format!("{indent}{} ({})", item.name, item.data_type);
                if !item.units.is_empty() {
                    line.push_str(&format!(" [{}]", item.units));
                }
                if item.has_code_list() {
                    line.push_str(&format!(", {} codes", item.code_list().len()));
                }
                println!("{line}");
                if codelists {
                    for entry in item.code_list() {
                        println!("{indent}    {} = {} ({})", entry.code, entry.value, entry.code_system);
                    }
                }
            }
        }
    }
}

/// List catalog entries.
pub fn run_codebooks(args: &CodebooksArgs) -> Result<()> {
    let catalog = CodebookCatalog::load(&args.catalog)
        .with_context(|| format!("load catalog {}", args.catalog.display()))?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        "Name",
        "Kind",
        "Server",
        "Selectable groups",
        "Excluded languages",
    ]);
    for settings in catalog.iter() {
        let kind = match settings.kind {
            SourceKind::Decor => "decor",
            SourceKind::Archetype => "archetype",
        };
        table.add_row(vec![
            Cell::new(&settings.name),
            Cell::new(kind),
            Cell::new(&settings.server),
            Cell::new(if settings.groups_selectable { "yes" } else { "no" }),
            Cell::new(settings.excluded_languages.join(", ")),
        ]);
    }
    println!("{table}");
    Ok(())
}
