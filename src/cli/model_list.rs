//! Model listing functionality
//!
//! This module prints the model catalog, built-in and config-defined alike.

use std::io::{self, Write};

use crate::core::models::{ModelCatalog, DEFAULT_MODEL_ID};

pub fn list_models(catalog: &ModelCatalog, configured_default: Option<&str>) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_model_list(&mut out, catalog, configured_default)
}

pub fn write_model_list<W: Write>(
    out: &mut W,
    catalog: &ModelCatalog,
    configured_default: Option<&str>,
) -> io::Result<()> {
    writeln!(out, "🤖 Available Models")?;
    writeln!(out, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
    writeln!(out)?;

    if catalog.models().is_empty() {
        writeln!(out, "No models found.")?;
        return Ok(());
    }

    let default_id = catalog
        .default_model(configured_default)
        .map(|model| model.id.as_str())
        .unwrap_or(DEFAULT_MODEL_ID);

    for model in catalog.models() {
        if model.id == default_id {
            writeln!(out, "  • {} (default)", model.id)?;
        } else {
            writeln!(out, "  • {}", model.id)?;
        }
        if model.name != model.id {
            writeln!(out, "    Name: {}", model.name)?;
        }
        writeln!(out, "    Provider: {}", model.provider)?;
        if !model.description.is_empty() {
            writeln!(out, "    Description: {}", model.description)?;
        }
        writeln!(out)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(configured_default: Option<&str>) -> String {
        let mut out = Vec::new();
        write_model_list(&mut out, &ModelCatalog::default(), configured_default).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn lists_every_model_with_provider() {
        let listing = render(None);
        assert!(listing.contains(
            "  • gpt-4o-2024-08-06 (default)\n    Name: GPT-4o\n    Provider: OpenAI"
        ));
        assert!(listing.contains("  • claude-3-7-sonnet-20250219\n"));
        assert!(listing.contains("    Provider: Google"));
        assert_eq!(listing.matches("  • ").count(), 5);
    }

    #[test]
    fn configured_default_is_marked() {
        let listing = render(Some("gemini-pro"));
        assert!(listing.contains("  • gemini-pro (default)"));
        assert!(!listing.contains("gpt-4o-2024-08-06 (default)"));
    }
}
