//! Model selection
//!
//! Resolves the model for a chat from `--model`, the configured default, or
//! an interactive numbered prompt.

use std::error::Error;
use std::io::{self, BufRead, Write};

use crate::core::config::Config;
use crate::core::models::{ModelCatalog, ModelIdentity};

pub fn select_model<'a>(
    requested: Option<&str>,
    config: &Config,
    catalog: &'a ModelCatalog,
) -> Result<&'a ModelIdentity, Box<dyn Error>> {
    match requested.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => {
            if let Some(model) = catalog.find(id) {
                println!("Using model: {}", model.name);
                return Ok(model);
            }
            eprintln!("⚠️  Model '{id}' not found. Please select from available models:");
        }
        None => {
            if let Some(model) = config
                .default_model
                .as_deref()
                .and_then(|id| catalog.find(id))
            {
                println!("Using model: {} (from config)", model.name);
                return Ok(model);
            }
        }
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let mut output = stdout.lock();
    pick_model(catalog, config.default_model.as_deref(), &mut input, &mut output)
}

/// Prompt until a valid number (or an empty line for the default) is read.
pub fn pick_model<'a, R: BufRead, W: Write>(
    catalog: &'a ModelCatalog,
    preferred: Option<&str>,
    input: &mut R,
    output: &mut W,
) -> Result<&'a ModelIdentity, Box<dyn Error>> {
    let models = catalog.models();
    let default_model = catalog
        .default_model(preferred)
        .ok_or("No models available. Add one under [[models]] in config.toml.")?;
    let default_index = models
        .iter()
        .position(|model| model.id == default_model.id)
        .map_or(1, |index| index + 1);

    writeln!(output, "Select an AI Model:")?;
    for (i, model) in models.iter().enumerate() {
        writeln!(output, "  {}. {} ({})", i + 1, model.name, model.provider)?;
        if !model.description.is_empty() {
            writeln!(output, "     {}", model.description)?;
        }
    }
    writeln!(output)?;

    loop {
        write!(
            output,
            "Enter model number [1-{}] (default: {default_index}): ",
            models.len()
        )?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err("No model selected".into());
        }
        let choice = line.trim();
        if choice.is_empty() {
            return Ok(default_model);
        }

        match choice.parse::<usize>() {
            Ok(n) if (1..=models.len()).contains(&n) => {
                let selected = &models[n - 1];
                writeln!(output, "Selected: {}", selected.name)?;
                return Ok(selected);
            }
            Ok(_) => writeln!(output, "Please enter a number between 1 and {}", models.len())?,
            Err(_) => writeln!(output, "Please enter a valid number")?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pick(input: &str, preferred: Option<&str>) -> (Result<String, String>, String) {
        let catalog = ModelCatalog::default();
        let mut reader = Cursor::new(input.as_bytes().to_vec());
        let mut out = Vec::new();
        let result = pick_model(&catalog, preferred, &mut reader, &mut out)
            .map(|model| model.id.clone())
            .map_err(|err| err.to_string());
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn empty_line_picks_default() {
        let (result, output) = pick("\n", None);
        assert_eq!(result.unwrap(), "gpt-4o-2024-08-06");
        assert!(output.contains("(default: 2)"));
    }

    #[test]
    fn configured_default_changes_prompt() {
        let (result, output) = pick("\n", Some("gemini-pro"));
        assert_eq!(result.unwrap(), "gemini-pro");
        assert!(output.contains("(default: 5)"));
    }

    #[test]
    fn invalid_entries_reprompt_until_valid() {
        let (result, output) = pick("abc\n9\n3\n", None);
        assert_eq!(result.unwrap(), "claude-3-7-sonnet-20250219");
        assert!(output.contains("Please enter a valid number"));
        assert!(output.contains("Please enter a number between 1 and 5"));
        assert!(output.contains("Selected: Claude 3.7 Sonnet"));
    }

    #[test]
    fn end_of_input_aborts() {
        let (result, _) = pick("", None);
        assert_eq!(result.unwrap_err(), "No model selected");
    }

    #[test]
    fn known_model_flag_skips_prompt() {
        let catalog = ModelCatalog::default();
        let model = select_model(Some(" gemini-pro "), &Config::default(), &catalog).unwrap();
        assert_eq!(model.id, "gemini-pro");
    }

    #[test]
    fn configured_default_skips_prompt() {
        let catalog = ModelCatalog::default();
        let config = Config {
            default_model: Some("claude-3-5-sonnet-20241022".to_string()),
            ..Config::default()
        };
        let model = select_model(None, &config, &catalog).unwrap();
        assert_eq!(model.id, "claude-3-5-sonnet-20241022");
    }
}
