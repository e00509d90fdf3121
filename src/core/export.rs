//! Markdown transcript written when a session closes.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::core::message::{Message, Role};
use crate::core::models::ModelIdentity;

/// `<timestamp>_<model name, spaces as underscores>_chat.md`
pub fn export_filename(model: &ModelIdentity, now: DateTime<Local>) -> String {
    format!(
        "{}_{}_chat.md",
        now.format("%Y%m%d_%H%M%S"),
        model.name.replace(' ', "_")
    )
}

pub fn render_transcript(
    model: &ModelIdentity,
    messages: &[Message],
    now: DateTime<Local>,
) -> String {
    let mut out = format!(
        "# Chat with {name}\n\n*Date: {date}*\n\n*Model: {name} ({provider})*\n\n---\n\n",
        name = model.name,
        date = now.format("%Y-%m-%d %H:%M:%S"),
        provider = model.provider.display_name(),
    );

    if let Some(system) = messages.iter().find(|m| m.is_system()) {
        out.push_str(&format!(
            "### System Prompt\n\n```\n{}\n```\n\n---\n\n",
            system.content
        ));
    }

    for message in messages {
        let section = match message.role {
            Role::System => continue,
            Role::User => format!("### 🧑 You\n\n{}\n\n", message.content),
            Role::Assistant => format!("### 🤖 {}\n\n{}\n\n", model.name, message.content),
        };
        out.push_str(&section);
        out.push_str("---\n\n");
    }

    out
}

/// Write the transcript into `dir` (the working directory when `None`) and
/// return the file's absolute path.
pub fn write_transcript(
    model: &ModelIdentity,
    messages: &[Message],
    dir: Option<&Path>,
) -> io::Result<PathBuf> {
    let now = Local::now();
    let dir = match dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            dir.to_path_buf()
        }
        None => std::env::current_dir()?,
    };
    let path = dir.join(export_filename(model, now));

    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(render_transcript(model, messages, now).as_bytes())?;
    writer.flush()?;

    let path = std::path::absolute(&path).unwrap_or(path);
    tracing::info!(path = %path.display(), model_id = %model.id, "Wrote chat export");
    Ok(path)
}
