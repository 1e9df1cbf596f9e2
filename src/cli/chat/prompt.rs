use rustyline::{Config, Editor, Result};

use crate::client::PendingAttachment;

/// The input prompt, showing the staged attachment if there is one.
pub fn generate_prompt(attachment: Option<&PendingAttachment>) -> String {
    match attachment {
        Some(attachment) => format!("[{} {}] > ", attachment.kind, attachment.name),
        None => "> ".to_string(),
    }
}

pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(rustyline::CompletionType::List)
        .build();
    Editor::with_config(config)
}
