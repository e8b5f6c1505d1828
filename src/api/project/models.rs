use serde::{Deserialize, Serialize};
use validator::Validate;

/// JSON payload for creating a project from raw text.
#[derive(Deserialize, Serialize, Debug, Validate)]
pub struct NewProject {
    #[validate(length(
        min = 1,
        max = 120,
        message = "Name must be between 1 and 120 characters"
    ))]
    pub name: String,
    #[validate(length(min = 1, message = "Content must not be empty"))]
    pub content: String,
}

/// File extensions accepted by the upload endpoint. Text extraction from
/// richer formats is a separate concern; this service only ingests plain
/// text and markdown.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];

pub fn extension_allowed(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Project name derived from an uploaded file: the stem without extension.
pub fn name_from_file(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name)
        .to_string()
}
