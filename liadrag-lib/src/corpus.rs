//! Plain-text corpus reading
//!
//! The crawler drops one `.txt` file per page into a data directory. Each file
//! becomes a [`Document`] whose id is its file name.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::Result;

/// A source document: identifier plus its full text.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Read every `.txt` file directly inside `dir`, sorted by file name.
///
/// Files that cannot be read as UTF-8 are logged and skipped so one bad page does
/// not stop a build. A missing directory is an error.
pub fn read_corpus(dir: &Path) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("corpus directory {} not found", dir.display()),
        )
        .into());
    }

    let mut documents = Vec::new();
    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file());

    for entry in entries {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("txt") {
            continue;
        }
        match fs::read_to_string(path) {
            Ok(content) => {
                let id = entry.file_name().to_string_lossy().to_string();
                debug!(%id, bytes = content.len(), "read document");
                documents.push(Document::new(id, strip_bom(content)));
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable document"),
        }
    }
    Ok(documents)
}

fn strip_bom(content: String) -> String {
    match content.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => content,
    }
}
