use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use serde_json::json;
use tracing::{error, info, warn};

use nodeweave_core::types::{LoadedDocument, Metadata};

/// Load every UTF-8 file directly inside `dir` (no recursion).
///
/// Files are visited in name order; the position among all regular files feeds
/// the id, so a file that fails to read still consumes its index. A missing
/// directory yields an empty list.
pub fn load_documents_from_directory(dir: &Path) -> Vec<LoadedDocument> {
    if !dir.is_dir() {
        error!(path = %dir.display(), "Directory does not exist or is not a directory");
        return Vec::new();
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            error!(path = %dir.display(), error = %e, "Failed to list directory");
            return Vec::new();
        }
    };

    let mut files: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    let mut documents = Vec::new();
    for (idx, path) in files.iter().enumerate() {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                continue;
            }
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let doc_id = format!("doc_{}_{}_type_{}", idx, base_name, extension);

        let mut metadata = Metadata::new();
        metadata.insert("filename".into(), json!(file_name));
        metadata.insert("file_path".into(), json!(path.display().to_string()));
        if let Ok(info) = std::fs::metadata(path) {
            let modified = info.modified().ok();
            metadata.insert("file_size".into(), json!(info.len()));
            if let Some(created) = info.created().ok().or(modified) {
                metadata.insert("created".into(), json!(iso_timestamp(created)));
            }
            if let Some(modified) = modified {
                metadata.insert("modified".into(), json!(iso_timestamp(modified)));
            }
        }
        metadata.insert("file_extension".into(), json!(extension));
        metadata.insert("base_name".into(), json!(base_name));
        metadata.insert("document_id".into(), json!(doc_id));

        info!(path = %path.display(), id = %doc_id, "Loaded document");
        documents.push(LoadedDocument {
            id: doc_id,
            content,
            metadata,
        });
    }

    info!(path = %dir.display(), count = documents.len(), "Directory loaded");
    documents
}

fn iso_timestamp(t: SystemTime) -> String {
    DateTime::<Local>::from(t)
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}
