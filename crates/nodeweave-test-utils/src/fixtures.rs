use std::path::{Path, PathBuf};

/// Write `(relative path, contents)` pairs under `root`, creating parent
/// directories, and return the absolute paths in input order.
pub fn write_files(root: &Path, files: &[(&str, &[u8])]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(name, contents)| {
            let path = root.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("create fixture dir");
            }
            std::fs::write(&path, contents).expect("write fixture file");
            path
        })
        .collect()
}

/// Fresh temporary directory populated with `files`.
pub fn temp_dir_with(files: &[(&str, &[u8])]) -> (tempfile::TempDir, Vec<PathBuf>) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let paths = write_files(dir.path(), files);
    (dir, paths)
}
