use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Placeholder written into every directory the generator creates.
pub const INDEX_FILE: &str = "index.html";
const INDEX_BODY: &str = "<html></html>";

/// Create `dir` and any missing ancestors, returning the directories created
/// (outermost first) after seeding each with an index page.
pub fn prepare_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut missing = Vec::new();
    let mut current = Some(dir);
    while let Some(path) = current {
        if path.as_os_str().is_empty() || path.exists() {
            break;
        }
        missing.push(path.to_path_buf());
        current = path.parent();
    }
    missing.reverse();

    fs::create_dir_all(dir).map_err(|e| Error::from(e).at(dir))?;
    seed_index(&missing)?;
    Ok(missing)
}

/// Write the placeholder index page into each of `dirs`.
pub fn seed_index(dirs: &[PathBuf]) -> Result<()> {
    for dir in dirs {
        let index = dir.join(INDEX_FILE);
        write_file(&index, INDEX_BODY.as_bytes())?;
        debug!(dir = %dir.display(), "seeded index page");
    }
    Ok(())
}

/// Write `bytes` to `path` (mode 0644 on Unix), creating parent directories.
pub fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        prepare_dir(parent)?;
    }
    write_file(path, bytes)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    let mut file = options.open(path).map_err(|e| Error::from(e).at(path))?;
    file.write_all(bytes).map_err(|e| Error::from(e).at(path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_dir_seeds_each_new_level() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("dist/dev/conf");
        let created = prepare_dir(&dir).unwrap();
        assert_eq!(created.len(), 3);
        for level in ["dist", "dist/dev", "dist/dev/conf"] {
            let index = tmp.path().join(level).join(INDEX_FILE);
            assert_eq!(fs::read_to_string(index).unwrap(), INDEX_BODY);
        }
        assert!(!tmp.path().join(INDEX_FILE).exists());
    }

    #[test]
    fn test_existing_dirs_are_not_seeded() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("dist")).unwrap();
        let created = prepare_dir(&tmp.path().join("dist/app")).unwrap();
        assert_eq!(created, vec![tmp.path().join("dist/app")]);
        assert!(!tmp.path().join("dist").join(INDEX_FILE).exists());
        assert!(prepare_dir(&tmp.path().join("dist/app")).unwrap().is_empty());
    }

    #[test]
    fn test_generated_index_replaces_placeholder() {
        let tmp = tempfile::tempdir().unwrap();
        let page = tmp.path().join("site/index.html");
        write_output(&page, b"<h1>real</h1>").unwrap();
        assert_eq!(fs::read_to_string(page).unwrap(), "<h1>real</h1>");
    }

    #[cfg(unix)]
    #[test]
    fn test_written_files_are_not_executable() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("app.yaml");
        write_output(&path, b"a: 1\n").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0);
    }
}
