use crate::error::{Error, Result};
use crate::options::is_fragment;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A template file found under a template root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// The template root it was found under
    pub root: PathBuf,
    /// Path relative to `root`; mirrored into the output directory
    pub relative: PathBuf,
}

impl Target {
    /// Full path of the template file.
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.relative)
    }

    /// Template name: the relative path with forward slashes.
    pub fn name(&self) -> String {
        self.relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Files of all template roots, split into generation targets and fragments.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub targets: Vec<Target>,
    pub fragments: Vec<Target>,
}

/// Walk every template root in lexical order.
///
/// Fragment detection looks at the path relative to its root only, so a root
/// that itself lives under an `_`-prefixed directory still yields targets.
pub fn discover(roots: &[PathBuf]) -> Result<Discovery> {
    let mut found = Discovery::default();
    for root in roots {
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::from(std::io::Error::from(e)).at(root))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = relative_to(entry.path(), root);
            let target = Target {
                root: root.clone(),
                relative,
            };
            if is_fragment(&target.relative) {
                found.fragments.push(target);
            } else {
                found.targets.push(target);
            }
        }
    }
    Ok(found)
}

fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
