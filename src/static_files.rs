//! Static file lookup for the preview server.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Page served for directory requests.
pub const INDEX_PAGE: &str = "index.html";

/// Maps request paths onto files below a base directory.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base_dir: base.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a request path below the base directory. Anything that could
    /// escape it (`..`, absolute or prefixed components) yields `None`.
    /// Percent escapes are decoded before the checks; invalid UTF-8 is refused.
    pub fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let raw = url_path.split(['?', '#']).next().unwrap_or_default();
        let url_path = urlencoding::decode(raw).ok()?;
        if url_path.contains('\\') || url_path.contains('\0') {
            return None;
        }
        let mut pb = self.base_dir.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    pub fn content_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase()
            .as_str()
        {
            "html" | "htm" => "text/html; charset=utf-8",
            "css" => "text/css",
            "js" => "application/javascript",
            "json" => "application/json",
            "yaml" | "yml" => "application/yaml",
            "toml" => "application/toml",
            "txt" => "text/plain; charset=utf-8",
            _ => "application/octet-stream",
        }
    }

    /// Read the file a request path maps to, with its content type. A
    /// directory serves its `index.html`.
    ///
    /// # Errors
    ///
    /// `NotFound` for escaping paths and missing files; other I/O errors as is.
    pub fn load(&self, url_path: &str) -> io::Result<(Vec<u8>, &'static str)> {
        let mut path = self
            .map_path(url_path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "invalid path"))?;
        if path.is_dir() {
            path.push(INDEX_PAGE);
        }
        if !path.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        }
        let bytes = fs::read(&path)?;
        Ok((bytes, Self::content_type(&path)))
    }
}
