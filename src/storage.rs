//! Artifact output directory.
//!
//! Generated posters are written here and served read-only under `ARTIFACT_URL_PREFIX`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use uuid::Uuid;

pub const ARTIFACT_URL_PREFIX: &str = "/posters/files";

/// Kind of artifact produced by the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Pdf,
    Png,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `data` under a collision-resistant name and return the final path.
    ///
    /// The bytes go to a temp file inside the output directory first and are renamed into
    /// place, so a failed write never leaves a half-written artifact behind. The blocking
    /// file work runs on tokio's blocking pool.
    pub async fn persist(
        &self,
        business_name: &str,
        kind: ArtifactKind,
        data: Vec<u8>,
    ) -> io::Result<PathBuf> {
        let output_dir = self.output_dir.clone();
        let path = output_dir.join(artifact_file_name(business_name, kind));

        tokio::task::spawn_blocking(move || {
            write_atomically(&output_dir, &path, &data)?;
            Ok(path)
        })
        .await
        .map_err(io::Error::other)?
    }

    pub async fn remove(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }

    /// Public URL for an artifact written by `persist`.
    pub fn url_for(&self, path: &Path) -> Option<String> {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| format!("{}/{}", ARTIFACT_URL_PREFIX, name))
    }

    /// Map a public artifact URL back to its file on disk.
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let name = url
            .strip_prefix(ARTIFACT_URL_PREFIX)?
            .trim_start_matches('/');
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return None;
        }
        Some(self.output_dir.join(name))
    }

    pub async fn delete_by_url(&self, url: &str) -> io::Result<()> {
        match self.path_for_url(url) {
            Some(path) => self.remove(&path).await,
            None => Ok(()),
        }
    }
}

fn write_atomically(dir: &Path, path: &Path, data: &[u8]) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// `<business name>_<unix seconds>_<8 hex>.<ext>`; spaces become underscores.
pub fn artifact_file_name(business_name: &str, kind: ArtifactKind) -> String {
    let safe_name = sanitize_business_name(business_name);
    let timestamp = chrono::Utc::now().timestamp();
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}.{}",
        safe_name,
        timestamp,
        &suffix[..8],
        kind.extension()
    )
}

pub fn sanitize_business_name(name: &str) -> String {
    let replaced = name.trim().replace(' ', "_");
    let sanitized = sanitize_filename::sanitize(&replaced);
    if sanitized.is_empty() {
        "poster".to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_spaces() {
        assert_eq!(sanitize_business_name("Acme Shop Ltd"), "Acme_Shop_Ltd");
    }

    #[test]
    fn test_sanitize_strips_path_separators() {
        let name = sanitize_business_name("../../etc/passwd");
        assert!(!name.contains('/'));
    }

    #[test]
    fn test_sanitize_falls_back_for_empty_names() {
        assert_eq!(sanitize_business_name("   "), "poster");
    }

    #[test]
    fn test_file_names_are_unique_within_a_second() {
        let a = artifact_file_name("Acme", ArtifactKind::Pdf);
        let b = artifact_file_name("Acme", ArtifactKind::Pdf);
        assert_ne!(a, b);
        assert!(a.starts_with("Acme_"));
        assert!(a.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_persist_and_resolve_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let path = store
            .persist("Acme Shop", ArtifactKind::Png, b"png-bytes".to_vec())
            .await
            .unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"png-bytes");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

        let url = store.url_for(&path).unwrap();
        assert!(url.starts_with(ARTIFACT_URL_PREFIX));
        assert_eq!(store.path_for_url(&url).unwrap(), path);

        store.delete_by_url(&url).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_persist_creates_missing_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("nested/out"));

        let path = store
            .persist("Acme", ArtifactKind::Pdf, b"%PDF".to_vec())
            .await
            .unwrap();
        assert!(path.starts_with(dir.path().join("nested/out")));
        assert!(path.exists());
    }

    #[test]
    fn test_path_for_url_rejects_traversal() {
        let store = ArtifactStore::new("/tmp/out");
        assert!(store.path_for_url("/posters/files/../secret").is_none());
        assert!(store.path_for_url("/elsewhere/file.pdf").is_none());
    }
}
