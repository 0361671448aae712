//! Directory-backed manifest source.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use varuna_core::{Error, Result};

use crate::parse::parse_documents;
use crate::source::{digest_of, ManifestSource};
use crate::types::{ManifestTree, Revision};

/// Manifest source reading `*.yaml` / `*.yml` files under a directory root.
///
/// Files are walked in sorted path order so the digest and the document
/// order are deterministic. Parsed trees are cached per content digest,
/// which also makes repeated fetches of an unchanged tree byte-identical.
pub struct DirSource {
    root: PathBuf,
    default_namespace: String,
    cache: RwLock<HashMap<String, ManifestTree>>,
}

impl DirSource {
    /// Create a source over a manifest directory.
    pub fn new(root: impl Into<PathBuf>, default_namespace: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            default_namespace: default_namespace.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The manifest root this source reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collect manifest files under the root, sorted by path.
    fn manifest_files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(Error::source_unavailable(format!(
                "manifest root '{}' is not a directory",
                self.root.display()
            )));
        }

        let mut files = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let entries = std::fs::read_dir(&dir).map_err(|e| {
                Error::source_unavailable(format!("cannot read '{}': {e}", dir.display()))
            })?;
            for entry in entries {
                let entry = entry.map_err(|e| {
                    Error::source_unavailable(format!("cannot read '{}': {e}", dir.display()))
                })?;
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("yaml" | "yml")
                ) {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

#[async_trait]
impl ManifestSource for DirSource {
    async fn fetch(&self, reference: &str) -> Result<ManifestTree> {
        let files = self.manifest_files()?;

        let mut contents = Vec::with_capacity(files.len());
        for path in &files {
            let text = std::fs::read_to_string(path).map_err(|e| {
                Error::source_unavailable(format!("cannot read '{}': {e}", path.display()))
            })?;
            contents.push((self.relative(path), text));
        }

        let digest = digest_of(
            contents
                .iter()
                .map(|(rel, text)| format!("{rel}\n{text}").into_bytes()),
        );

        if let Some(tree) = self.cache.read().await.get(&digest) {
            debug!(reference, digest = %&digest[..12], "Manifest tree served from cache");
            return Ok(tree.clone());
        }

        let revision = Revision::new(reference, digest.clone());
        let mut resources = Vec::new();
        for (rel, text) in &contents {
            let mut parsed =
                parse_documents(text, rel, &revision.short(), &self.default_namespace)?;
            resources.append(&mut parsed);
        }

        let tree = ManifestTree::new(revision, resources)?;
        debug!(
            reference,
            files = files.len(),
            resources = tree.len(),
            "Fetched manifest tree"
        );
        self.cache.write().await.insert(digest, tree.clone());
        Ok(tree)
    }
}
