//! Directory scan: walks a tree, hands every file with a registered loader to a
//! worker, and finalizes the corpus once every worker is done.

use crate::error::{EngineError, Result};
use crate::index::Corpus;
use crate::tokenizer::{Loader, PlainLoader};
use crate::DocId;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

pub const TEXT_PLAIN: &str = "text/plain";

pub type LoaderFactory = fn(&Path) -> Arc<dyn Loader>;

fn plain_loader(path: &Path) -> Arc<dyn Loader> {
    Arc::new(PlainLoader::new(path))
}

/// Content type → loader constructor, plus the extension table used to classify files.
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: HashMap<String, LoaderFactory>,
    extensions: HashMap<String, String>,
}

impl fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("content_types", &self.loaders.keys().collect::<Vec<_>>())
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `text/plain` for the usual plain-text extensions.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(TEXT_PLAIN, plain_loader);
        for ext in ["txt", "text", "md", "log", "csv"] {
            registry.map_extension(ext, TEXT_PLAIN);
        }
        registry
    }

    pub fn register(&mut self, content_type: &str, factory: LoaderFactory) -> &mut Self {
        self.loaders.insert(content_type.to_string(), factory);
        self
    }

    pub fn map_extension(&mut self, extension: &str, content_type: &str) -> &mut Self {
        self.extensions.insert(extension.to_ascii_lowercase(), content_type.to_string());
        self
    }

    pub fn content_type(&self, path: &Path) -> Option<&str> {
        let ext = path.extension().and_then(|s| s.to_str())?.to_ascii_lowercase();
        self.extensions.get(&ext).map(String::as_str)
    }

    pub fn loader_for(&self, path: &Path) -> Result<Arc<dyn Loader>> {
        let content_type = self.content_type(path).unwrap_or("application/octet-stream");
        match self.loaders.get(content_type) {
            Some(factory) => Ok(factory(path)),
            None => Err(EngineError::UnsupportedContentType {
                path: path.to_path_buf(),
                content_type: content_type.to_string(),
            }),
        }
    }
}

/// Counts from one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub indexed: usize,
    pub unsupported: usize,
    pub failed: usize,
}

/// Index every supported file under `root` and postprocess the result.
pub fn build(root: &Path, registry: &LoaderRegistry, cancel: &CancellationToken) -> Result<Corpus> {
    build_with_report(root, registry, cancel).map(|(corpus, _)| corpus)
}

pub fn build_with_report(root: &Path, registry: &LoaderRegistry, cancel: &CancellationToken) -> Result<(Corpus, BuildReport)> {
    if !root.is_dir() {
        return Err(EngineError::NotADirectory(root.to_path_buf()));
    }

    let mut report = BuildReport::default();
    let mut files: Vec<(DocId, PathBuf, Arc<dyn Loader>)> = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                report.failed += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match registry.loader_for(entry.path()) {
            Ok(loader) => files.push((files.len() as DocId, entry.into_path(), loader)),
            Err(e) => {
                tracing::debug!(error = %e, "no loader, skipping");
                report.unsupported += 1;
            }
        }
    }

    let shared = Mutex::new(Corpus::new());
    let failed = AtomicUsize::new(0);
    files.par_iter().try_for_each(|(doc, path, loader)| -> Result<()> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        match loader.tokens(cancel) {
            Ok(tokens) => {
                let title = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                shared.lock().add_document(*doc, title, Arc::clone(loader), &tokens);
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(path = %path.display(), error = %e, "skipping file");
                failed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => Err(e),
        }
    })?;
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let mut corpus = shared.into_inner();
    report.failed += failed.into_inner();
    report.indexed = corpus.num_documents();
    corpus.postprocess();
    tracing::info!(
        root = %root.display(),
        num_docs = report.indexed,
        num_terms = corpus.num_terms(),
        unsupported = report.unsupported,
        failed = report.failed,
        "index build complete"
    );
    Ok((corpus, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        let registry = LoaderRegistry::standard();
        assert_eq!(registry.content_type(Path::new("a/notes.TXT")), Some(TEXT_PLAIN));
        assert_eq!(registry.content_type(Path::new("a/image.png")), None);
        assert!(matches!(
            registry.loader_for(Path::new("image.png")),
            Err(EngineError::UnsupportedContentType { .. })
        ));
    }

    #[test]
    fn missing_root_is_rejected() {
        let err = build(Path::new("/definitely/not/here"), &LoaderRegistry::standard(), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::NotADirectory(_)));
    }
}
