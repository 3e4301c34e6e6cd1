use sift_core::scan::build_with_report;
use sift_core::tokenizer::tokenize;
use sift_core::{build, search, CancellationToken, EngineError, Loader, LoaderRegistry, SearchConfig, Token};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn write(dir: &Path, name: &str, body: &str) {
    if let Some(parent) = dir.join(name).parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(dir.join(name), body).unwrap();
}

#[test]
fn builds_and_ranks_directory() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", "cat sat");
    write(dir.path(), "b.txt", "cqt sat");
    write(dir.path(), "c.txt", "dog ran");

    let corpus = build(dir.path(), &LoaderRegistry::standard(), &CancellationToken::new()).unwrap();
    assert_eq!(corpus.num_documents(), 3);

    let result = search(&corpus, "cat", &SearchConfig::default(), &CancellationToken::new()).unwrap();
    assert_eq!(result.items[0].title, "a.txt");
    assert_eq!(result.items[0].score, 1.0);
    assert!(result.items.iter().any(|i| i.title == "b.txt"));
    assert!(result.items.iter().all(|i| i.title != "c.txt"));
    assert_eq!(result.suggestion.as_deref(), Some("cqt"));
    assert!(result.items[0].snippet.contains("cat"));
}

#[test]
fn skips_unsupported_and_nested_files() {
    let dir = tempdir().unwrap();
    write(dir.path(), "notes.md", "rust ownership borrowing");
    write(dir.path(), "nested/deeper/guide.txt", "rust lifetimes explained");
    write(dir.path(), "image.png", "not really an image");
    write(dir.path(), "other.txt", "python generators");

    let (corpus, report) = build_with_report(dir.path(), &LoaderRegistry::standard(), &CancellationToken::new()).unwrap();
    assert_eq!(report.indexed, 3);
    assert_eq!(report.unsupported, 1);

    let result = search(&corpus, "lifetimes", &SearchConfig::default(), &CancellationToken::new()).unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].title, "guide.txt");
}

#[test]
fn many_files_index_concurrently() {
    let dir = tempdir().unwrap();
    for i in 0..64 {
        write(dir.path(), &format!("doc{i:02}.txt"), &format!("shared marker{i} filler{}", i % 4));
    }
    let corpus = build(dir.path(), &LoaderRegistry::standard(), &CancellationToken::new()).unwrap();
    assert_eq!(corpus.num_documents(), 64);
    // present everywhere, pruned as carrying no signal
    assert!(corpus.entry("shared").is_none());
    let marker = corpus.entry("marker7").unwrap();
    assert_eq!(marker.occurrences, 1);
    assert_eq!(marker.documents_containing(), 1);

    // neighbors like marker17 are one edit away, so require the exact term
    let result = search(&corpus, "^marker7", &SearchConfig::default(), &CancellationToken::new()).unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].title, "doc07.txt");
}

#[test]
fn cancelled_build_publishes_nothing() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", "alpha");
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = build(dir.path(), &LoaderRegistry::standard(), &cancel).unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
}

/// Reads fine, then cancels the build it is part of.
struct CancellingLoader;

impl Loader for CancellingLoader {
    fn tokens(&self, cancel: &CancellationToken) -> sift_core::Result<Vec<Token>> {
        cancel.cancel();
        Ok(tokenize("stop here"))
    }

    fn snippet(&self, _offset: u64, _term_len: usize, _fallback_width: usize) -> sift_core::Result<String> {
        Ok(String::new())
    }
}

fn cancelling_loader(_: &Path) -> Arc<dyn Loader> {
    Arc::new(CancellingLoader)
}

#[test]
fn build_cancelled_midway_publishes_nothing() {
    let dir = tempdir().unwrap();
    for i in 0..16 {
        write(dir.path(), &format!("doc{i:02}.txt"), "plain words");
    }
    write(dir.path(), "halt.stop", "ignored");
    let mut registry = LoaderRegistry::standard();
    registry.register("text/x-stop", cancelling_loader).map_extension("stop", "text/x-stop");

    let cancel = CancellationToken::new();
    let err = build(dir.path(), &registry, &cancel).unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    assert!(cancel.is_cancelled());
}

#[test]
fn single_document_directory_yields_nothing() {
    let dir = tempdir().unwrap();
    write(dir.path(), "only.txt", "alpha beta gamma");
    let corpus = build(dir.path(), &LoaderRegistry::standard(), &CancellationToken::new()).unwrap();
    assert_eq!(corpus.num_documents(), 1);
    assert_eq!(corpus.num_terms(), 0);

    let result = search(&corpus, "alpha", &SearchConfig::default(), &CancellationToken::new()).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.suggestion, None);
}

#[test]
fn operators_end_to_end() {
    let dir = tempdir().unwrap();
    write(dir.path(), "1.txt", "fresh apple pie recipe");
    write(dir.path(), "2.txt", "apple orchard tour");
    write(dir.path(), "3.txt", "cherry pie recipe");
    write(dir.path(), "4.txt", "weather report");
    let corpus = build(dir.path(), &LoaderRegistry::standard(), &CancellationToken::new()).unwrap();
    let cfg = SearchConfig::default();
    let cancel = CancellationToken::new();

    let must = search(&corpus, "pie ^apple", &cfg, &cancel).unwrap();
    let titles: Vec<&str> = must.items.iter().map(|i| i.title.as_str()).collect();
    assert!(titles.contains(&"1.txt"));
    assert!(!titles.contains(&"3.txt"));

    let not = search(&corpus, "pie !apple", &cfg, &cancel).unwrap();
    let titles: Vec<&str> = not.items.iter().map(|i| i.title.as_str()).collect();
    assert!(titles.contains(&"3.txt"));
    assert!(!titles.contains(&"1.txt"));
}
