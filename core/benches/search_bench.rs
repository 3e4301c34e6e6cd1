use criterion::{criterion_group, criterion_main, Criterion};
use sift_core::tokenizer::tokenize;
use sift_core::{search, CancellationToken, Corpus, SearchConfig, TextLoader, Token};
use std::sync::Arc;

const WORDS: &[&str] = &[
    "index", "query", "ranking", "vector", "cosine", "term", "posting", "snippet", "corpus", "operator",
    "proximity", "fuzzy", "distance", "token", "document", "weight", "signal", "filter", "alias", "prefix",
];

fn synthetic_corpus(docs: usize) -> Corpus {
    let mut corpus = Corpus::new();
    for d in 0..docs {
        let text: Vec<&str> = (0..200).map(|i| WORDS[(d * 7 + i * 13 + i / 3) % WORDS.len()]).collect();
        let text = text.join(" ");
        let tokens: Vec<Token> = tokenize(&text);
        corpus.add_document(d as u32, format!("doc{d}"), Arc::new(TextLoader::new(text)), &tokens);
    }
    corpus.postprocess();
    corpus
}

fn bench_tokenize(c: &mut Criterion) {
    let text = WORDS.join(" ").repeat(50);
    c.bench_function("tokenize_words", |b| b.iter(|| tokenize(&text)));
}

fn bench_search(c: &mut Criterion) {
    let corpus = synthetic_corpus(500);
    let cfg = SearchConfig::default();
    let cancel = CancellationToken::new();
    c.bench_function("search_exact", |b| b.iter(|| search(&corpus, "cosine ranking", &cfg, &cancel)));
    c.bench_function("search_fuzzy", |b| b.iter(|| search(&corpus, "cosne rnking ^vector", &cfg, &cancel)));
}

criterion_group!(benches, bench_tokenize, bench_search);
criterion_main!(benches);
