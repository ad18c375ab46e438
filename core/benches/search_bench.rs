use criterion::{criterion_group, criterion_main, Criterion};
use hybrid_core::tokenizer::tokenize;
use hybrid_core::{Document, IndexBuilder};

const TEXT: &str = "A grizzly bear wanders out of the forest and into a quiet mountain town, \
where the locals argue over whether to trap it, feed it, or simply leave it alone.";

fn corpus(n: u32) -> Vec<Document> {
    (0..n)
        .map(|i| Document { id: i, title: format!("Movie {i}"), description: format!("{TEXT} Sequel number {}.", i % 17) })
        .collect()
}

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize_description", |b| b.iter(|| tokenize(TEXT)));
}

fn bench_bm25(c: &mut Criterion) {
    let index = IndexBuilder::from_documents(corpus(2_000)).expect("unique ids");
    c.bench_function("bm25_search_2k_docs", |b| b.iter(|| index.bm25_search("grizzly bear town sequel", 10)));
}

criterion_group!(benches, bench_tokenize, bench_bm25);
criterion_main!(benches);
