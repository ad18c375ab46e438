use hybrid_core::persist::{load_index, save_index, to_files, IndexPaths};
use hybrid_core::{Document, IndexBuilder, InvertedIndex, SearchError};
use tempfile::tempdir;

fn movies() -> Vec<Document> {
    let raw = [
        (1, "The Bear Attacks", "A grizzly bear terrorizes campers in the mountains."),
        (2, "A Bear in London", "A polite bear from Peru finds a family in London."),
        (3, "Space Adventure", "Astronauts drift between stars, chasing a signal."),
        (4, "Bears of the North", "Polar bears hunt seals while the ice melts around them."),
        (5, "Quiet Harbor", "Fishing boats, fog, and a lighthouse keeper's secret."),
    ];
    raw.iter()
        .map(|(id, title, description)| Document { id: *id, title: title.to_string(), description: description.to_string() })
        .collect()
}

fn build() -> InvertedIndex {
    IndexBuilder::from_documents(movies()).unwrap()
}

#[test]
fn term_frequencies_sum_to_document_length() {
    let idx = build();
    let (_, _, tfs, lengths) = to_files(&idx);
    for doc in idx.documents_iter() {
        let total: u32 = tfs[&doc.id].values().sum();
        assert_eq!(total, lengths[&doc.id], "doc {}", doc.id);
        assert_eq!(total, idx.document_length(doc.id).unwrap());
    }
}

#[test]
fn idf_is_never_negative() {
    let idx = build();
    for term in ["bear", "london", "astronaut", "missing", "polar"] {
        let idf = idx.inverse_document_frequency(term).unwrap();
        assert!(idf >= 0.0, "{term}: {idf}");
        assert!(idx.document_frequency(term).unwrap() <= idx.len());
    }
}

#[test]
fn build_is_idempotent() {
    assert_eq!(build(), build());
}

#[test]
fn persisted_index_round_trips() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path().join("index"));
    let idx = build();
    save_index(&paths, &idx, None).unwrap();
    let loaded = load_index(&paths).unwrap();
    assert_eq!(loaded, idx);
    assert_eq!(loaded.documents("bear").unwrap(), vec![1, 2, 4]);
    assert_eq!(loaded.bm25_search("polar bear", 3), idx.bm25_search("polar bear", 3));
}

#[test]
fn missing_index_is_reported() {
    let dir = tempdir().unwrap();
    let err = load_index(&IndexPaths::new(dir.path().join("nowhere"))).unwrap_err();
    assert!(matches!(err, SearchError::IndexNotFound { .. }));
}

#[test]
fn bear_query_end_to_end() {
    let idx = IndexBuilder::from_documents(vec![
        Document { id: 1, title: "The Bear Attacks".into(), description: String::new() },
        Document { id: 2, title: "A Bear in London".into(), description: String::new() },
        Document { id: 3, title: "Space Adventure".into(), description: String::new() },
    ])
    .unwrap();
    let ids: Vec<u32> = idx.bm25_search("bear", 5).into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn results_are_sorted_descending() {
    let idx = build();
    let hits = idx.bm25_search("bear polar london", 10);
    assert!(!hits.is_empty());
    assert!(hits.windows(2).all(|w| w[0].1 >= w[1].1));
}
