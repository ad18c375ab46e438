use hybrid_core::tokenizer::tokenize;

#[test]
fn it_normalizes_and_stems() {
    let words = tokenize("Running Runners RUN! The bear's attacks.");
    assert!(words.contains(&"run".to_string()));
    assert!(words.contains(&"bear".to_string()));
    assert!(words.contains(&"attack".to_string()));
}

#[test]
fn it_filters_stopwords() {
    let words = tokenize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert_eq!(words.len(), 5);
}

#[test]
fn it_folds_compatibility_forms() {
    // fullwidth letters fold to ASCII under NFKC
    assert_eq!(tokenize("ｂｅａｒ"), vec!["bear"]);
}

#[test]
fn it_is_deterministic() {
    let text = "A Bear in London, chasing marmalade sandwiches!";
    assert_eq!(tokenize(text), tokenize(text));
}
