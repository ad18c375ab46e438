use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;

use crate::error::{Result, SearchError};

lazy_static! {
    static ref PUNCT: Regex = Regex::new(r"[[:punct:]]").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could",
            "did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself",
            "me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","with","would",
            "you","your","yours","yourself","yourselves",
            // contractions once apostrophes are stripped
            "arent","cant","couldnt","didnt","doesnt","dont","hadnt","hasnt","havent","isnt","mustnt",
            "shouldnt","thats","theyre","theyve","wasnt","werent","whats","wont","wouldnt","youre","youve",
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Lowercase a whitespace-delimited piece and strip ASCII punctuation from it.
pub fn clean(piece: &str) -> String {
    PUNCT.replace_all(&piece.to_lowercase(), "").into_owned()
}

/// Tokenize text: NFKC normalization, whitespace split, lowercase, punctuation
/// stripping, stopword removal and Snowball English stemming.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>();
    let mut tokens = Vec::new();
    for piece in normalized.split_whitespace() {
        let cleaned = clean(piece);
        if cleaned.is_empty() || is_stopword(&cleaned) { continue; }
        let stem = STEMMER.stem(&cleaned);
        if stem.is_empty() { continue; }
        tokens.push(stem.into_owned());
    }
    tokens
}

/// Normalize a term argument that must yield exactly one token.
pub fn single_term(term: &str) -> Result<String> {
    let mut tokens = tokenize(term);
    if tokens.len() != 1 {
        return Err(SearchError::InvalidTerm { term: term.to_string(), tokens: tokens.len() });
    }
    Ok(tokens.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Running, runner's run!");
        assert!(t.iter().any(|w| w == "run"));
    }

    #[test]
    fn strips_punctuation_inside_pieces() {
        assert_eq!(tokenize("bear's"), vec!["bear"]);
        assert_eq!(tokenize("(bears)"), vec!["bear"]);
    }

    #[test]
    fn empty_and_stopword_only_inputs() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t\n").is_empty());
        assert!(tokenize("The and of -- !!").is_empty());
    }

    #[test]
    fn single_term_requires_one_token() {
        assert_eq!(single_term("Bears").unwrap(), "bear");
        match single_term("grizzly bears") {
            Err(SearchError::InvalidTerm { tokens, .. }) => assert_eq!(tokens, 2),
            other => panic!("unexpected {other:?}"),
        }
        match single_term("the") {
            Err(SearchError::InvalidTerm { tokens, .. }) => assert_eq!(tokens, 0),
            other => panic!("unexpected {other:?}"),
        }
    }
}
