use anyhow::{Context, Result};
use hybrid_core::Document;
use serde::Deserialize;
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// `{"movies": [...]}` wrapper used by the movie dataset.
#[derive(Debug, Deserialize)]
struct MoviesFile {
    movies: Vec<Document>,
}

/// Collect `.json`/`.jsonl` files under `input` (or `input` itself), sorted so
/// builds see documents in the same order every run.
pub fn corpus_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files.sort();
    files
}

pub fn load_corpus(input: &Path) -> Result<Vec<Document>> {
    let files = corpus_files(input);
    if files.is_empty() {
        anyhow::bail!("no .json or .jsonl corpus files found at {}", input.display());
    }
    let mut docs = Vec::new();
    for file in files {
        let before = docs.len();
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut docs)?;
        } else {
            read_json(&file, &mut docs)?;
        }
        tracing::debug!(file = %file.display(), docs = docs.len() - before, "read corpus file");
    }
    Ok(docs)
}

fn read_jsonl(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: Document = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), n + 1))?;
        docs.push(doc);
    }
    Ok(())
}

fn read_json(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)
        .with_context(|| format!("parsing {}", file.display()))?;
    if json.get("movies").is_some() {
        let wrapper: MoviesFile = serde_json::from_value(json)?;
        docs.extend(wrapper.movies);
        return Ok(());
    }
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                docs.push(serde_json::from_value(v)?);
            }
        }
        serde_json::Value::Object(_) => {
            docs.push(serde_json::from_value(json)?);
        }
        _ => tracing::warn!(file = %file.display(), "ignoring corpus file that is not an object or array"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reads_every_supported_shape() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"{"movies":[{"id":1,"title":"The Bear Attacks","description":"Grizzly."}]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("b.jsonl"),
            "{\"id\":2,\"title\":\"A Bear in London\",\"description\":\"Marmalade.\"}\n\n",
        )
        .unwrap();
        fs::write(dir.path().join("c.json"), r#"[{"id":3,"title":"Space Adventure","description":"Stars."}]"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let docs = load_corpus(dir.path()).unwrap();
        let ids: Vec<u32> = docs.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn empty_input_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_corpus(dir.path()).is_err());
    }
}
