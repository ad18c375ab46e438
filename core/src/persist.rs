use crate::error::{Result, SearchError};
use crate::semantic::ChunkStore;
use crate::{DocId, Document, InvertedIndex};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

pub type PostingsFile = BTreeMap<String, Vec<DocId>>;
pub type DocmapFile = BTreeMap<DocId, Document>;
pub type TermFrequenciesFile = BTreeMap<DocId, BTreeMap<String, u32>>;
pub type DocLengthsFile = BTreeMap<DocId, u32>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn postings(&self) -> PathBuf { self.root.join("postings.bin") }
    pub fn docmap(&self) -> PathBuf { self.root.join("docmap.bin") }
    pub fn term_frequencies(&self) -> PathBuf { self.root.join("term_frequencies.bin") }
    pub fn doc_lengths(&self) -> PathBuf { self.root.join("doc_lengths.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn chunk_embeddings(&self) -> PathBuf { self.root.join("chunk_embeddings.bin") }

    /// The four artifacts a load cannot do without.
    pub fn required(&self) -> [PathBuf; 4] {
        [self.postings(), self.docmap(), self.term_frequencies(), self.doc_lengths()]
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.root.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "index".into());
        name.push(suffix);
        self.root.with_file_name(name)
    }

    /// Fails with `IndexNotFound` naming the first missing artifact.
    pub fn ensure_complete(&self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(SearchError::IndexNotFound { path: self.root.clone() });
        }
        for path in self.required() {
            if !path.is_file() {
                return Err(SearchError::IndexNotFound { path });
            }
        }
        Ok(())
    }
}

pub(crate) fn write_bin<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value)?;
    fs::write(path, bytes)?;
    Ok(())
}

pub(crate) fn read_bin<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let buf = fs::read(path)?;
    Ok(bincode::deserialize(&buf)?)
}

pub fn save_meta(path: &Path, meta: &MetaFile) -> Result<()> {
    let json = serde_json::to_string_pretty(meta)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let buf = fs::read_to_string(paths.meta())?;
    Ok(serde_json::from_str(&buf)?)
}

fn created_at() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

/// Persist the index, plus chunk embeddings when given. All artifacts are
/// written to a staging directory which then replaces `paths.root` as a whole,
/// so no reader sees a mix of builds.
pub fn save_index(paths: &IndexPaths, index: &InvertedIndex, chunks: Option<&ChunkStore>) -> Result<()> {
    let staging = IndexPaths::new(paths.sibling(".staging"));
    if staging.root.exists() {
        fs::remove_dir_all(&staging.root)?;
    }
    create_dir_all(&staging.root)?;

    let (postings, docmap, tfs, lengths) = to_files(index);
    write_bin(&staging.postings(), &postings)?;
    write_bin(&staging.docmap(), &docmap)?;
    write_bin(&staging.term_frequencies(), &tfs)?;
    write_bin(&staging.doc_lengths(), &lengths)?;
    if let Some(chunks) = chunks {
        chunks.save(&staging.chunk_embeddings())?;
    }
    let meta = MetaFile {
        num_docs: index.len() as u32,
        num_terms: index.vocabulary_size() as u32,
        created_at: created_at(),
        version: FORMAT_VERSION,
    };
    save_meta(&staging.meta(), &meta)?;

    swap_dirs(&staging.root, &paths.root, &paths.sibling(".old"))?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, num_terms = meta.num_terms, "saved index");
    Ok(())
}

/// Move `staging` into place at `live`. The previous `live` directory is parked
/// at `old` and restored if the final rename fails.
fn swap_dirs(staging: &Path, live: &Path, old: &Path) -> Result<()> {
    if old.exists() {
        fs::remove_dir_all(old)?;
    }
    let had_live = live.exists();
    if had_live {
        fs::rename(live, old)?;
    }
    if let Err(e) = fs::rename(staging, live) {
        if had_live {
            if let Err(restore) = fs::rename(old, live) {
                tracing::error!(error = %restore, old = %old.display(), "could not restore previous index");
            }
        }
        return Err(e.into());
    }
    if had_live {
        fs::remove_dir_all(old)?;
    }
    Ok(())
}

/// Load a persisted index, verifying that the four tables agree with each other.
pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    paths.ensure_complete()?;
    let postings: PostingsFile = read_bin(&paths.postings())?;
    let docmap: DocmapFile = read_bin(&paths.docmap())?;
    let tfs: TermFrequenciesFile = read_bin(&paths.term_frequencies())?;
    let lengths: DocLengthsFile = read_bin(&paths.doc_lengths())?;
    let index = from_files(postings, docmap, tfs, lengths)?;
    tracing::info!(root = %paths.root.display(), num_docs = index.len(), "loaded index");
    Ok(index)
}

pub fn to_files(index: &InvertedIndex) -> (PostingsFile, DocmapFile, TermFrequenciesFile, DocLengthsFile) {
    let postings = index
        .postings
        .iter()
        .map(|(token, ords)| (token.clone(), ords.iter().map(|&o| index.docs[o as usize].id).collect()))
        .collect();
    let mut docmap = BTreeMap::new();
    let mut tfs = BTreeMap::new();
    let mut lengths = BTreeMap::new();
    for (o, doc) in index.docs.iter().enumerate() {
        docmap.insert(doc.id, doc.clone());
        tfs.insert(doc.id, index.term_frequencies[o].iter().map(|(t, c)| (t.clone(), *c)).collect());
        lengths.insert(doc.id, index.doc_lengths[o]);
    }
    (postings, docmap, tfs, lengths)
}

fn corrupt(msg: String) -> SearchError {
    SearchError::CorruptIndex(msg)
}

pub fn from_files(
    postings: PostingsFile,
    docmap: DocmapFile,
    tfs: TermFrequenciesFile,
    lengths: DocLengthsFile,
) -> Result<InvertedIndex> {
    if docmap.len() != tfs.len() || docmap.len() != lengths.len() {
        return Err(corrupt(format!(
            "table sizes differ: docmap={} term_frequencies={} doc_lengths={}",
            docmap.len(),
            tfs.len(),
            lengths.len()
        )));
    }

    let mut index = InvertedIndex::default();
    let mut pairs = 0usize;
    for (((id, doc), (tf_id, tf)), (len_id, length)) in docmap.into_iter().zip(tfs).zip(lengths) {
        if id != tf_id || id != len_id || doc.id != id {
            return Err(corrupt(format!("document ids disagree near {id}")));
        }
        let total: u64 = tf.values().map(|&c| c as u64).sum();
        if total != length as u64 {
            return Err(corrupt(format!("doc {id}: term counts sum to {total}, length is {length}")));
        }
        if tf.values().any(|&c| c == 0) {
            return Err(corrupt(format!("doc {id}: zero term count stored")));
        }
        pairs += tf.len();
        index.ordinals.insert(id, index.docs.len() as u32);
        index.docs.push(doc);
        index.doc_lengths.push(length);
        index.term_frequencies.push(tf.into_iter().collect::<HashMap<_, _>>());
    }

    let mut posted = 0usize;
    for (token, ids) in postings {
        let mut ords = Vec::with_capacity(ids.len());
        for id in ids {
            let ordinal = *index
                .ordinals
                .get(&id)
                .ok_or_else(|| corrupt(format!("posting for {token:?} names unknown doc {id}")))?;
            if ords.last().is_some_and(|&prev| prev >= ordinal) {
                return Err(corrupt(format!("posting list for {token:?} is not strictly ascending")));
            }
            if !index.term_frequencies[ordinal as usize].contains_key(&token) {
                return Err(corrupt(format!("doc {id} posted under {token:?} without a frequency")));
            }
            ords.push(ordinal);
        }
        posted += ords.len();
        index.postings.insert(token, ords);
    }
    if posted != pairs {
        return Err(corrupt(format!("postings cover {posted} token/doc pairs, frequencies hold {pairs}")));
    }
    Ok(index)
}
