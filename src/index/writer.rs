use crate::index::corpus::{Corpus, SentencePair};
use crate::index::types::*;
use crate::vocab::Lexicon;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Writes a corpus and its vocabularies to a model directory
///
/// Creates:
/// - meta.json: counts and format version
/// - vocab.json: source and target tokens in id order
/// - corpus.bin: sentence pairs and alignments
pub struct StoreWriter {
    dir: PathBuf,
}

impl StoreWriter {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the whole store, replacing any previous one in the directory
    pub fn write(&self, lexicon: &Lexicon, corpus: &Corpus) -> Result<StoreMeta> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let mut meta = self.write_corpus(corpus)?;
        self.write_vocab(lexicon)?;

        meta.source_vocab = lexicon.source.len();
        meta.target_vocab = lexicon.target.len();
        self.write_meta(&meta)?;

        info!(
            dir = %self.dir.display(),
            sentences = meta.sentences,
            source_vocab = meta.source_vocab,
            target_vocab = meta.target_vocab,
            "wrote model store"
        );
        Ok(meta)
    }

    /// Write corpus.bin
    fn write_corpus(&self, corpus: &Corpus) -> Result<StoreMeta> {
        let path = self.dir.join("corpus.bin");
        let mut file = BufWriter::with_capacity(
            65536,
            File::create(&path).context("Failed to create corpus.bin")?,
        );

        // Header
        file.write_all(&CORPUS_MAGIC.to_le_bytes())?;
        file.write_all(&CORPUS_VERSION.to_le_bytes())?;
        file.write_all(&(corpus.num_sentences() as u64).to_le_bytes())?;
        file.write_all(&0u32.to_le_bytes())?; // flags
        file.write_all(&0u32.to_le_bytes())?; // reserved

        let mut meta = StoreMeta {
            version: CORPUS_VERSION,
            sentences: corpus.num_sentences() as u64,
            source_tokens: 0,
            target_tokens: 0,
            links: 0,
            source_vocab: 0,
            target_vocab: 0,
            created_at: now(),
        };

        let mut buffer = Vec::with_capacity(8 * 1024);
        for pair in corpus.iter() {
            encode_pair(pair, &mut buffer);
            meta.source_tokens += pair.source_len() as u64;
            meta.target_tokens += pair.target_len() as u64;
            meta.links += pair.alignment().len() as u64;
            if buffer.len() >= 8 * 1024 {
                file.write_all(&buffer)?;
                buffer.clear();
            }
        }
        if !buffer.is_empty() {
            file.write_all(&buffer)?;
        }

        file.flush()?;
        Ok(meta)
    }

    /// Write vocab.json
    fn write_vocab(&self, lexicon: &Lexicon) -> Result<()> {
        let vocab = VocabFile {
            source: lexicon.source.tokens(),
            target: lexicon.target.tokens(),
        };
        let file = BufWriter::new(
            File::create(self.dir.join("vocab.json")).context("Failed to create vocab.json")?,
        );
        serde_json::to_writer(file, &vocab)?;
        Ok(())
    }

    /// Write meta.json
    fn write_meta(&self, meta: &StoreMeta) -> Result<()> {
        let file = File::create(self.dir.join("meta.json")).context("Failed to create meta.json")?;
        serde_json::to_writer_pretty(file, meta)?;
        Ok(())
    }
}

/// Entry layout: source length, target length, link count (u32 each),
/// then source ids, target ids and (source, target) link pairs
fn encode_pair(pair: &SentencePair, out: &mut Vec<u8>) {
    out.extend_from_slice(&(pair.source_len() as u32).to_le_bytes());
    out.extend_from_slice(&(pair.target_len() as u32).to_le_bytes());
    out.extend_from_slice(&(pair.alignment().len() as u32).to_le_bytes());
    for &id in pair.source() {
        out.extend_from_slice(&id.to_le_bytes());
    }
    for &id in pair.target() {
        out.extend_from_slice(&id.to_le_bytes());
    }
    for link in pair.alignment().links() {
        out.extend_from_slice(&link.source.to_le_bytes());
        out.extend_from_slice(&link.target.to_le_bytes());
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_store() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path().join("model");

        let lexicon = Lexicon::new();
        let source = lexicon.source.encode("das haus").unwrap();
        let target = lexicon.target.encode("the house").unwrap();
        let corpus = Corpus::from_pairs([
            SentencePair::new(source, target, [(0u32, 0u32), (1, 1)]).unwrap()
        ]);

        let meta = StoreWriter::new(&dir).write(&lexicon, &corpus).unwrap();
        assert_eq!(meta.sentences, 1);
        assert_eq!(meta.source_tokens, 2);
        assert_eq!(meta.links, 2);
        assert_eq!(meta.target_vocab, 2);

        assert!(dir.join("meta.json").exists());
        assert!(dir.join("vocab.json").exists());

        // Header + one entry of 3 + 2 + 2 + 2 * 2 u32s
        let bytes = fs::read(dir.join("corpus.bin")).unwrap();
        assert_eq!(bytes.len(), CORPUS_HEADER_SIZE + 11 * 4);
        let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(magic, CORPUS_MAGIC);
    }
}
