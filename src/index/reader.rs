use crate::index::corpus::SentencePair;
use crate::index::types::*;
use crate::model::{ModelConfig, TranslationModel};
use crate::vocab::{Lexicon, Vocabulary};
use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Reader for a model directory written by [`crate::index::writer::StoreWriter`]
///
/// corpus.bin is memory-mapped and decoded on demand; suffix arrays are
/// rebuilt when the model is constructed.
pub struct StoreReader {
    dir: PathBuf,
    pub meta: StoreMeta,
    corpus: Mmap,
}

impl StoreReader {
    /// Open a model directory and validate the corpus header
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.join("meta.json").exists() {
            anyhow::bail!("No model found at {}. Run 'dtm build' first.", dir.display());
        }

        let meta_file = File::open(dir.join("meta.json")).context("Failed to open meta.json")?;
        let meta: StoreMeta =
            serde_json::from_reader(BufReader::new(meta_file)).context("Invalid meta.json")?;

        let corpus_file = File::open(dir.join("corpus.bin")).context("Failed to open corpus.bin")?;
        let corpus = unsafe { Mmap::map(&corpus_file)? };

        if corpus.len() < CORPUS_HEADER_SIZE {
            anyhow::bail!("Invalid corpus.bin: file too small");
        }
        let magic = u32::from_le_bytes(corpus[0..4].try_into()?);
        if magic != CORPUS_MAGIC {
            anyhow::bail!("Invalid corpus.bin: bad magic number");
        }
        let version = u32::from_le_bytes(corpus[4..8].try_into()?);
        if version != CORPUS_VERSION {
            anyhow::bail!("Unsupported corpus.bin version: {}", version);
        }
        let sentences = u64::from_le_bytes(corpus[8..16].try_into()?);
        if sentences != meta.sentences {
            anyhow::bail!(
                "corpus.bin holds {} sentences but meta.json says {}",
                sentences,
                meta.sentences
            );
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            meta,
            corpus,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read both vocabularies
    pub fn lexicon(&self) -> Result<Lexicon> {
        let file = File::open(self.dir.join("vocab.json")).context("Failed to open vocab.json")?;
        let vocab: VocabFile =
            serde_json::from_reader(BufReader::new(file)).context("Invalid vocab.json")?;
        Ok(Lexicon {
            source: Vocabulary::from_tokens(&vocab.source)?,
            target: Vocabulary::from_tokens(&vocab.target)?,
        })
    }

    /// Decode every sentence pair, validating each one
    pub fn pairs(&self) -> Result<Vec<SentencePair>> {
        let data = &self.corpus[..];
        let mut cursor = Cursor {
            data,
            offset: CORPUS_HEADER_SIZE,
        };
        // Reserve no more than the remaining bytes could hold
        let declared = usize::try_from(self.meta.sentences).unwrap_or(usize::MAX);
        let mut pairs = Vec::with_capacity(declared.min(cursor.remaining() / ENTRY_HEADER_SIZE));

        for n in 0..self.meta.sentences {
            let src_len = cursor.u32()? as usize;
            let tgt_len = cursor.u32()? as usize;
            let link_count = cursor.u32()? as usize;

            let source = cursor.ids(src_len)?;
            let target = cursor.ids(tgt_len)?;
            let mut links = Vec::with_capacity(link_count.min(cursor.remaining() / LINK_SIZE));
            for _ in 0..link_count {
                links.push(Link::new(cursor.u32()?, cursor.u32()?));
            }

            let pair = SentencePair::new(source, target, links)
                .with_context(|| format!("Invalid sentence pair {} in corpus.bin", n))?;
            pairs.push(pair);
        }

        if cursor.offset != data.len() {
            anyhow::bail!(
                "Invalid corpus.bin: {} trailing bytes",
                data.len() - cursor.offset
            );
        }
        Ok(pairs)
    }

    /// Build a model over the stored corpus
    pub fn load_model(&self, config: ModelConfig) -> Result<(TranslationModel, Lexicon)> {
        let started = Instant::now();
        let lexicon = self.lexicon()?;
        let pairs = self.pairs()?;
        let model = TranslationModel::from_pairs(config, pairs)?;
        info!(
            dir = %self.dir.display(),
            sentences = self.meta.sentences,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded model store"
        );
        Ok((model, lexicon))
    }
}

/// Source length, target length and link count of one entry
const ENTRY_HEADER_SIZE: usize = 12;

/// Source and target position of one link
const LINK_SIZE: usize = 8;

/// Little-endian reads with bounds checks
struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl Cursor<'_> {
    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .context("Invalid corpus.bin: truncated entry")?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into()?))
    }

    fn ids(&mut self, len: usize) -> Result<Vec<TokenId>> {
        let bytes = self.take(len.checked_mul(4).context("Invalid corpus.bin: bad length")?)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::corpus::Corpus;
    use crate::index::writer::StoreWriter;
    use std::fs;
    use tempfile::tempdir;

    fn write_sample(dir: &Path) -> Lexicon {
        let lexicon = Lexicon::new();
        let lines = [
            ("das haus", "the house", vec![(0u32, 0u32), (1, 1)]),
            ("ein haus", "a house", vec![(0, 0), (1, 1)]),
        ];
        let pairs = lines.into_iter().map(|(s, t, links)| {
            SentencePair::new(
                lexicon.source.encode(s).unwrap(),
                lexicon.target.encode(t).unwrap(),
                links,
            )
            .unwrap()
        });
        StoreWriter::new(dir)
            .write(&lexicon, &Corpus::from_pairs(pairs))
            .unwrap();
        lexicon
    }

    #[test]
    fn test_round_trip() {
        let temp_dir = tempdir().unwrap();
        let written = write_sample(temp_dir.path());

        let reader = StoreReader::open(temp_dir.path()).unwrap();
        assert_eq!(reader.meta.sentences, 2);
        let pairs = reader.pairs().unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].alignment().len(), 2);

        let lexicon = reader.lexicon().unwrap();
        assert_eq!(lexicon.source.tokens(), written.source.tokens());
        assert_eq!(lexicon.target.id("house"), written.target.id("house"));
    }

    #[test]
    fn test_missing_store() {
        let temp_dir = tempdir().unwrap();
        let err = StoreReader::open(&temp_dir.path().join("nope")).err().unwrap();
        assert!(err.to_string().contains("No model found"));
    }

    #[test]
    fn test_bad_magic() {
        let temp_dir = tempdir().unwrap();
        write_sample(temp_dir.path());
        let path = temp_dir.path().join("corpus.bin");
        let mut bytes = fs::read(&path).unwrap();
        bytes[0] ^= 0xFF;
        fs::write(&path, bytes).unwrap();
        assert!(StoreReader::open(temp_dir.path()).is_err());
    }

    #[test]
    fn test_truncated_corpus() {
        let temp_dir = tempdir().unwrap();
        write_sample(temp_dir.path());
        let path = temp_dir.path().join("corpus.bin");
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
        let reader = StoreReader::open(temp_dir.path()).unwrap();
        assert!(reader.pairs().is_err());
    }

    #[test]
    fn test_huge_link_count_is_rejected() {
        let temp_dir = tempdir().unwrap();
        write_sample(temp_dir.path());
        let path = temp_dir.path().join("corpus.bin");
        let mut bytes = fs::read(&path).unwrap();
        // Link count of the first entry
        let at = CORPUS_HEADER_SIZE + 8;
        bytes[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        fs::write(&path, bytes).unwrap();

        let reader = StoreReader::open(temp_dir.path()).unwrap();
        let err = reader.pairs().unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_huge_sentence_count_is_rejected() {
        let temp_dir = tempdir().unwrap();
        write_sample(temp_dir.path());
        let sentences = u64::MAX >> 4;

        let meta_path = temp_dir.path().join("meta.json");
        let mut meta: StoreMeta = serde_json::from_slice(&fs::read(&meta_path).unwrap()).unwrap();
        meta.sentences = sentences;
        fs::write(&meta_path, serde_json::to_vec(&meta).unwrap()).unwrap();

        let corpus_path = temp_dir.path().join("corpus.bin");
        let mut bytes = fs::read(&corpus_path).unwrap();
        bytes[8..16].copy_from_slice(&sentences.to_le_bytes());
        fs::write(&corpus_path, bytes).unwrap();

        let reader = StoreReader::open(temp_dir.path()).unwrap();
        assert!(reader.pairs().is_err());
    }
}
