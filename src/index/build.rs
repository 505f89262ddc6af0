//! Bitext loading and store building
//!
//! Reads three line-aligned files: whitespace-tokenized source sentences,
//! target sentences and Pharaoh alignments (`i-j` pairs, source position
//! first). Malformed lines are skipped with a warning instead of failing
//! the whole load.

use crate::index::corpus::{Corpus, SentencePair};
use crate::index::types::{Link, StoreMeta};
use crate::index::writer::StoreWriter;
use crate::utils::progress::LineProgress;
use crate::vocab::Lexicon;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Outcome of reading a bitext
#[derive(Debug, Default)]
pub struct LoadReport {
    pub pairs: Vec<SentencePair>,
    /// Lines read from each file
    pub lines: usize,
    /// Lines skipped as malformed
    pub discarded: usize,
}

/// Parse one Pharaoh alignment line such as `0-0 1-2 2-1`
pub fn parse_alignment(line: &str) -> Option<Vec<Link>> {
    line.split_whitespace()
        .map(|link| {
            let (s, t) = link.split_once('-')?;
            Some(Link::new(s.parse().ok()?, t.parse().ok()?))
        })
        .collect()
}

/// Why a line was skipped
fn check_line(source: &[&str], target: &[&str], links: Option<&[Link]>) -> Option<&'static str> {
    if source.is_empty() || target.is_empty() {
        return Some("empty sentence");
    }
    let Some(links) = links else {
        return Some("unparsable alignment");
    };
    if links
        .iter()
        .any(|l| l.source as usize >= source.len() || l.target as usize >= target.len())
    {
        return Some("alignment link out of range");
    }
    None
}

fn open_lines(path: &Path) -> Result<Lines<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::with_capacity(65536, file).lines())
}

/// Read a bitext into sentence pairs, growing `lexicon` with every kept line
///
/// Fails if the three files do not have the same number of lines.
pub fn load_bitext(
    source: &Path,
    target: &Path,
    align: &Path,
    lexicon: &Lexicon,
    show_progress: bool,
) -> Result<LoadReport> {
    let started = Instant::now();
    let mut src_lines = open_lines(source)?;
    let mut tgt_lines = open_lines(target)?;
    let mut align_lines = open_lines(align)?;

    let progress = LineProgress::new(show_progress, "lines");

    let mut report = LoadReport::default();
    loop {
        let (src, tgt, aln) = match (src_lines.next(), tgt_lines.next(), align_lines.next()) {
            (Some(s), Some(t), Some(a)) => (s?, t?, a?),
            (None, None, None) => break,
            _ => anyhow::bail!(
                "Bitext files differ in length after line {}",
                report.lines
            ),
        };
        report.lines += 1;
        progress.inc();

        let src_tokens: Vec<&str> = src.split_whitespace().collect();
        let tgt_tokens: Vec<&str> = tgt.split_whitespace().collect();
        let links = parse_alignment(&aln);

        if let Some(reason) = check_line(&src_tokens, &tgt_tokens, links.as_deref()) {
            warn!(line = report.lines, reason, "discarding sentence pair");
            report.discarded += 1;
            continue;
        }

        let source_ids = src_tokens
            .iter()
            .map(|t| lexicon.source.get_or_insert(t))
            .collect::<crate::error::Result<Vec<_>>>()?;
        let target_ids = tgt_tokens
            .iter()
            .map(|t| lexicon.target.get_or_insert(t))
            .collect::<crate::error::Result<Vec<_>>>()?;
        let pair = SentencePair::new(source_ids, target_ids, links.unwrap_or_default())
            .with_context(|| format!("line {}", report.lines))?;
        report.pairs.push(pair);
    }

    progress.finish(format!("({} discarded)", report.discarded));
    info!(
        lines = report.lines,
        kept = report.pairs.len(),
        discarded = report.discarded,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "loaded bitext"
    );
    Ok(report)
}

/// Load a bitext and write it as a model store under `out`
pub fn build_store(
    source: &Path,
    target: &Path,
    align: &Path,
    out: &Path,
    show_progress: bool,
) -> Result<StoreMeta> {
    let lexicon = Lexicon::new();
    let report = load_bitext(source, target, align, &lexicon, show_progress)?;
    let corpus = Corpus::from_pairs(report.pairs);
    StoreWriter::new(out).write(&lexicon, &corpus)
}
