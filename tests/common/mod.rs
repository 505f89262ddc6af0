#![allow(dead_code)]

use dtm::index::SentencePair;
use dtm::vocab::Lexicon;

/// Sentence pair from raw ids
pub fn pair(src: &[u32], tgt: &[u32], links: &[(u32, u32)]) -> SentencePair {
    SentencePair::new(src.to_vec(), tgt.to_vec(), links.iter().copied()).unwrap()
}

/// Sentence pair from text, growing `lexicon`
pub fn text_pair(lexicon: &Lexicon, src: &str, tgt: &str, links: &[(u32, u32)]) -> SentencePair {
    SentencePair::new(
        lexicon.source.encode(src).unwrap(),
        lexicon.target.encode(tgt).unwrap(),
        links.iter().copied(),
    )
    .unwrap()
}

/// A small German-English bitext
pub const BITEXT: &[(&str, &str, &str)] = &[
    ("das haus ist klein", "the house is small", "0-0 1-1 2-2 3-3"),
    ("das haus ist gross", "the house is big", "0-0 1-1 2-2 3-3"),
    ("ein kleines haus", "a small house", "0-0 1-1 2-2"),
    ("das buch ist klein", "the book is small", "0-0 1-1 2-2 3-3"),
    ("ich sehe das haus", "i see the house", "0-0 1-1 2-2 3-3"),
    ("das haus", "the building", "0-0 1-1"),
];

/// Write `BITEXT` as three files under `dir`
pub fn write_bitext(dir: &std::path::Path) -> [std::path::PathBuf; 3] {
    let paths = [dir.join("train.de"), dir.join("train.en"), dir.join("train.align")];
    let columns: [Vec<&str>; 3] = [
        BITEXT.iter().map(|l| l.0).collect(),
        BITEXT.iter().map(|l| l.1).collect(),
        BITEXT.iter().map(|l| l.2).collect(),
    ];
    for (path, lines) in paths.iter().zip(&columns) {
        std::fs::write(path, lines.join("\n") + "\n").unwrap();
    }
    paths
}
