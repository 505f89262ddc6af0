#![no_main]

use arbitrary::Arbitrary;
use dtm::index::suffix_array::SuffixArrayConfig;
use dtm::index::{Corpus, DeltaIndex, SentencePair};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    sentences: Vec<Vec<u8>>,
    appended: Vec<Vec<u8>>,
    query: Vec<u8>,
}

fn to_pair(tokens: &[u8]) -> Option<SentencePair> {
    if tokens.is_empty() {
        return None;
    }
    // Small alphabet so queries actually match
    let source: Vec<u32> = tokens.iter().map(|&b| (b % 4) as u32).collect();
    SentencePair::new(source, vec![0], [(0u32, 0u32)]).ok()
}

fn brute_force(corpus: &Corpus, query: &[u32]) -> usize {
    corpus
        .iter()
        .map(|pair| pair.source().windows(query.len()).filter(|w| *w == query).count())
        .sum()
}

fuzz_target!(|input: Input| {
    let mut corpus = Corpus::from_pairs(input.sentences.iter().filter_map(|s| to_pair(s)));
    for tokens in &input.appended {
        if let Some(pair) = to_pair(tokens) {
            corpus.push(pair);
        }
    }
    let Ok(index) = DeltaIndex::build(&corpus, SuffixArrayConfig::default()) else {
        return;
    };

    let query: Vec<u32> = input.query.iter().take(6).map(|&b| (b % 4) as u32).collect();
    if query.is_empty() {
        assert_eq!(index.count(&query), 0);
        return;
    }
    assert_eq!(index.count(&query), brute_force(&corpus, &query));

    for position in index.merge(&query).iter() {
        let (sentence, offset) = corpus.resolve(position).expect("occurrence resolves");
        let pair = corpus.sentence(sentence).expect("sentence exists");
        assert_eq!(&pair.source()[offset..offset + query.len()], &query[..]);
    }
});
