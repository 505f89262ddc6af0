#![no_main]

use dtm::index::SentencePair;
use dtm::index::build::parse_alignment;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary alignment lines must parse or be rejected, never panic
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    if let Some(links) = parse_alignment(line) {
        let source: Vec<u32> = (0..8).collect();
        let target: Vec<u32> = (0..8).collect();
        if let Ok(pair) = SentencePair::new(source, target, links) {
            for i in 0..8 {
                for j in 0..8 {
                    let _ = pair.alignment().is_linked(i, j);
                }
            }
        }
    }
});
