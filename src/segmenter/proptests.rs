//! Property-based tests for sentence segmentation
//!
//! Whatever way a reply is split into fragments, the units plus the final
//! flush must reproduce it exactly and every unit must end on punctuation.

use super::*;
use proptest::prelude::*;

/// Text drawn from an alphabet heavy in terminators and whitespace
fn arb_reply() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .!?,\n'é…]{0,120}"
}

/// Split `text` at the given char positions (sorted, deduplicated)
fn split_at_chars(text: &str, cuts: &[usize]) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (chars.len() + 1)).collect();
    points.sort_unstable();
    points.dedup();

    let mut pieces = Vec::new();
    let mut start = 0;
    for point in points {
        pieces.push(chars[start..point].iter().collect());
        start = point;
    }
    pieces.push(chars[start..].iter().collect());
    pieces
}

fn run(pieces: &[String]) -> (Vec<SentenceUnit>, Option<SentenceUnit>) {
    let mut seg = SentenceSegmenter::new();
    let mut units = Vec::new();
    for piece in pieces {
        units.extend(seg.feed(piece));
    }
    let last = seg.finish();
    (units, last)
}

proptest! {
    #[test]
    fn prop_units_reconstruct_input(
        text in arb_reply(),
        cuts in proptest::collection::vec(any::<usize>(), 0..12),
    ) {
        let pieces = split_at_chars(&text, &cuts);
        let (units, last) = run(&pieces);

        let mut rebuilt: String = units.iter().map(SentenceUnit::as_str).collect();
        if let Some(unit) = last {
            rebuilt.push_str(&unit.text);
        }
        // A whitespace-only tail is the one thing the flush drops
        prop_assert!(text.starts_with(&rebuilt), "{:?} is not a prefix of {:?}", rebuilt, text);
        prop_assert!(text.get(rebuilt.len()..).is_some_and(|rest| rest.trim().is_empty()));
    }

    #[test]
    fn prop_units_end_with_terminator(
        text in arb_reply(),
        cuts in proptest::collection::vec(any::<usize>(), 0..12),
    ) {
        let pieces = split_at_chars(&text, &cuts);
        let (units, _) = run(&pieces);
        for unit in &units {
            let last = unit.text.chars().last();
            prop_assert!(
                matches!(last, Some('.' | '!' | '?')),
                "unit {:?} does not end with a terminator",
                unit.text
            );
            prop_assert!(unit.text.chars().count() >= 2);
        }
    }

    #[test]
    fn prop_whole_sentences_never_depend_on_split(
        sentences in proptest::collection::vec("[a-z]{1,10}[.!?]", 1..6),
        cuts in proptest::collection::vec(any::<usize>(), 0..12),
    ) {
        // Space-separated sentences have unambiguous boundaries, so the
        // units must be identical no matter how the text is fragmented.
        let text = sentences.join(" ");
        let whole = run(&[text.clone()]).0;
        let split = run(&split_at_chars(&text, &cuts)).0;
        prop_assert_eq!(whole.len(), sentences.len());
        prop_assert_eq!(whole, split);
    }

    #[test]
    fn prop_whitespace_only_input_yields_nothing(
        text in "[ \t\n]{0,20}",
        cuts in proptest::collection::vec(any::<usize>(), 0..6),
    ) {
        let (units, last) = run(&split_at_chars(&text, &cuts));
        prop_assert!(units.is_empty());
        prop_assert!(last.is_none());
    }
}
