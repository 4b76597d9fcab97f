//! Property-based tests for the streaming wire layer
//!
//! The provider's chunking is arbitrary, so decoding must not depend on
//! where the network happened to split the bytes.

use super::openai::fragment_stream;
use super::sse::SseDecoder;
use futures::StreamExt;
use proptest::prelude::*;

/// Payloads that avoid newlines so each is exactly one `data:` line
fn arb_payload() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 {}\":,.!?é]{0,40}"
}

fn encode(payloads: &[String]) -> Vec<u8> {
    payloads
        .iter()
        .map(|p| format!("data: {p}\n\n"))
        .collect::<String>()
        .into_bytes()
}

fn split_bytes(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
    points.sort_unstable();
    points.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for point in points {
        chunks.push(bytes[start..point].to_vec());
        start = point;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

fn chunk_json(content: &str) -> String {
    serde_json::json!({
        "choices": [{ "index": 0, "delta": { "content": content }, "finish_reason": null }]
    })
    .to_string()
}

proptest! {
    #[test]
    fn prop_sse_decoding_ignores_chunking(
        payloads in proptest::collection::vec(arb_payload(), 0..8),
        cuts in proptest::collection::vec(any::<usize>(), 0..16),
    ) {
        let bytes = encode(&payloads);
        let mut decoder = SseDecoder::new();
        let mut decoded = Vec::new();
        for chunk in split_bytes(&bytes, &cuts) {
            decoded.extend(decoder.push(&chunk).into_iter().map(|e| e.data));
        }
        prop_assert!(decoder.finish().is_none());
        prop_assert_eq!(decoded, payloads);
    }

    #[test]
    fn prop_fragments_survive_any_chunking(
        fragments in proptest::collection::vec("[a-zA-Z .!?]{1,12}", 1..8),
        cuts in proptest::collection::vec(any::<usize>(), 0..16),
    ) {
        let mut payloads: Vec<String> = fragments.iter().map(|f| chunk_json(f)).collect();
        payloads.push("[DONE]".to_string());
        let chunks = split_bytes(&encode(&payloads), &cuts);

        let body = futures::stream::iter(
            chunks.into_iter().map(Ok::<_, std::io::Error>),
        );
        let collected: Vec<_> = futures::executor::block_on(fragment_stream(body).collect());

        let texts: Vec<String> = collected.into_iter().map(|r| r.expect("no error")).collect();
        prop_assert_eq!(texts, fragments);
    }
}
