//! Reading a metric feed through the line codec.

#![cfg(feature = "tokio")]

use futures_util::StreamExt;
use metric_tags::line::Overflow;
use metric_tags::{decode_line, LineCodec, MessageType, NoitField};
use tokio_util::codec::FramedRead;

const FEED: &str = concat!(
    "M\t1526493506.214\tweb`http`c_1_77`4766c496-2173-4f60-9607-6449d29cac56\tlatency|ST[env:prod]\tn\t12.5\n",
    "S\t1526493506.214\tweb`http`c_1_77`4766c496-2173-4f60-9607-6449d29cac56\tG\tA\t20\tok\r\n",
    "garbage line\n",
    "H1\t1526493507.000\tweb`http`c_1_77`4766c496-2173-4f60-9607-6449d29cac56\tlatency\tAAUK/wACDP8AAQ==",
);

#[tokio::test]
async fn test_feed_decodes_line_by_line() {
    let mut frames = FramedRead::new(FEED.as_bytes(), LineCodec::new());
    let mut kinds = Vec::new();
    let mut failures = 0;
    while let Some(line) = frames.next().await {
        let line = line.unwrap();
        match decode_line(&line, NoitField::Auto) {
            Ok(msg) => kinds.push(msg.kind),
            Err(_) => failures += 1,
        }
    }
    assert_eq!(
        kinds,
        vec![MessageType::Metric, MessageType::Status, MessageType::Histogram]
    );
    assert_eq!(failures, 1);
}

#[tokio::test]
async fn test_feed_skips_over_long_lines() {
    let feed = format!("{}\nM\tshort\n", "x".repeat(100));
    let mut frames = FramedRead::new(feed.as_bytes(), LineCodec::with_max_len(32, Overflow::Skip));
    let first = frames.next().await.unwrap().unwrap();
    assert_eq!(&first[..], b"M\tshort");
    assert!(frames.next().await.is_none());
    assert_eq!(frames.decoder().skipped(), 1);
}
