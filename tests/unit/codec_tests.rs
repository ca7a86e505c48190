//! Unit tests for the line codec.
//!
//! Covers framing of single and batched lines, buffering of partial lines,
//! the end-of-stream handling of an unterminated tail, and skipping of
//! oversized or non-UTF-8 lines.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use console_session::session::codec::{LineCodec, DEFAULT_MAX_LINE_BYTES};

#[test]
fn single_line_is_decoded_without_terminator() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("1+1\n");

    let line = codec.decode(&mut buf).expect("decode must succeed");

    assert_eq!(line.as_deref(), Some("1+1"));
    assert!(buf.is_empty());
}

#[test]
fn carriage_return_is_stripped() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("2\r\n");

    let line = codec.decode(&mut buf).expect("decode must succeed");

    assert_eq!(line.as_deref(), Some("2"));
}

#[test]
fn batched_lines_are_each_decoded() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("first\nsecond\n");

    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("first"));
    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("second"));
    assert!(codec.decode(&mut buf).unwrap().is_none());
}

#[test]
fn empty_line_is_preserved() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("\nafter\n");

    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some(""));
    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("after"));
}

#[test]
fn partial_line_is_buffered_until_newline() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("Type a Java");

    assert!(
        codec.decode(&mut buf).unwrap().is_none(),
        "partial line must not be emitted before the newline arrives"
    );

    buf.extend_from_slice(b"script expression\n");
    assert_eq!(
        codec.decode(&mut buf).unwrap().as_deref(),
        Some("Type a Javascript expression")
    );
}

/// Known edge case: bytes after the last newline at end-of-stream are
/// dropped, never delivered as a final line.
#[test]
fn unterminated_tail_is_discarded_at_eof() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("complete\npartial");

    assert_eq!(
        codec.decode_eof(&mut buf).unwrap().as_deref(),
        Some("complete")
    );
    assert!(
        codec.decode_eof(&mut buf).unwrap().is_none(),
        "unterminated tail must not be yielded"
    );
    assert!(buf.is_empty(), "tail bytes must be cleared");
}

#[test]
fn oversized_line_is_skipped_and_next_line_decoded() {
    let mut codec = LineCodec::with_max_length(8);
    let mut buf = BytesMut::from("this line is far too long\nok\n");

    let line = codec.decode(&mut buf).expect("oversized line must not error");

    assert_eq!(line.as_deref(), Some("ok"));
}

#[test]
fn invalid_utf8_line_is_skipped() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::new();
    buf.extend_from_slice(b"\xff\xfe\n");
    buf.extend_from_slice(b"valid\n");

    let line = codec.decode(&mut buf).expect("invalid UTF-8 must not error");

    assert_eq!(line.as_deref(), Some("valid"));
}

#[test]
fn default_limit_is_one_mebibyte() {
    assert_eq!(LineCodec::new().max_length(), DEFAULT_MAX_LINE_BYTES);
    assert_eq!(DEFAULT_MAX_LINE_BYTES, 1_048_576);
}

#[test]
fn encode_appends_newline() {
    let mut codec = LineCodec::new();
    let mut dst = BytesMut::new();

    codec.encode("quit", &mut dst).expect("encode must succeed");

    assert_eq!(&dst[..], b"quit\n");
}
