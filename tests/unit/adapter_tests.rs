//! Unit tests for the stream adapters over in-memory duplex pipes.

use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use console_session::session::adapter::{read_lines, LineWriter};
use console_session::AppError;

#[tokio::test]
async fn write_line_appends_terminator() {
    let (client, mut server) = tokio::io::duplex(64);
    let mut writer = LineWriter::new(client);

    let written = writer.write_line("1+1").await.expect("write must succeed");
    assert_eq!(written, 4);

    let mut buf = [0u8; 4];
    server.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"1+1\n");
}

#[tokio::test]
async fn write_line_fails_once_reader_is_gone() {
    let (client, server) = tokio::io::duplex(64);
    drop(server);
    let mut writer = LineWriter::new(client);

    let result = writer.write_line("1+1").await;

    assert!(
        matches!(result, Err(AppError::Io(_))),
        "write to a closed pipe must fail with AppError::Io, got: {result:?}"
    );
}

#[tokio::test]
async fn write_after_shutdown_is_rejected() {
    let (client, _server) = tokio::io::duplex(64);
    let mut writer = LineWriter::new(client);

    writer.shutdown().await.unwrap();
    writer.shutdown().await.expect("second shutdown must be a no-op");

    let result = writer.write_line("late").await;
    assert!(matches!(result, Err(AppError::Closed(_))), "got: {result:?}");
}

#[tokio::test]
async fn shutdown_signals_eof_to_reader() {
    let (client, mut server) = tokio::io::duplex(64);
    let mut writer = LineWriter::new(client);

    writer.write_line("quit").await.unwrap();
    writer.shutdown().await.unwrap();

    let mut received = String::new();
    server.read_to_string(&mut received).await.unwrap();
    assert_eq!(received, "quit\n");
}

#[tokio::test]
async fn read_lines_ends_at_eof_and_drops_unterminated_tail() {
    let (mut process_side, session_side) = tokio::io::duplex(256);
    process_side
        .write_all(b"banner\nresult\nno newline")
        .await
        .unwrap();
    drop(process_side);

    let lines: Vec<String> = read_lines(session_side, 1024)
        .map(|item| item.expect("decode must succeed"))
        .collect()
        .await;

    assert_eq!(lines, vec!["banner".to_owned(), "result".to_owned()]);
}

#[tokio::test]
async fn read_lines_over_empty_stream_is_empty() {
    let empty: &[u8] = b"";

    let count = read_lines(empty, 1024).count().await;

    assert_eq!(count, 0);
}
