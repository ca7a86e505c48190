//! Unit tests for the output readers that merge stdout and stderr.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;

use console_session::session::reader::{run_reader, spawn_output_readers, Origin, ReaderContext};
use console_session::Diagnostics;

const WAIT: Duration = Duration::from_secs(5);

fn context(cancel: &CancellationToken) -> ReaderContext {
    ReaderContext {
        session_id: "s-mux".to_owned(),
        max_line_bytes: 1024,
        diagnostics: Diagnostics::disabled(),
        cancel: cancel.clone(),
    }
}

#[tokio::test]
async fn both_streams_feed_one_queue_with_lines_intact() {
    let (mut out_w, out_r) = tokio::io::duplex(1024);
    let (mut err_w, err_r) = tokio::io::duplex(1024);
    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();

    let readers = spawn_output_readers(out_r, err_r, &tx, &context(&cancel));

    out_w.write_all(b"out one\nout two\n").await.unwrap();
    err_w.write_all(b"err one\n").await.unwrap();
    out_w.write_all(b"out three\n").await.unwrap();
    drop(out_w);
    drop(err_w);

    for reader in readers {
        tokio::time::timeout(WAIT, reader).await.unwrap().unwrap();
    }

    let mut received = Vec::new();
    while let Ok(line) = rx.try_recv() {
        received.push(line);
    }

    let stdout_lines: Vec<&str> = received
        .iter()
        .map(String::as_str)
        .filter(|l| l.starts_with("out"))
        .collect();
    assert_eq!(stdout_lines, vec!["out one", "out two", "out three"]);
    assert!(received.iter().any(|l| l == "err one"));
    assert_eq!(received.len(), 4);
}

#[tokio::test]
async fn finished_readers_do_not_close_the_queue() {
    let (out_w, out_r) = tokio::io::duplex(64);
    let (err_w, err_r) = tokio::io::duplex(64);
    let (tx, mut rx) = mpsc::channel::<String>(8);
    let cancel = CancellationToken::new();

    let readers = spawn_output_readers(out_r, err_r, &tx, &context(&cancel));
    drop(out_w);
    drop(err_w);

    for reader in readers {
        tokio::time::timeout(WAIT, reader).await.unwrap().unwrap();
    }

    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

    drop(tx);
    assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
}

#[tokio::test]
async fn reader_stops_on_cancel_while_stream_is_open() {
    let (_out_w, out_r) = tokio::io::duplex(64);
    let (tx, _rx) = mpsc::channel::<String>(8);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run_reader(Origin::Stdout, out_r, tx, context(&cancel)));
    cancel.cancel();

    tokio::time::timeout(WAIT, task)
        .await
        .expect("reader must stop after cancellation")
        .unwrap();
}

#[tokio::test]
async fn cancel_never_drops_lines_waiting_for_queue_space() {
    let (mut out_w, out_r) = tokio::io::duplex(256);
    let (tx, mut rx) = mpsc::channel::<String>(1);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run_reader(Origin::Stderr, out_r, tx, context(&cancel)));
    out_w.write_all(b"a\nb\nc\n").await.unwrap();
    drop(out_w);

    let first = tokio::time::timeout(WAIT, rx.recv()).await.unwrap();
    assert_eq!(first.as_deref(), Some("a"));

    // The reader is now holding a line it cannot queue yet.
    cancel.cancel();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut rest = Vec::new();
    while let Some(line) = tokio::time::timeout(WAIT, rx.recv()).await.unwrap() {
        rest.push(line);
    }
    assert_eq!(rest, vec!["b".to_owned(), "c".to_owned()]);

    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn closed_receiver_releases_reader_waiting_for_space() {
    let (mut out_w, out_r) = tokio::io::duplex(256);
    let (tx, mut rx) = mpsc::channel::<String>(1);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run_reader(Origin::Stdout, out_r, tx, context(&cancel)));
    out_w.write_all(b"a\nb\nc\n").await.unwrap();

    let first = tokio::time::timeout(WAIT, rx.recv()).await.unwrap();
    assert_eq!(first.as_deref(), Some("a"));

    rx.close();
    tokio::time::timeout(WAIT, task)
        .await
        .expect("reader must stop once the receiver is closed")
        .unwrap();
}

#[tokio::test]
async fn reader_stops_when_receiver_is_gone() {
    let (mut out_w, out_r) = tokio::io::duplex(64);
    let (tx, rx) = mpsc::channel::<String>(8);
    drop(rx);

    let task = tokio::spawn(run_reader(
        Origin::Stdout,
        out_r,
        tx,
        context(&CancellationToken::new()),
    ));
    out_w.write_all(b"orphan\n").await.unwrap();

    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
}

#[test]
fn origin_displays_stream_name() {
    assert_eq!(Origin::Stdout.to_string(), "stdout");
    assert_eq!(Origin::Stderr.to_string(), "stderr");
}
