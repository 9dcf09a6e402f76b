//! spec.md §8 scenarios 3 and 5: bytes consumed by a rejecting classifier
//! must still reach whichever sub-listener ultimately claims the
//! connection, and among classifiers that would all accept, only the
//! first-registered one ever sees the connection.

mod support;

use connmux_matchers::any;
use support::ReadNAndReject;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn buffer_consumed_by_rejected_classifier_replays_to_catch_all() {
    let (mux, addr) = support::bind().await;
    let probe_len = "bufferReader".len();
    let _rejecting = mux
        .r#match(ReadNAndReject { len: probe_len })
        .expect("register before serve");
    let catch_all = mux.r#match(any()).expect("register before serve");
    let _serve = support::spawn_serve(mux);

    let payload = "bufferReader".repeat(5);
    let mut client = support::connect(addr).await;
    client
        .write_all(payload.as_bytes())
        .await
        .expect("write payload");
    drop(client);

    let mut conn = catch_all.accept().await.expect("accept on catch-all");
    let mut replayed = Vec::new();
    for _ in 0..5 {
        let mut chunk = vec![0u8; probe_len];
        conn.read_exact(&mut chunk).await.expect("read chunk");
        replayed.extend_from_slice(&chunk);
    }
    assert_eq!(replayed, payload.as_bytes());
}

#[tokio::test]
async fn first_registered_matching_classifier_wins() {
    let (mux, addr) = support::bind().await;
    let first = mux.r#match(any()).expect("register before serve");
    let second = mux.r#match(any()).expect("register before serve");
    let _serve = support::spawn_serve(mux);

    for _ in 0..3 {
        let _client = support::connect(addr).await;
        let conn = first.accept().await.expect("accept on first listener");
        drop(conn);
    }

    // The second sub-listener must never have received anything: give the
    // accept loop a bounded window, then confirm it's still empty.
    let outcome = tokio::time::timeout(std::time::Duration::from_millis(200), second.accept()).await;
    assert!(outcome.is_err(), "second listener should never receive a connection");
}
