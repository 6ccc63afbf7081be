use futures_util::StreamExt;
use nt3_frame::{EntryValue, ReadEvent, ReadEventKind};
use nt3_pipeline::{Client, ClientConfig, EntryTable, LoopExit};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Server side of a short session, written in awkward chunk boundaries.
const SESSION: &[u8] = &[
    // server hello, flags 0, identity "srv"
    0x04, 0x00, 0x03, b's', b'r', b'v',
    // "/name" = "nt", id 2, seq 1, persistent
    0x10, 0x05, b'/', b'n', b'a', b'm', b'e', 0x02, 0x00, 0x02, 0x00, 0x01, 0x01, 0x02, b'n', b't',
    // "/rate" = 0.5, id 3, seq 1
    0x10, 0x05, b'/', b'r', b'a', b't', b'e', 0x01, 0x00, 0x03, 0x00, 0x01, 0x00,
    0x3F, 0xE0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // server hello complete
    0x03,
];

const AFTER_HELLO: &[u8] = &[
    // keep alive
    0x00,
    // update id 3 to 2.0 at seq 2
    0x11, 0x00, 0x03, 0x00, 0x02, 0x01, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // clear all with bad magic: no event
    0x14, 0x00, 0x00, 0x00, 0x00,
    // delete id 2
    0x13, 0x00, 0x02,
    // clear all
    0x14, 0xD0, 0x6C, 0xB2, 0x7A,
];

#[tokio::test]
async fn full_session_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut hello = [0u8; 4];
        socket.read_exact(&mut hello).await.unwrap();

        for chunk in SESSION.chunks(5) {
            socket.write_all(chunk).await.unwrap();
            socket.flush().await.unwrap();
        }

        let mut complete = [0u8; 1];
        socket.read_exact(&mut complete).await.unwrap();
        assert_eq!(complete, [0x05]);

        for chunk in AFTER_HELLO.chunks(3) {
            socket.write_all(chunk).await.unwrap();
        }
        socket.shutdown().await.unwrap();

        let mut rest = Vec::new();
        socket.read_to_end(&mut rest).await.unwrap();
        rest
    });

    let mut client = Client::connect(addr, ClientConfig::default()).await.unwrap();
    let hello = client.handshake().await.unwrap();
    assert_eq!(hello.server.server_identity, "srv");
    assert!(!hello.server.client_seen());

    let mut table = EntryTable::from_entries(hello.entries);
    assert_eq!(table.len(), 2);
    assert!(table.get_by_name("/name").unwrap().is_persistent());

    let mut kinds = Vec::new();
    while let Some(event) = client.events().next().await {
        kinds.push(event.kind());
        table.apply(&event);
        if let ReadEvent::EntryUpdate(update) = &event {
            assert_eq!(update.value, EntryValue::Double(2.0));
            assert_eq!(
                table.get_by_name("/rate").unwrap().value,
                EntryValue::Double(2.0)
            );
        }
    }
    assert_eq!(
        kinds,
        vec![
            ReadEventKind::KeepAlive,
            ReadEventKind::EntryUpdate,
            ReadEventKind::EntryDelete,
            ReadEventKind::ClearAllEntries,
        ]
    );
    assert!(table.is_empty());

    let report = client.close().await;
    assert!(matches!(report.decode, LoopExit::Completed));
    assert!(matches!(report.encode, LoopExit::Completed));

    let rest = server.await.unwrap();
    assert!(rest.is_empty());
}
