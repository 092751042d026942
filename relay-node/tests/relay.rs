//! End-to-end tests over loopback sockets: client -> processing -> display.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use relay_core::{decode_frame, FrameDecodeError, RetryPolicy, MAX_DISPLAY_FRAME_LEN};
use relay_node::{
    Client, ClientConfig, DisplayNode, NodeHandle, ProcessingConfig, ProcessingNode, Result,
    ShutdownToken,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn tokens(s: &str) -> HashSet<String> {
    s.split_whitespace().map(str::to_owned).collect()
}

/// Order-insensitive rendering of a token list, for comparing whole messages.
fn canonical(s: &str) -> String {
    let mut words: Vec<&str> = s.split_whitespace().collect();
    words.sort_unstable();
    words.join(" ")
}

struct Relay {
    processing: SocketAddr,
    rendered: mpsc::UnboundedReceiver<String>,
    handles: Vec<NodeHandle>,
    tasks: Vec<JoinHandle<Result<()>>>,
}

impl Relay {
    async fn start() -> Relay {
        let (tx, rendered) = mpsc::unbounded_channel();
        let display = DisplayNode::bind(loopback(), tx, ShutdownToken::new())
            .await
            .unwrap();
        let display_addr = display.local_addr().unwrap();
        let processing = ProcessingNode::bind(
            ProcessingConfig::new(loopback(), "127.0.0.1", display_addr.port()),
            ShutdownToken::new(),
        )
        .await
        .unwrap();
        let processing_addr = processing.local_addr().unwrap();
        let handles = vec![processing.handle(), display.handle()];
        let tasks = vec![tokio::spawn(processing.run()), tokio::spawn(display.run())];
        Relay {
            processing: processing_addr,
            rendered,
            handles,
            tasks,
        }
    }

    fn client(&self) -> Client {
        let mut config = ClientConfig::new("127.0.0.1", self.processing.port());
        config.retry = RetryPolicy::new(3, Duration::from_millis(20));
        config.ack_timeout = Some(Duration::from_millis(300));
        Client::new(config)
    }

    async fn stop(self) {
        for h in &self.handles {
            h.stop();
        }
        for t in self.tasks {
            tokio::time::timeout(Duration::from_secs(2), t)
                .await
                .expect("node did not stop")
                .unwrap()
                .unwrap();
        }
    }
}

#[tokio::test]
async fn ack_contract_full_chain() {
    let mut relay = Relay::start().await;
    let mut client = relay.client();

    assert!(client.send("hello world hello test").await);
    let shown = relay.rendered.recv().await.unwrap();
    assert_eq!(tokens(&shown), tokens("hello world test"));

    // Exactly one forwarded frame per acknowledged send.
    let extra = tokio::time::timeout(Duration::from_millis(100), relay.rendered.recv()).await;
    assert!(extra.is_err());

    assert!(client.send("test test message").await);
    let shown = relay.rendered.recv().await.unwrap();
    assert_eq!(tokens(&shown), tokens("test message"));

    client.disconnect().await;
    relay.stop().await;
}

#[tokio::test]
async fn whitespace_only_message_fails_and_is_not_forwarded() {
    let mut relay = Relay::start().await;
    let mut client = relay.client();

    assert!(!client.send("   ").await);
    assert!(!client.send("").await);
    let shown = tokio::time::timeout(Duration::from_millis(100), relay.rendered.recv()).await;
    assert!(shown.is_err());

    // The client keeps working for later sends.
    assert!(client.send("still fine").await);
    assert_eq!(tokens(&relay.rendered.recv().await.unwrap()), tokens("still fine"));

    relay.stop().await;
}

#[tokio::test]
async fn many_clients_share_the_display_link() {
    let mut relay = Relay::start().await;
    let mut sends = Vec::new();
    for i in 0..16 {
        let mut client = relay.client();
        sends.push(tokio::spawn(async move {
            let ok = client.send(&format!("c{i} c{i} shared")).await;
            client.disconnect().await;
            ok
        }));
    }
    for s in sends {
        assert!(s.await.unwrap());
    }
    let mut seen = HashSet::new();
    for _ in 0..16 {
        let shown = relay.rendered.recv().await.unwrap();
        assert_eq!(shown.split(' ').count(), 2);
        assert!(seen.insert(shown));
    }
    relay.stop().await;
}

#[tokio::test]
async fn concurrent_forwards_never_interleave() {
    // Raw display side so the byte stream itself can be checked.
    let display = TcpListener::bind(loopback()).await.unwrap();
    let display_port = display.local_addr().unwrap().port();
    let node = ProcessingNode::bind(
        ProcessingConfig::new(loopback(), "127.0.0.1", display_port),
        ShutdownToken::new(),
    )
    .await
    .unwrap();
    let (mut display_side, _) = display.accept().await.unwrap();
    let addr = node.local_addr().unwrap();
    let handle = node.handle();
    let server = tokio::spawn(node.run());

    const N: usize = 24;
    let collector = tokio::spawn(async move {
        let mut buf = Vec::new();
        let mut frames = Vec::new();
        while frames.len() < N {
            let mut chunk = [0u8; 8192];
            let n = display_side.read(&mut chunk).await.unwrap();
            assert!(n > 0, "display link closed early");
            buf.extend_from_slice(&chunk[..n]);
            loop {
                match decode_frame(&buf, MAX_DISPLAY_FRAME_LEN) {
                    Ok((payload, used)) => {
                        frames.push(String::from_utf8(payload.to_vec()).unwrap());
                        buf.drain(..used);
                    }
                    Err(FrameDecodeError::NeedMore) => break,
                    Err(e) => panic!("corrupted frame boundary: {e}"),
                }
            }
        }
        (frames, buf)
    });

    let mut sends = Vec::new();
    for i in 0..N {
        // Long distinct payloads make partial writes likely if the link were unguarded.
        let words: Vec<String> = (0..200).map(|w| format!("m{i}w{w}")).collect();
        let message = words.join(" ");
        let mut config = ClientConfig::new("127.0.0.1", addr.port());
        config.retry = RetryPolicy::new(1, Duration::ZERO);
        let mut client = Client::new(config);
        sends.push(tokio::spawn(async move {
            let ok = client.send(&message).await;
            client.disconnect().await;
            (ok, message)
        }));
    }
    let mut expected = HashSet::new();
    for s in sends {
        let (ok, message) = s.await.unwrap();
        assert!(ok);
        expected.insert(canonical(&message));
    }

    let (frames, buf) = tokio::time::timeout(Duration::from_secs(5), collector)
        .await
        .unwrap()
        .unwrap();
    assert!(buf.is_empty());
    let got: HashSet<String> = frames.iter().map(|f| canonical(f)).collect();
    assert_eq!(got, expected);

    handle.stop();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn oversize_frame_is_dropped_without_crashing_node() {
    let mut relay = Relay::start().await;

    let mut rogue = TcpStream::connect(relay.processing).await.unwrap();
    let mut oversize = 4096u32.to_be_bytes().to_vec();
    oversize.extend_from_slice(&[b'x'; 64]);
    rogue.write_all(&oversize).await.unwrap();
    let mut buf = [0u8; 4];
    let closed = tokio::time::timeout(Duration::from_secs(2), rogue.read(&mut buf))
        .await
        .unwrap();
    assert!(matches!(closed, Ok(0) | Err(_)));

    let mut client = relay.client();
    assert!(client.send("after rogue").await);
    assert_eq!(tokens(&relay.rendered.recv().await.unwrap()), tokens("after rogue"));
    relay.stop().await;
}

#[tokio::test]
async fn client_recovers_when_processing_comes_up() {
    let (tx, mut rendered) = mpsc::unbounded_channel();
    let display = DisplayNode::bind(loopback(), tx, ShutdownToken::new())
        .await
        .unwrap();
    let display_addr = display.local_addr().unwrap();
    let display_handle = display.handle();
    let display_task = tokio::spawn(display.run());

    // Reserve a port, release it, then start processing there after the client's first attempt.
    let port = TcpListener::bind(loopback())
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let mut config = ClientConfig::new("127.0.0.1", port);
    config.retry = RetryPolicy::new(3, Duration::from_millis(300));
    let mut client = Client::new(config);

    let starter = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let node = ProcessingNode::bind(
            ProcessingConfig::new(
                SocketAddr::from(([127, 0, 0, 1], port)),
                "127.0.0.1",
                display_addr.port(),
            ),
            ShutdownToken::new(),
        )
        .await
        .unwrap();
        let handle = node.handle();
        (handle, tokio::spawn(node.run()))
    });

    assert!(client.send("late start").await);
    assert_eq!(tokens(&rendered.recv().await.unwrap()), tokens("late start"));

    client.disconnect().await;
    let (handle, task) = starter.await.unwrap();
    handle.stop();
    task.await.unwrap().unwrap();
    display_handle.stop();
    display_task.await.unwrap().unwrap();
}
