//! Common test utilities for relay integration tests.
//!
//! Everything here must run inside a `tokio::task::LocalSet`, since the
//! relay serves connections with `spawn_local`.

use msgrelay::relay::protocol::{ClientId, PublicKey, Request, Response, ResponseCode, PUBLIC_KEY_SIZE};
use msgrelay::relay::transport::{pad_to_units, UNIT_SIZE};
use msgrelay::{RelayServer, SqliteStore};
use rand::RngCore;
use std::net::SocketAddr;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A relay running on a loopback port
pub struct TestRelay {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TestRelay {
    /// Stop accepting and wait for the listener to exit
    #[allow(dead_code)]
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.await.expect("relay task panicked");
    }
}

/// Start a relay backed by an in-memory store
pub fn start_relay() -> TestRelay {
    spawn_relay(SqliteStore::open_in_memory().expect("in-memory store"))
}

/// Start a relay backed by the database file at `path`
#[allow(dead_code)]
pub fn start_relay_with_db(path: &Path) -> TestRelay {
    spawn_relay(SqliteStore::open(path).expect("file store"))
}

fn spawn_relay(store: SqliteStore) -> TestRelay {
    let server = RelayServer::bind("127.0.0.1:0".parse().unwrap(), store).expect("bind relay");
    let addr = server.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let task = tokio::task::spawn_local(async move {
        server
            .run(async {
                let _ = rx.await;
            })
            .await
            .expect("relay run failed");
    });

    TestRelay {
        addr,
        shutdown: Some(tx),
        task,
    }
}

/// Random public key
pub fn random_key() -> PublicKey {
    let mut key = [0u8; PUBLIC_KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut key);
    PublicKey::from_bytes(key)
}

/// Random message content of `size` bytes
#[allow(dead_code)]
pub fn random_content(size: usize) -> Vec<u8> {
    let mut content = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut content);
    content
}

/// Read everything the relay sends until it closes the connection
pub async fn read_reply(stream: &mut TcpStream) -> Vec<u8> {
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.expect("read reply");
    assert_eq!(reply.len() % UNIT_SIZE, 0, "reply is not whole units");
    reply
}

/// Send raw bytes as padded units and return the raw reply
pub async fn exchange_raw(addr: SocketAddr, wire: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(&pad_to_units(wire)).await.expect("write request");
    read_reply(&mut stream).await
}

/// Send `request` as `sender` and decode the response
pub async fn exchange(addr: SocketAddr, sender: ClientId, request: &Request) -> Response {
    let reply = exchange_raw(addr, &request.encode(sender)).await;
    Response::decode(&reply).expect("decode response")
}

/// Register `name` and return the issued id
pub async fn register(addr: SocketAddr, name: &str) -> ClientId {
    let request = Request::Register {
        name: name.to_string(),
        public_key: random_key(),
    };
    let response = exchange(addr, ClientId::default(), &request).await;
    assert_eq!(response.code, ResponseCode::Registered, "register {}", name);
    ClientId::from_slice(&response.payload).expect("client id")
}
