//! Tests for the socket listener and worker pool.

use std::net::TcpStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};
use thriftgate_config::SocketEndpoint;

use super::*;
use crate::connection::ThriftConnector;

#[derive(Default)]
struct CountingHandler {
    count: AtomicUsize,
    workers: Mutex<Vec<usize>>,
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, _stream: ConnectionStream, context: &mut WorkerContext) {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(context.id());
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

#[fixture]
fn handler() -> Arc<CountingHandler> {
    Arc::new(CountingHandler::default())
}

fn connector() -> Arc<ThriftConnector> {
    Arc::new(ThriftConnector::new(Duration::from_millis(100), Duration::ZERO))
}

fn wait_for_count(count: &AtomicUsize, expected: usize) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if count.load(Ordering::SeqCst) >= expected {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[rstest]
fn tcp_connections_reach_the_workers(handler: Arc<CountingHandler>) {
    let listener =
        SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind tcp listener");
    let addr = listener.local_addr().expect("local address");
    let (pool, queue) =
        WorkerPool::start(2, handler.clone(), connector()).expect("start workers");
    assert_eq!(pool.len(), 2);
    let listening = listener.start(queue).expect("start listener");

    for _ in 0..3 {
        TcpStream::connect(addr).expect("connect client");
    }

    assert!(wait_for_count(&handler.count, 3), "expected three connections");
    listening.shutdown();
    listening.join().expect("join listener");
    pool.join().expect("join workers");
    let workers = handler.workers.lock().unwrap_or_else(PoisonError::into_inner);
    assert!(workers.iter().all(|id| *id < 2));
}

#[rstest]
fn workers_exit_once_the_queue_closes(handler: Arc<CountingHandler>) {
    let (pool, queue) = WorkerPool::start(3, handler, connector()).expect("start workers");
    drop(queue);
    pool.join().expect("workers drain and exit");
}

#[rstest]
fn listener_stops_when_the_pool_is_gone(handler: Arc<CountingHandler>) {
    let listener =
        SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind tcp listener");
    let addr = listener.local_addr().expect("local address");
    let (sender, receiver) = crossbeam_channel::bounded(1);
    drop(receiver);
    let listening = listener.start(sender).expect("start listener");

    TcpStream::connect(addr).expect("connect client");

    listening.join().expect("listener exits by itself");
    assert_eq!(handler.count.load(Ordering::SeqCst), 0);
}

#[test]
fn occupied_ports_name_the_endpoint() {
    let taken = std::net::TcpListener::bind(("127.0.0.1", 0)).expect("bind");
    let port = taken.local_addr().expect("addr").port();

    let error = SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", port))
        .expect_err("port is taken");

    assert!(matches!(
        error,
        TransportError::Bind {
            source: BindError::Tcp { .. },
            ..
        }
    ));
    assert!(
        error
            .to_string()
            .starts_with(&format!("failed to bind tcp://127.0.0.1:{port}"))
    );
}

#[cfg(unix)]
mod unix {
    use std::os::unix::net::{UnixListener, UnixStream};

    use super::*;

    #[rstest]
    fn stale_socket_files_are_replaced_and_removed(handler: Arc<CountingHandler>) {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("thriftgated.sock");
        drop(UnixListener::bind(&path).expect("bind stale listener"));
        assert!(path.exists(), "stale socket should remain");

        let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
        let listener = SocketListener::bind(&endpoint).expect("bind new listener");
        assert!(listener.local_addr().is_none());
        let (pool, queue) =
            WorkerPool::start(1, handler.clone(), connector()).expect("start workers");
        let listening = listener.start(queue).expect("start listener");

        UnixStream::connect(&path).expect("connect unix client");
        assert!(wait_for_count(&handler.count, 1));

        listening.shutdown();
        listening.join().expect("join listener");
        pool.join().expect("join workers");
        assert!(!path.exists(), "listener removes its socket on shutdown");
    }

    #[rstest]
    fn sockets_in_use_are_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("thriftgated.sock");
        let _existing = UnixListener::bind(&path).expect("bind existing listener");

        let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
        let error = SocketListener::bind(&endpoint).expect_err("should fail bind");
        assert!(matches!(
            error,
            TransportError::Bind {
                source: BindError::InUse,
                ..
            }
        ));
    }

    #[rstest]
    fn regular_files_are_not_replaced() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("thriftgated.sock");
        std::fs::write(&path, "not a socket").expect("write file");

        let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
        let error = SocketListener::bind(&endpoint).expect_err("should fail bind");
        assert!(matches!(
            error,
            TransportError::Bind {
                source: BindError::NotSocket,
                ..
            }
        ));
        assert!(path.is_file(), "the file is left in place");
    }
}
