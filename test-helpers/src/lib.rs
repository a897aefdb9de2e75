pub mod mock;

use fetch_pattern::{FetchState, telemetry};
use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing_log::LogTracer;
use tracing_subscriber::util::SubscriberInitExt;

pub use mock::ScriptedTransport;

/// Install the test subscriber. Safe to call from every test.
pub fn init_tracing() {
    let subscriber = telemetry::get_subscriber("error".into());
    let _ = LogTracer::init();
    let _ = subscriber.try_init();
}

/// A server on an OS-assigned port that answers exactly one request with a
/// canned response.
pub struct HttpStub {
    pub address: String,
    request: oneshot::Receiver<String>,
}

impl HttpStub {
    /// URL of `path` on the stub.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.address, path.trim_start_matches('/'))
    }

    /// The raw request (head and body) the stub received.
    pub async fn received(self) -> anyhow::Result<String> {
        Ok(self.request.await?)
    }
}

/// Spawn a stub that replies with `status` and a JSON `body`.
pub async fn spawn_http_stub(status: StatusCode, body: &str) -> HttpStub {
    // OS assigns the port if binding to 0
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (sender, receiver) = oneshot::channel();
    let body = body.to_string();

    tokio::spawn(async move {
        let (mut socket, peer) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        tracing::debug!(%peer, %status, "stub answering request");
        let response = format!(
            "HTTP/1.1 {} {}\r\n\
             content-type: application/json\r\n\
             content-length: {}\r\n\
             connection: close\r\n\r\n{}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        let _ = sender.send(request);
    });

    HttpStub {
        address: format!("http://127.0.0.1:{port}"),
        request: receiver,
    }
}

/// A local address nothing is listening on.
pub async fn unused_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

/// Read one HTTP/1.1 request, honoring content-length for the body.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(head_end) = find_head_end(&buf) else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
        let content_length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= head_end + 4 + content_length {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

/// Assert that a state is `Error` and return its message.
pub fn assert_error_state<T: std::fmt::Debug>(state: &FetchState<T>) -> String {
    match state {
        FetchState::Error { message } => {
            assert!(!message.is_empty(), "error message must not be empty");
            message.clone()
        }
        other => panic!("Expected Error state, got {other:?}"),
    }
}
