//! Scripted local HTTP server for exercising the client against real sockets.
//!
//! Routes match on method and path (query excluded). A route holding several
//! responses hands them out in order and then keeps repeating the last one.
//! Every request is recorded with its headers and body.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Json {
        status: u16,
        body: String,
    },
    Sse {
        frames: Vec<String>,
        hold_open: bool,
    },
    /// Close the connection without answering.
    Reset,
}

pub fn json_response(status: u16, body: impl Into<String>) -> ScriptedResponse {
    ScriptedResponse::Json {
        status,
        body: body.into(),
    }
}

/// Event stream that closes after the frames are written.
pub fn sse_response(frames: &[&str]) -> ScriptedResponse {
    ScriptedResponse::Sse {
        frames: frames.iter().map(|frame| (*frame).to_owned()).collect(),
        hold_open: false,
    }
}

/// Event stream that stays open after the frames until the client goes away.
pub fn sse_held_open(frames: &[&str]) -> ScriptedResponse {
    ScriptedResponse::Sse {
        frames: frames.iter().map(|frame| (*frame).to_owned()).collect(),
        hold_open: true,
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    method: String,
    path: String,
    responses: Vec<ScriptedResponse>,
    served: usize,
}

impl Route {
    pub fn new(method: &str, path: &str, response: ScriptedResponse) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            path: path.to_owned(),
            responses: vec![response],
            served: 0,
        }
    }

    pub fn then(mut self, response: ScriptedResponse) -> Self {
        self.responses.push(response);
        self
    }

    fn next_response(&mut self) -> ScriptedResponse {
        let index = self.served.min(self.responses.len().saturating_sub(1));
        self.served += 1;
        self.responses[index].clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    /// Request target as sent, query included.
    pub target: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn path(&self) -> &str {
        self.target
            .split_once('?')
            .map_or(self.target.as_str(), |(path, _)| path)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn json_body(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Default)]
struct ServerState {
    routes: Vec<Route>,
    requests: Vec<RecordedRequest>,
}

pub struct ScriptedServer {
    base_url: String,
    state: Arc<Mutex<ServerState>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    /// Bind an ephemeral local port and start serving `routes`.
    pub async fn start(routes: Vec<Route>) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let state = Arc::new(Mutex::new(ServerState {
            routes,
            requests: Vec::new(),
        }));

        let handle = tokio::spawn({
            let state = Arc::clone(&state);
            async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        serve_one(socket, state).await;
                    });
                }
            }
        });

        Ok(Self {
            base_url,
            state,
            handle,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .map(|state| state.requests.clone())
            .unwrap_or_default()
    }

    /// Requests whose path (query excluded) equals `path`.
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path() == path)
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.requests.len())
            .unwrap_or_default()
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_one(mut socket: TcpStream, state: Arc<Mutex<ServerState>>) {
    let Ok(Some(request)) = read_request(&mut socket).await else {
        return;
    };

    let response = {
        let Ok(mut state) = state.lock() else {
            return;
        };
        let path = request.path().to_owned();
        let response = state
            .routes
            .iter_mut()
            .find(|route| route.method == request.method && route.path == path)
            .map(Route::next_response)
            .unwrap_or_else(|| json_response(404, r#"{"error":"no route"}"#));
        state.requests.push(request);
        response
    };

    match response {
        ScriptedResponse::Reset => {}
        ScriptedResponse::Json { status, body } => {
            let head = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_reason(status),
                body.len(),
            );
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            let _ = socket.write_all(body.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        ScriptedResponse::Sse { frames, hold_open } => {
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for frame in frames {
                if write_chunk(&mut socket, format!("{frame}\n\n").as_bytes())
                    .await
                    .is_err()
                {
                    return;
                }
            }
            if hold_open {
                loop {
                    tokio::time::sleep(KEEPALIVE_INTERVAL).await;
                    if write_chunk(&mut socket, b": keepalive\n\n").await.is_err() {
                        return;
                    }
                }
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
            let _ = socket.shutdown().await;
        }
    }
}

async fn write_chunk(socket: &mut TcpStream, bytes: &[u8]) -> std::io::Result<()> {
    socket
        .write_all(format!("{:X}\r\n", bytes.len()).as_bytes())
        .await?;
    socket.write_all(bytes).await?;
    socket.write_all(b"\r\n").await?;
    socket.flush().await
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<Option<RecordedRequest>> {
    let mut raw = Vec::new();
    let mut buffer = [0_u8; 2048];

    let header_end = loop {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            return Ok(None);
        }
        raw.extend_from_slice(&buffer[..n]);
        if let Some(position) = raw.windows(4).position(|window| window == b"\r\n\r\n") {
            break position;
        }
    };

    let head = String::from_utf8_lossy(&raw[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_owned();
    let target = request_line.next().unwrap_or_default().to_owned();

    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim().to_owned()))
        .collect::<BTreeMap<_, _>>();

    let content_length = headers
        .get("content-length")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = raw[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buffer[..n]);
    }

    Ok(Some(RecordedRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    }))
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
