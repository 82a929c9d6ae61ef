#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use microcam::storage::{FileEntry, FrameFs, OsFs};
use microcam::{build_router, AppState, FixedClock, FrameStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub const BOUNDARY: &str = "microcam-test-boundary";
pub const FIXED_SECS: i64 = 1_234_567_890;

pub struct Response {
    pub status: u16,
    pub head: String,
    pub body: Vec<u8>,
}

impl Response {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("json body")
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }
}

/// Serve `store` on an ephemeral port with the clock frozen at `FIXED_SECS`.
pub async fn spawn_app(store: FrameStore, max_upload_bytes: usize) -> (SocketAddr, AppState) {
    let state = AppState::with_clock(store, Arc::new(FixedClock::at_epoch_secs(FIXED_SECS)));
    let app = build_router(state.clone(), max_upload_bytes);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    (addr, state)
}

pub async fn send_raw(
    addr: SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, String)],
    body: &[u8],
) -> Response {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    for (k, v) in headers {
        req.push_str(&format!("{k}: {v}\r\n"));
    }
    if !body.is_empty() || method == "POST" {
        req.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    req.push_str("\r\n");

    let mut bytes = req.into_bytes();
    bytes.extend_from_slice(body);
    stream.write_all(&bytes).await.expect("write request");

    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .await
        .expect("read response");
    let split = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("http response must have separator");
    let head = String::from_utf8_lossy(&response[..split]).into_owned();
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    Response {
        status,
        head,
        body: response[split + 4..].to_vec(),
    }
}

pub async fn get(addr: SocketAddr, path: &str) -> Response {
    send_raw(addr, "GET", path, &[], &[]).await
}

/// A form part: field name, optional file name, content.
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub content: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn file(content: &'a [u8]) -> Self {
        Self {
            name: "file",
            filename: Some("frame.jpg"),
            content,
        }
    }

    pub fn meta(json: &'a str) -> Self {
        Self {
            name: "meta",
            filename: None,
            content: json.as_bytes(),
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{filename}\"\r\n\
                     Content-Type: image/jpeg\r\n\r\n",
                    part.name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    part.name
                )
                .as_bytes(),
            ),
        }
        body.extend_from_slice(part.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn upload(addr: SocketAddr, parts: &[Part<'_>]) -> Response {
    let headers = [(
        "Content-Type",
        format!("multipart/form-data; boundary={BOUNDARY}"),
    )];
    send_raw(addr, "POST", "/upload", &headers, &multipart_body(parts)).await
}

/// Delegates to `OsFs` but refuses the operations it is told to.
#[derive(Debug, Default)]
pub struct FlakyFs {
    pub fail_remove: bool,
    pub fail_link: bool,
}

fn refused() -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, "refused")
}

impl FrameFs for FlakyFs {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        OsFs.create_dir_all(path)
    }
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        OsFs.write(path, bytes)
    }
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        OsFs.read(path)
    }
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        if self.fail_remove {
            return Err(refused());
        }
        OsFs.remove_file(path)
    }
    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()> {
        if self.fail_link {
            return Err(refused());
        }
        OsFs.hard_link(original, link)
    }
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        OsFs.copy(from, to)
    }
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        OsFs.rename(from, to)
    }
    fn list_files(&self, dir: &Path) -> io::Result<Vec<FileEntry>> {
        OsFs.list_files(dir)
    }
}
