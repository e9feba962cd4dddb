//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ip_lookup_proxy::config::ProxyConfig;
use ip_lookup_proxy::http::HttpServer;
use ip_lookup_proxy::lifecycle::Shutdown;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Read an HTTP/1.1 request head (request line and headers).
async fn read_head(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Start a mock upstream on an ephemeral port. `f` receives the raw request
/// head and returns the status code and body to send back.
pub async fn start_programmable_upstream<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let head = read_head(&mut socket).await;
                        let (status, body) = f(head).await;
                        let status_text = match status {
                            200 => "200 OK",
                            403 => "403 Forbidden",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A proxy running on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<Result<(), std::io::Error>>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// A config pointing at `upstream`, with a known APPCODE.
pub fn config_for(upstream: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.host = format!("http://{upstream}");
    config.upstream.app_code = "test-code".to_string();
    config
}

pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();
    let task = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    TestProxy {
        addr,
        shutdown,
        task,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn geo_document(ip: &str) -> String {
    format!(r#"{{"ret":200,"msg":"success","data":{{"ip":"{ip}","country":"US"}}}}"#)
}

/// Pull the `ip` query parameter out of a request head.
#[allow(dead_code)]
pub fn requested_ip(head: &str) -> String {
    head.split_whitespace()
        .nth(1)
        .and_then(|target| target.split("ip=").nth(1))
        .unwrap_or_default()
        .to_string()
}
