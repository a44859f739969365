//! One-shot local HTTP server for exercising the client code without network.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub fn http_response(status: &str, headers: &[(&str, String)], body: &[u8]) -> Vec<u8> {
  let mut head = format!("HTTP/1.1 {}\r\nConnection: close\r\n", status);
  for (name, value) in headers {
    head.push_str(&format!("{}: {}\r\n", name, value));
  }
  head.push_str("\r\n");
  let mut bytes = head.into_bytes();
  bytes.extend_from_slice(body);
  bytes
}

/// Serves `response` to the first connection, then closes it. The receiver
/// yields the raw request head.
pub async fn serve_once(response: Vec<u8>) -> (String, oneshot::Receiver<String>) {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let base_url = format!("http://{}", listener.local_addr().unwrap());
  let (tx, rx) = oneshot::channel();
  tokio::spawn(async move {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut request = Vec::new();
    let mut buffer = [0u8; 1024];
    loop {
      let read = socket.read(&mut buffer).await.unwrap();
      if read == 0 {
        break;
      }
      request.extend_from_slice(&buffer[..read]);
      if request.windows(4).any(|window| window == b"\r\n\r\n") {
        break;
      }
    }
    let _ = tx.send(String::from_utf8_lossy(&request).to_string());
    let _ = socket.write_all(&response).await;
    let _ = socket.shutdown().await;
  });
  (base_url, rx)
}
