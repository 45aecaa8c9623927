use super::*;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Accept one HTTP request, answer 200 and hand back the JSON body.
async fn one_shot_server() -> (String, tokio::task::JoinHandle<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("http://{}/launch", listener.local_addr().expect("addr"));
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut buf = Vec::new();
        let mut chunk = [0_u8; 4096];
        let body = loop {
            let n = stream.read(&mut chunk).await.expect("read");
            assert!(n > 0, "client hung up before the body arrived");
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            let Some(split) = text.find("\r\n\r\n") else { continue };
            let length = text[..split]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            if buf.len() >= split + 4 + length {
                break buf[split + 4..split + 4 + length].to_vec();
            }
        };
        stream
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
            .await
            .expect("write");
        serde_json::from_slice(&body).expect("json body")
    });
    (url, handle)
}

#[tokio::test]
async fn posts_camel_case_request() {
    let (url, server) = one_shot_server().await;
    let launcher = HttpLauncher::new(reqwest::Client::new(), &url);
    launcher
        .notify(LaunchRequest::for_placement(1, 5, 5, Some("A"), "AAAA".into()))
        .await;

    let body = server.await.expect("server task");
    assert_eq!(body["symbol"], "SOLPLACE");
    assert_eq!(body["name"], "A");
    assert_eq!(body["imageBase64"], "AAAA");
    assert_eq!(body["boardId"], 1);
    assert_eq!(launcher.completed(), 1);
}

#[tokio::test]
async fn failed_post_still_counts_as_completed() {
    let addr = std::net::TcpListener::bind("127.0.0.1:0").and_then(|l| l.local_addr()).expect("probe port");
    let launcher = std::sync::Arc::new(HttpLauncher::new(reqwest::Client::new(), &format!("http://{addr}/launch")));

    let spawned = launcher.clone();
    tokio::spawn(async move {
        spawned.notify(LaunchRequest::for_placement(1, 0, 0, None, String::new())).await;
    });
    assert!(launcher.wait_completed(1, Duration::from_secs(5)).await);
}

#[tokio::test]
async fn wait_times_out_without_notifications() {
    let launcher = HttpLauncher::new(reqwest::Client::new(), "http://127.0.0.1:1/launch");
    assert!(!launcher.wait_completed(1, Duration::from_millis(50)).await);
    assert!(launcher.wait_completed(0, Duration::from_millis(50)).await);
}
