//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use addhandler::config::AppConfig;
use addhandler::http::HttpServer;
use addhandler::lifecycle::Shutdown;
use addhandler::routing::LiveRoutes;
use addhandler::PLUGIN_PRELUDE;

/// A running server on an ephemeral port with its own workspace root.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub routes: Arc<LiveRoutes>,
    _workspace_root: tempfile::TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a server whose workspaces live in a temp dir removed with the server.
pub async fn start_server() -> TestServer {
    let workspace_root = tempfile::tempdir().unwrap();

    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.build.workspace_root = Some(workspace_root.path().to_path_buf());
    config.build.timeout_secs = 120;
    config.security.request_timeout_secs = 300;
    config.observability.metrics_enabled = false;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, &shutdown).unwrap();
    let routes = server.routes();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (_, config_updates) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    TestServer {
        addr,
        shutdown,
        routes,
        _workspace_root: workspace_root,
    }
}

/// Client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

/// Whether a compiler is available; tests that build real plugins skip without one.
pub fn rustc_available() -> bool {
    let available = std::process::Command::new("rustc")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if !available {
        eprintln!("rustc not found on PATH, skipping");
    }
    available
}

/// Program source with the handler prelude prepended.
pub fn with_prelude(body: &str) -> String {
    format!("{}\n{}", PLUGIN_PRELUDE, body)
}

/// Handler program whose response body is `text`.
pub fn writes(text: &str) -> String {
    with_prelude(&format!(
        r#"
fn handle(w: &mut ResponseWriter, _r: &Request) {{
    w.write(b"{}");
}}

export_handler!(handle);
"#,
        text
    ))
}

/// POST a program to `/addhandler`.
pub async fn submit(client: &reqwest::Client, server: &TestServer, program: &str) -> reqwest::Response {
    client
        .post(server.url("/addhandler"))
        .form(&[("program", program)])
        .send()
        .await
        .expect("server unreachable")
}

/// Location header of a redirect response.
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("redirect without Location")
        .to_str()
        .unwrap()
        .to_string()
}
