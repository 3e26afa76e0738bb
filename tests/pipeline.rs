//! End-to-end submission tests against a real server and a real compiler.

mod common;

use common::{client, location, rustc_available, start_server, submit, with_prelude, writes};
use reqwest::StatusCode;

#[tokio::test]
async fn test_submitted_handler_is_served_at_redirect_target() {
    if !rustc_available() {
        return;
    }
    let server = start_server().await;
    let client = client();

    let response = submit(&client, &server, &writes("hi")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let route = location(&response);
    assert!(route.starts_with("/addhandler"), "unexpected route {route}");
    assert!(route.ends_with(&format!("/{}", libloading::library_filename("handler").to_string_lossy())));

    let served = client.get(server.url(&route)).send().await.unwrap();
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(served.text().await.unwrap(), "hi");

    let listing = client.get(server.url("/")).send().await.unwrap().text().await.unwrap();
    assert!(listing.contains(&route));
    assert!(listing.contains("Registered handlers (1)"));
}

#[tokio::test]
async fn test_handler_sees_request_and_controls_response() {
    if !rustc_available() {
        return;
    }
    let server = start_server().await;
    let client = client();

    let program = with_prelude(
        r#"
fn echo(w: &mut ResponseWriter, r: &Request) {
    w.set_header("content-type", "text/plain");
    w.write_header(201);
    let line = format!("{} {} {} {}|", r.method(), r.path(), r.query(), r.header("x-test").unwrap_or("-"));
    w.write(line.as_bytes());
    w.write(r.body());
}

export_handler!(echo);
"#,
    );
    let response = submit(&client, &server, &program).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let route = location(&response);

    let served = client
        .put(server.url(&format!("{route}?a=1")))
        .header("x-test", "yes")
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(served.status(), StatusCode::CREATED);
    assert_eq!(served.headers()["content-type"], "text/plain");
    assert_eq!(served.text().await.unwrap(), format!("PUT {route} a=1 yes|payload"));
}

#[tokio::test]
async fn test_compile_error_returns_compiler_output_verbatim() {
    if !rustc_available() {
        return;
    }
    let server = start_server().await;
    let client = client();
    let program = "fn broken( {\n";

    let response = submit(&client, &server, program).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.text().await.unwrap();

    // Same invocation by hand, in a directory of our own.
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.rs"), program).unwrap();
    let output = std::process::Command::new("rustc")
        .current_dir(dir.path())
        .args(["--crate-type", "cdylib", "--edition", "2021", "--crate-name", "handler", "-o"])
        .arg(libloading::library_filename("handler"))
        .args(["main.rs", "-C", "opt-level=1"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let mut expected = output.stdout;
    expected.extend_from_slice(&output.stderr);

    assert_eq!(body, String::from_utf8_lossy(&expected));
    assert!(server.routes.is_empty());
}

#[tokio::test]
async fn test_missing_export_is_symbol_not_found() {
    if !rustc_available() {
        return;
    }
    let server = start_server().await;
    let client = client();

    let response = submit(&client, &server, &with_prelude("pub fn unused() {}\n")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.text().await.unwrap();
    assert!(body.starts_with("symbol H not found in "), "{body}");
    assert!(server.routes.is_empty());
}

#[tokio::test]
async fn test_function_named_h_is_type_mismatch() {
    if !rustc_available() {
        return;
    }
    let server = start_server().await;
    let client = client();

    let program = "#[no_mangle]\npub extern \"C\" fn H() {}\n";
    let response = submit(&client, &server, program).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.text().await.unwrap();
    assert!(body.starts_with("H has shape <not a handler descriptor"), "{body}");
    assert!(body.ends_with("expected extern \"C\" fn(*mut ResponseWriter, *const Request)"));
    assert!(server.routes.is_empty());
}

#[tokio::test]
async fn test_descriptor_with_wrong_shape_is_type_mismatch() {
    if !rustc_available() {
        return;
    }
    let server = start_server().await;
    let client = client();

    let program = with_prelude(
        r#"
#[no_mangle]
pub static H: HandlerExport = HandlerExport {
    magic: HANDLER_MAGIC,
    abi_version: ABI_VERSION,
    shape: c"fn(Request) -> Response".as_ptr(),
    handle: None,
};
"#,
    );
    let response = submit(&client, &server, &program).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.text().await.unwrap(),
        "H has shape fn(Request) -> Response, expected extern \"C\" fn(*mut ResponseWriter, *const Request)"
    );

    let listing = client.get(server.url("/")).send().await.unwrap().text().await.unwrap();
    assert!(listing.contains("Registered handlers (0)"));
}

#[tokio::test]
async fn test_failed_submission_does_not_disturb_existing_routes() {
    if !rustc_available() {
        return;
    }
    let server = start_server().await;
    let client = client();

    let route = location(&submit(&client, &server, &writes("first")).await);
    let failed = submit(&client, &server, "not rust at all").await;
    assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let served = client.get(server.url(&route)).send().await.unwrap();
    assert_eq!(served.text().await.unwrap(), "first");
    assert_eq!(server.routes.len(), 1);
}

#[tokio::test]
async fn test_panicking_handler_fails_only_its_own_request() {
    if !rustc_available() {
        return;
    }
    let server = start_server().await;
    let client = client();

    let healthy = location(&submit(&client, &server, &writes("still here")).await);
    let program = with_prelude(
        r#"
fn boom(w: &mut ResponseWriter, _r: &Request) {
    w.set_header("x-partial", "yes");
    panic!("boom");
}

export_handler!(boom);
"#,
    );
    let response = submit(&client, &server, &program).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let panicking = location(&response);

    for _ in 0..2 {
        let failed = client.get(server.url(&panicking)).send().await.unwrap();
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let served = client.get(server.url(&healthy)).send().await.unwrap();
        assert_eq!(served.status(), StatusCode::OK);
        assert_eq!(served.text().await.unwrap(), "still here");
    }
    assert_eq!(server.routes.len(), 2);
}
