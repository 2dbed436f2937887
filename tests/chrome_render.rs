//! End-to-end rendering through headless Chrome

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

use rfpdf::cdp::CdpFactory;
use rfpdf::{convert, ConversionRequest, EngineConfig, SettleConfig};
use serde_json::json;
use tiny_http::{Response, Server};

static INIT: Once = Once::new();
static STYLESHEET_SERVED: AtomicBool = AtomicBool::new(false);
static LATE_FETCH_SERVED: AtomicBool = AtomicBool::new(false);

/// Serve a stylesheet the rendered markup links to
fn start_asset_server() -> String {
    INIT.call_once(|| {
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18090").unwrap();
            for request in server.incoming_requests() {
                let response = if request.url().ends_with("/style.css") {
                    STYLESHEET_SERVED.store(true, Ordering::SeqCst);
                    Response::from_string("h1 { color: #c00; font-size: 48px; }").with_header(
                        "Content-Type: text/css"
                            .parse::<tiny_http::Header>()
                            .unwrap(),
                    )
                } else if request.url().ends_with("/slow") {
                    // Answered well after the load event and the grace delay
                    std::thread::sleep(std::time::Duration::from_millis(1500));
                    LATE_FETCH_SERVED.store(true, Ordering::SeqCst);
                    Response::from_string("late content").with_header(
                        "Access-Control-Allow-Origin: *"
                            .parse::<tiny_http::Header>()
                            .unwrap(),
                    )
                } else {
                    Response::from_string("Not Found").with_status_code(404)
                };
                let _ = request.respond(response);
            }
        });
        // Give the server time to start
        std::thread::sleep(std::time::Duration::from_millis(100));
    });

    "http://127.0.0.1:18090".to_string()
}

fn factory() -> Arc<CdpFactory> {
    Arc::new(CdpFactory::new(EngineConfig {
        settle: SettleConfig {
            grace_ms: 100,
            ..SettleConfig::default()
        },
        ..Default::default()
    }))
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_convert_minimal_html() {
    let request = ConversionRequest::from_html("<html><body>Hi</body></html>");
    let document = convert(&factory(), &request).await.expect("conversion failed");

    assert!(document.len() > 100, "PDF seems too small");
    assert!(document.as_bytes().starts_with(b"%PDF"));
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_linked_stylesheet_is_loaded_before_printing() {
    let base = start_asset_server();
    let html = format!(
        r#"<html><head><link rel="stylesheet" href="{}/style.css"></head><body><h1>Styled</h1></body></html>"#,
        base
    );
    let request = ConversionRequest::from_html(html);
    let document = convert(&factory(), &request).await.expect("conversion failed");

    assert!(document.as_bytes().starts_with(b"%PDF"));
    assert!(STYLESHEET_SERVED.load(Ordering::SeqCst));
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_requests_started_after_load_are_awaited() {
    let base = start_asset_server();
    let html = format!(
        r#"<html><body><script>
            setTimeout(function() {{
                fetch("{}/slow").then(r => r.text()).then(t => document.body.append(t));
            }}, 0);
        </script></body></html>"#,
        base
    );
    let request = ConversionRequest::from_html(html);
    let document = convert(&factory(), &request).await.expect("conversion failed");

    assert!(document.as_bytes().starts_with(b"%PDF"));
    assert!(LATE_FETCH_SERVED.load(Ordering::SeqCst));
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_letter_and_a4_differ() {
    let html = "<html><body><p>page</p></body></html>";
    let a4 = convert(&factory(), &ConversionRequest::from_html(html))
        .await
        .expect("A4 conversion failed");
    let letter = convert(
        &factory(),
        &ConversionRequest::from_html(html).with_option("format", json!("Letter")),
    )
    .await
    .expect("Letter conversion failed");

    // Letter pages are 612x792pt
    let has_letter_box = |bytes: &[u8]| bytes.windows(7).any(|w| w == b"612 792");
    assert!(has_letter_box(letter.as_bytes()));
    assert!(!has_letter_box(a4.as_bytes()));
}
