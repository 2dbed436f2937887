//! Chrome DevTools Protocol adapter implementation

use crate::{Engine, EngineConfig, EngineFactory, Error, PdfOptions, Result, SettleConfig};
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::types::{Event, Method};
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const NETWORK_POLL_INTERVAL: Duration = Duration::from_millis(50);

// Resolves once the document's load event has fired and, when asked, web
// fonts are ready. Evaluated with promise awaiting, bounded by the tab timeout.
const SETTLE_SCRIPT: &str = r#"(async function(waitForFonts){
    if (document.readyState !== 'complete') {
        await new Promise(function(resolve){
            window.addEventListener('load', resolve, { once: true });
        });
    }
    if (waitForFonts && document.fonts && document.fonts.ready) {
        await document.fonts.ready;
    }
    return document.readyState;
})"#;

/// `Network.enable` with every buffer limit left at Chrome's default
#[derive(Debug, Serialize)]
struct EnableNetwork {}

impl Method for EnableNetwork {
    const NAME: &'static str = "Network.enable";
    type ReturnObject = Value;
}

/// `Page.printToPDF` with a raw parameter object, so keys the typed binding
/// does not know still reach Chrome
#[derive(Debug, Serialize)]
#[serde(transparent)]
struct PrintToPdf(Value);

impl Method for PrintToPdf {
    const NAME: &'static str = "Page.printToPDF";
    type ReturnObject = Page::PrintToPDFReturnObject;
}

/// Requests the tab has started but not yet finished or failed
#[derive(Debug)]
struct NetworkActivity {
    in_flight: HashSet<String>,
    last_change: Instant,
}

impl NetworkActivity {
    fn new(now: Instant) -> Self {
        Self {
            in_flight: HashSet::new(),
            last_change: now,
        }
    }

    fn started(&mut self, request_id: &str, now: Instant) {
        // Redirects reuse the request id
        self.in_flight.insert(request_id.to_string());
        self.last_change = now;
    }

    fn finished(&mut self, request_id: &str, now: Instant) {
        self.in_flight.remove(request_id);
        self.last_change = now;
    }

    fn touch(&mut self, now: Instant) {
        self.last_change = now;
    }

    fn is_idle(&self, window: Duration, now: Instant) -> bool {
        self.in_flight.is_empty() && now.saturating_duration_since(self.last_change) >= window
    }
}

/// CDP-based engine implementation (uses the `headless_chrome` crate)
///
/// Each value launches its own headless Chrome process with a single tab.
/// Dropping or closing the engine terminates that process.
pub struct CdpEngine {
    browser: Browser,
    tab: Arc<Tab>,
    network: Arc<Mutex<NetworkActivity>>,
    timeout: Duration,
}

impl CdpEngine {
    /// Launch headless Chrome and open the tab documents are rendered in.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let mut args: Vec<&OsStr> = Vec::new();
        if !config.sandbox {
            args.push(OsStr::new("--disable-setuid-sandbox"));
        }

        // Configure headless Chrome launch options
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(config.sandbox)
            .path(config.chrome_path.clone())
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .idle_browser_timeout(config.timeout())
            .args(args)
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        // Launch the browser
        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;

        // The engine's own wait limit for every call made through this tab
        tab.set_default_timeout(config.timeout());

        tab.call_method(EnableNetwork {})
            .map_err(|e| Error::InitializationError(format!("Failed to enable network events: {}", e)))?;

        let network = Arc::new(Mutex::new(NetworkActivity::new(Instant::now())));
        let tracker = Arc::clone(&network);
        tab.add_event_listener(Arc::new(move |event: &Event| {
            let Ok(mut activity) = tracker.lock() else {
                return;
            };
            let now = Instant::now();
            match event {
                Event::NetworkRequestWillBeSent(e) => activity.started(&e.params.request_id, now),
                Event::NetworkLoadingFinished(e) => activity.finished(&e.params.request_id, now),
                Event::NetworkLoadingFailed(e) => activity.finished(&e.params.request_id, now),
                _ => {}
            }
        }))
        .map_err(|e| Error::InitializationError(format!("Failed to watch network events: {}", e)))?;

        Ok(Self {
            browser,
            tab,
            network,
            timeout: config.timeout(),
        })
    }

    /// Block until no request has been in flight for `window`, or fail once
    /// the engine timeout has passed.
    fn wait_for_network_idle(&self, window: Duration) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let now = Instant::now();
            let pending = {
                let activity = self
                    .network
                    .lock()
                    .map_err(|_| Error::SettleError("Network tracker is poisoned".into()))?;
                if activity.is_idle(window, now) {
                    return Ok(());
                }
                activity.in_flight.len()
            };
            if now >= deadline {
                return Err(Error::SettleError(format!(
                    "Network not idle after {} ms ({} requests in flight)",
                    self.timeout.as_millis(),
                    pending
                )));
            }
            std::thread::sleep(NETWORK_POLL_INTERVAL);
        }
    }
}

impl Engine for CdpEngine {
    fn load_html(&mut self, html: &str) -> Result<()> {
        self.tab
            .navigate_to("about:blank")
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;

        let tree = self
            .tab
            .call_method(Page::GetFrameTree(None))
            .map_err(|e| Error::LoadError(format!("Failed to get frame tree: {}", e)))?;

        self.tab
            .call_method(Page::SetDocumentContent {
                frame_id: tree.frame_tree.frame.id,
                html: html.to_string(),
            })
            .map_err(|e| Error::LoadError(format!("Failed to set document content: {}", e)))?;

        // The quiet window starts once the markup is in place
        if let Ok(mut activity) = self.network.lock() {
            activity.touch(Instant::now());
        }
        Ok(())
    }

    fn wait_until_settled(&mut self, settle: &SettleConfig) -> Result<()> {
        self.wait_for_network_idle(settle.network_idle())?;
        debug!("Network idle for {} ms", settle.network_idle_ms);

        let script = format!("{}({})", SETTLE_SCRIPT, settle.wait_for_fonts);
        let state = self
            .tab
            .evaluate(&script, true)
            .map_err(|e| Error::SettleError(format!("Readiness wait failed: {}", e)))?;
        debug!("Document settled with readyState {:?}", state.value);

        // Absorb late layout shifts
        if settle.grace_ms > 0 {
            std::thread::sleep(settle.grace());
        }
        Ok(())
    }

    fn print_pdf(&mut self, options: &PdfOptions) -> Result<Vec<u8>> {
        let printed = self
            .tab
            .call_method(PrintToPdf(options.to_print_params()))
            .map_err(|e| Error::RenderError(format!("Print to PDF failed: {}", e)))?;

        base64::engine::general_purpose::STANDARD
            .decode(printed.data)
            .map_err(|e| Error::RenderError(format!("Failed to decode PDF data: {}", e)))
    }

    fn close(self) -> Result<()> {
        let closed = self
            .tab
            .close(false)
            .map(|_| ())
            .map_err(Error::from);

        // Dropping the browser terminates the child process
        drop(self.tab);
        drop(self.browser);
        closed
    }
}

/// Launches one `CdpEngine` per conversion
#[derive(Debug, Clone, Default)]
pub struct CdpFactory {
    config: EngineConfig,
}

impl CdpFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl EngineFactory for CdpFactory {
    type Engine = CdpEngine;

    fn launch(&self) -> Result<CdpEngine> {
        CdpEngine::new(&self.config)
    }

    fn settle(&self) -> SettleConfig {
        self.config.settle
    }
}
