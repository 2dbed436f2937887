use crate::{Engine, EngineFactory, Error, PdfOptions, Result, SettleConfig};
use log::{debug, warn};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

enum Command {
    LoadHtml(String, oneshot::Sender<Result<()>>),
    Settle(SettleConfig, oneshot::Sender<Result<()>>),
    PrintPdf(Box<PdfOptions>, oneshot::Sender<Result<Vec<u8>>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async handle to one engine instance running on a dedicated worker thread.
///
/// The worker thread creates and owns the engine, executing commands sent
/// from async tasks, so callers get an async interface over a blocking engine.
/// The session is the engine's only owner: dropping it (on any path, including
/// a dropped request future) disconnects the worker, which then finishes the
/// command in flight and closes the engine.
pub struct RenderSession {
    cmd_tx: Sender<Command>,
}

impl RenderSession {
    /// Launch a fresh engine from `factory` on a new worker thread.
    pub async fn launch<F: EngineFactory>(factory: Arc<F>) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) =
            oneshot::channel();

        thread::Builder::new()
            .name("rfpdf-engine".to_string())
            .spawn(move || {
                let mut engine = match factory.launch() {
                    Ok(e) => e,
                    Err(err) => {
                        let _ = init_tx.send(Err(err));
                        return;
                    }
                };
                debug!("Engine launched");

                // Signal successful creation (no-op when the caller is gone)
                let _ = init_tx.send(Ok(()));

                let mut close_resp = None;
                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        Command::LoadHtml(html, resp) => {
                            let _ = resp.send(engine.load_html(&html));
                        }
                        Command::Settle(settle, resp) => {
                            let _ = resp.send(engine.wait_until_settled(&settle));
                        }
                        Command::PrintPdf(options, resp) => {
                            let _ = resp.send(engine.print_pdf(&options));
                        }
                        Command::Close(resp) => {
                            close_resp = Some(resp);
                            break;
                        }
                    }
                }

                // Reached on explicit close and when the session was dropped
                let res = engine.close();
                debug!("Engine closed");
                match close_resp {
                    Some(resp) => {
                        let _ = resp.send(res);
                    }
                    None => {
                        if let Err(e) = res {
                            warn!("Failed to close engine of a dropped session: {}", e);
                        }
                    }
                }
            })
            .map_err(|e| Error::WorkerError(format!("Failed to spawn engine worker: {}", e)))?;

        // Wait for the worker to report initialization success or failure
        let init_res = init_rx
            .await
            .map_err(|e| Error::WorkerError(format!("Worker init canceled: {}", e)))?;
        init_res?;

        Ok(Self { cmd_tx })
    }

    /// Load markup into the engine's page
    pub async fn load_html(&self, html: &str) -> Result<()> {
        let html = html.to_string();
        self.request("LoadHtml", |tx| Command::LoadHtml(html, tx)).await
    }

    /// Wait until the loaded document has settled
    pub async fn wait_until_settled(&self, settle: SettleConfig) -> Result<()> {
        self.request("Settle", |tx| Command::Settle(settle, tx)).await
    }

    /// Print the current document to PDF bytes
    pub async fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>> {
        let options = Box::new(options.clone());
        self.request("PrintPdf", |tx| Command::PrintPdf(options, tx)).await
    }

    /// Close the engine and wait for the worker to report the outcome.
    pub async fn close(self) -> Result<()> {
        self.request("Close", Command::Close).await
    }

    async fn request<T>(
        &self,
        name: &str,
        command: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(command(tx));
        rx.await
            .map_err(|e| Error::WorkerError(format!("{} canceled: {}", name, e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Counters {
        launched: AtomicUsize,
        closed: AtomicUsize,
    }

    struct CountingFactory {
        counters: Arc<Counters>,
        fail_launch: bool,
    }

    struct CountingEngine {
        counters: Arc<Counters>,
        html: String,
    }

    impl Engine for CountingEngine {
        fn load_html(&mut self, html: &str) -> Result<()> {
            self.html = html.to_string();
            Ok(())
        }

        fn wait_until_settled(&mut self, _settle: &SettleConfig) -> Result<()> {
            Ok(())
        }

        fn print_pdf(&mut self, _options: &PdfOptions) -> Result<Vec<u8>> {
            Ok(self.html.clone().into_bytes())
        }

        fn close(self) -> Result<()> {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl EngineFactory for CountingFactory {
        type Engine = CountingEngine;

        fn launch(&self) -> Result<CountingEngine> {
            if self.fail_launch {
                return Err(Error::InitializationError("no browser".into()));
            }
            self.counters.launched.fetch_add(1, Ordering::SeqCst);
            Ok(CountingEngine {
                counters: self.counters.clone(),
                html: String::new(),
            })
        }
    }

    fn factory(fail_launch: bool) -> (Arc<CountingFactory>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let factory = Arc::new(CountingFactory {
            counters: counters.clone(),
            fail_launch,
        });
        (factory, counters)
    }

    async fn wait_for_closed(counters: &Counters, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while counters.closed.load(Ordering::SeqCst) < expected && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_session_round_trip_and_explicit_close() {
        let (factory, counters) = factory(false);
        let session = RenderSession::launch(factory).await.unwrap();
        session.load_html("<p>hello</p>").await.unwrap();
        session
            .wait_until_settled(SettleConfig::default())
            .await
            .unwrap();
        let bytes = session.print_pdf(&PdfOptions::default()).await.unwrap();
        assert_eq!(bytes, b"<p>hello</p>".to_vec());

        session.close().await.unwrap();
        assert_eq!(counters.launched.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_session_closes_engine() {
        let (factory, counters) = factory(false);
        let session = RenderSession::launch(factory).await.unwrap();
        session.load_html("<p>bye</p>").await.unwrap();
        drop(session);

        wait_for_closed(&counters, 1).await;
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_is_reported() {
        let (factory, counters) = factory(true);
        let err = RenderSession::launch(factory).await.err().unwrap();
        assert!(matches!(err, Error::InitializationError(_)));
        assert_eq!(counters.launched.load(Ordering::SeqCst), 0);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 0);
    }
}
