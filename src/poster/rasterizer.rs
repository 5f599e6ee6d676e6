//! Headless Chromium rasterization.
//!
//! Every capture launches its own browser, loads the rendered HTML into a blank page, waits
//! for `document.readyState == "complete"` plus a short settle delay, and prints the page to
//! PDF or takes a full-page PNG screenshot. The browser lives inside a [`BrowserSession`]
//! guard, so it is torn down on every exit path, including a dropped future after a timeout
//! or a client disconnect.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, PrintToPdfParams, SetDocumentContentParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::storage::{ArtifactKind, ArtifactStore};

/// A4 portrait in inches, as expected by `Page.printToPDF`.
const A4_WIDTH_IN: f64 = 8.27;
const A4_HEIGHT_IN: f64 = 11.69;
/// A4 at 96 dpi.
const VIEWPORT: (u32, u32) = (794, 1123);
const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("invalid browser configuration: {0}")]
    Config(String),
    #[error("failed to launch browser: {0}")]
    Launch(#[source] CdpError),
    #[error("failed to load document: {0}")]
    Load(#[source] CdpError),
    #[error("document never reached readyState 'complete' within {0:?}")]
    NotReady(Duration),
    #[error("failed to capture artifact: {0}")]
    Capture(#[source] CdpError),
    #[error("browser returned an empty artifact")]
    EmptyOutput,
    #[error("failed to write artifact: {0}")]
    Persist(#[source] std::io::Error),
    #[error("rasterization exceeded {0:?}")]
    TimedOut(Duration),
}

impl From<RasterError> for AppError {
    fn from(err: RasterError) -> Self {
        match err {
            RasterError::TimedOut(_) => AppError::render_timeout(),
            _ => AppError::rasterization("failed to produce the poster artifact"),
        }
    }
}

/// Turns HTML into artifact bytes.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn capture(&self, html: &str, kind: ArtifactKind) -> Result<Vec<u8>, RasterError>;
}

/// Capture `html` under `deadline` and write it to the artifact store.
///
/// The returned path only exists once the whole capture succeeded; a timeout drops the
/// in-flight capture, which tears its browser down.
pub async fn rasterize_to_file(
    rasterizer: &dyn Rasterizer,
    store: &ArtifactStore,
    html: &str,
    business_name: &str,
    kind: ArtifactKind,
    deadline: Duration,
) -> Result<PathBuf, RasterError> {
    let bytes = tokio::time::timeout(deadline, rasterizer.capture(html, kind))
        .await
        .map_err(|_| RasterError::TimedOut(deadline))??;

    if bytes.is_empty() {
        return Err(RasterError::EmptyOutput);
    }

    store
        .persist(business_name, kind, bytes)
        .await
        .map_err(RasterError::Persist)
}

/// Chromium driven over the DevTools protocol.
#[derive(Debug, Clone)]
pub struct ChromeRasterizer {
    chrome_executable: Option<PathBuf>,
    settle: Duration,
    ready_timeout: Duration,
}

impl ChromeRasterizer {
    pub fn new(chrome_executable: Option<PathBuf>, settle: Duration, ready_timeout: Duration) -> Self {
        Self {
            chrome_executable,
            settle,
            ready_timeout,
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig, RasterError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(VIEWPORT.0, VIEWPORT.1);
        if let Some(path) = &self.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(RasterError::Config)
    }
}

#[async_trait]
impl Rasterizer for ChromeRasterizer {
    async fn capture(&self, html: &str, kind: ArtifactKind) -> Result<Vec<u8>, RasterError> {
        let mut session = BrowserSession::launch(self.browser_config()?).await?;

        let result: Result<Vec<u8>, RasterError> = async {
            let page = load_document(&session.browser, html).await?;
            wait_until_complete(&page, self.ready_timeout).await?;
            tokio::time::sleep(self.settle).await;
            capture_page(&page, kind).await
        }
        .await;

        session.close().await;
        result
    }
}

/// Owns one browser process and its CDP event loop.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(config: BrowserConfig) -> Result<Self, RasterError> {
        let (browser, mut handler) = Browser::launch(config).await.map_err(RasterError::Launch)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Browser event loop stopped: {}", e);
                    break;
                }
            }
        });

        Ok(Self { browser, handler })
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            log::warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            log::warn!("Failed to reap browser process: {}", e);
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Dropping `Browser` kills the child process if it is still running.
        self.handler.abort();
    }
}

async fn load_document(browser: &Browser, html: &str) -> Result<Page, RasterError> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(RasterError::Load)?;

    let frame_id = page
        .mainframe()
        .await
        .map_err(RasterError::Load)?
        .ok_or(RasterError::Load(CdpError::NotFound))?;

    page.execute(SetDocumentContentParams::new(frame_id, html))
        .await
        .map_err(RasterError::Load)?;

    Ok(page)
}

async fn wait_until_complete(page: &Page, limit: Duration) -> Result<(), RasterError> {
    let poll = async {
        loop {
            let state = page
                .evaluate("document.readyState")
                .await
                .map_err(RasterError::Load)?
                .into_value::<String>()
                .unwrap_or_default();
            if state == "complete" {
                return Ok::<(), RasterError>(());
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    };

    tokio::time::timeout(limit, poll)
        .await
        .map_err(|_| RasterError::NotReady(limit))?
}

async fn capture_page(page: &Page, kind: ArtifactKind) -> Result<Vec<u8>, RasterError> {
    match kind {
        ArtifactKind::Pdf => page
            .pdf(pdf_params())
            .await
            .map_err(RasterError::Capture),
        ArtifactKind::Png => page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
            )
            .await
            .map_err(RasterError::Capture),
    }
}

/// A4 portrait, zero margins; the layout's CSS owns all spacing.
pub fn pdf_params() -> PrintToPdfParams {
    PrintToPdfParams {
        landscape: Some(false),
        print_background: Some(true),
        prefer_css_page_size: Some(true),
        paper_width: Some(A4_WIDTH_IN),
        paper_height: Some(A4_HEIGHT_IN),
        margin_top: Some(0.0),
        margin_bottom: Some(0.0),
        margin_left: Some(0.0),
        margin_right: Some(0.0),
        ..Default::default()
    }
}

/// Whether a Chromium binary is configured or discoverable on this host.
pub fn chrome_available(configured: Option<&Path>) -> bool {
    match configured {
        Some(path) => path.exists(),
        None => BrowserConfig::builder().build().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticRasterizer(Vec<u8>);

    #[async_trait]
    impl Rasterizer for StaticRasterizer {
        async fn capture(&self, _html: &str, _kind: ArtifactKind) -> Result<Vec<u8>, RasterError> {
            Ok(self.0.clone())
        }
    }

    struct StalledRasterizer;

    #[async_trait]
    impl Rasterizer for StalledRasterizer {
        async fn capture(&self, _html: &str, _kind: ArtifactKind) -> Result<Vec<u8>, RasterError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(b"late".to_vec())
        }
    }

    #[test]
    fn test_pdf_params_zero_margins() {
        let params = pdf_params();
        assert_eq!(params.margin_top, Some(0.0));
        assert_eq!(params.margin_left, Some(0.0));
        assert_eq!(params.print_background, Some(true));
        assert_eq!(params.landscape, Some(false));
    }

    #[test]
    fn test_timeout_maps_to_retryable_error() {
        let err: AppError = RasterError::TimedOut(Duration::from_secs(1)).into();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_rasterize_to_file_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = rasterize_to_file(
            &StaticRasterizer(b"%PDF-1.7".to_vec()),
            &store,
            "<html></html>",
            "Acme",
            ArtifactKind::Pdf,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_empty_output_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let result = rasterize_to_file(
            &StaticRasterizer(Vec::new()),
            &store,
            "<html></html>",
            "Acme",
            ArtifactKind::Png,
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(result, Err(RasterError::EmptyOutput)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_deadline_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let result = rasterize_to_file(
            &StalledRasterizer,
            &store,
            "<html></html>",
            "Acme",
            ArtifactKind::Pdf,
            Duration::from_millis(20),
        )
        .await;

        assert!(matches!(result, Err(RasterError::TimedOut(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    #[ignore = "requires a local Chromium installation"]
    async fn test_chrome_prints_pdf() {
        let rasterizer =
            ChromeRasterizer::new(None, Duration::from_millis(100), Duration::from_secs(10));
        let bytes = rasterizer
            .capture("<html><body><h1>Acme</h1></body></html>", ArtifactKind::Pdf)
            .await
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
