use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};

const START_TIMEOUT: Duration = Duration::from_secs(600);
const JOB_TIMEOUT: Duration = Duration::from_secs(600);
const LAUNCH_ARGS: [&str; 3] = ["--no-sandbox", "--disable-dev-shm-usage", "--disable-gpu"];

type Job = oneshot::Sender<Result<Page>>;

/// A Chromium instance launched once on a dedicated background runtime and
/// reused for every clinic's scrape, so the scheduler never re-pays
/// Chromium's multi-second cold start (`browser_pool.py`).
pub struct BrowserPool {
    job_tx: mpsc::UnboundedSender<Job>,
    ready: Arc<AtomicBool>,
    started_at: Instant,
}

static POOL: OnceLock<BrowserPool> = OnceLock::new();

impl BrowserPool {
    /// Spawns the background thread and kicks off the Chromium launch.
    /// Idempotent: a second call returns the already-running pool.
    pub fn init(headless: bool) -> &'static BrowserPool {
        POOL.get_or_init(|| {
            let (job_tx, job_rx) = mpsc::unbounded_channel::<Job>();
            let ready = Arc::new(AtomicBool::new(false));
            let ready_for_thread = ready.clone();

            std::thread::Builder::new()
                .name("browser-pool".to_string())
                .spawn(move || {
                    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
                        Ok(rt) => rt,
                        Err(e) => {
                            log::error!("[browser-pool] failed to build runtime: {e}");
                            return;
                        }
                    };
                    runtime.block_on(Self::run_loop(headless, job_rx, ready_for_thread));
                })
                .expect("failed to spawn browser-pool thread");

            BrowserPool { job_tx, ready, started_at: Instant::now() }
        })
    }

    pub fn global() -> Option<&'static BrowserPool> {
        POOL.get()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Requests a new page from the pooled browser, bounded by a 10-minute
    /// timeout mirroring the original's `future.result(timeout=600)`.
    pub async fn new_page(&self) -> Result<Page> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.job_tx.send(reply_tx).map_err(|_| Error::BrowserLaunch("pool event loop has shut down".to_string()))?;

        match tokio::time::timeout(JOB_TIMEOUT, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::BrowserLaunch("pool event loop dropped the reply channel".to_string())),
            Err(_) => Err(Error::BrowserPoolTimeout(JOB_TIMEOUT)),
        }
    }

    async fn run_loop(headless: bool, mut job_rx: mpsc::UnboundedReceiver<Job>, ready: Arc<AtomicBool>) {
        log::info!("[browser-pool] launching chromium (headless={headless})...");
        let t0 = Instant::now();

        let mut builder = BrowserConfig::builder().args(LAUNCH_ARGS);
        if !headless {
            builder = builder.with_head();
        }
        let config = match builder.build() {
            Ok(cfg) => cfg,
            Err(e) => {
                log::error!("[browser-pool] failed to build browser config: {e}");
                return;
            }
        };

        let (browser, mut handler) = match Browser::launch(config).await {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("[browser-pool] chromium launch failed: {e}");
                return;
            }
        };
        log::info!("[browser-pool] chromium ready ({:.1}s)", t0.elapsed().as_secs_f64());
        ready.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            while let Some(event) = futures::StreamExt::next(&mut handler).await {
                if let Err(e) = event {
                    log::warn!("[browser-pool] handler event error: {e}");
                }
            }
        });

        while let Some(reply) = job_rx.recv().await {
            let result = browser.new_page("about:blank").await.map_err(|e| Error::BrowserLaunch(e.to_string()));
            let _ = reply.send(result);
        }

        log::info!("[browser-pool] job channel closed, shutting down");
    }

    pub fn elapsed_since_start(&self) -> Duration {
        self.started_at.elapsed()
    }
}

pub const STARTUP_TIMEOUT: Duration = START_TIMEOUT;
