//! Browser Pool: a headless Chromium instance launched once and reused
//! across every scrape, so the per-clinic scheduler never pays Chromium's
//! cold-start cost. Grounded on `browser_pool.py`'s dedicated event-loop
//! thread plus a submit/await bridge.

mod pool;

pub use pool::BrowserPool;
