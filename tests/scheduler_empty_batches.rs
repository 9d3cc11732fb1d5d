//! Integration coverage for the Scraper Scheduler's degenerate cases
//! that don't require a live browser: an empty clinic list for a
//! back-end must short-circuit to an empty observation map without
//! touching the pool at all.

use std::collections::HashMap;

use dent_slot_harvester::browser::BrowserPool;
use dent_slot_harvester::domain::clinic::Clinic;
use dent_slot_harvester::scheduler::{scrape_all, scrape_both_systems};

#[tokio::test]
async fn scrape_all_with_no_clinics_returns_empty_map() {
    // `BrowserPool::init` only spawns the background thread and returns;
    // it does not block on the Chromium launch, so this is safe to call
    // even though nothing here ever reaches `pool.new_page()`.
    let pool = BrowserPool::init(true);
    let clinics: Vec<Clinic> = Vec::new();
    let credentials = HashMap::new();
    let disabled_staff = HashMap::new();

    let result = scrape_all(pool, clinics, &credentials, Vec::new(), &disabled_staff, 5).await;

    assert!(result.is_empty());
}

#[tokio::test]
async fn scrape_both_systems_with_no_clinics_in_either_backend_returns_two_empty_maps() {
    let pool = BrowserPool::init(true);
    let credentials = HashMap::new();
    let disabled_staff = HashMap::new();

    let (legacy, spa) = scrape_both_systems(pool, Vec::new(), Vec::new(), &credentials, Vec::new(), &disabled_staff, 5).await;

    assert!(legacy.is_empty());
    assert!(spa.is_empty());
}
