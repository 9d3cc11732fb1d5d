//! The legacy nested-frame table back-end (`ts_timetable_week.php` style
//! sites): a doubly-framed schedule with `makeSlot(col,row)` anchors
//! marking free slots. The schedule grid itself lives inside a nested
//! `<iframe>`, so every read of it must run in that frame's own execution
//! context rather than the top-level document's — mirroring the
//! original's `frame.locator(...)`/`build_row_time_mapping(frame, ...)`.

use std::collections::HashMap;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::page::{CreateIsolatedWorldParams, FrameId, FrameTree, GetFrameTreeParams};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::adapters::ExtractionRules;
use crate::analysis::row_time_mapper::{build_row_time_map, lookup_minute, RowDescriptor};
use crate::domain::clinic::{Clinic, ClinicCredentials};
use crate::error::{Error, Result};

const NETWORK_IDLE_TIMEOUT: Duration = Duration::from_secs(10);
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);
const NEXT_DAY_TOKENS: [&str; 2] = ["翌日", "次の日"];
const FRAME_URL_MARKER: &str = "ts_timetable_week";
const NEW_SLOT_CLASS: &str = "new";
const NEW_SLOT_TEXT: &str = "新";
const HEADER_ROW_MARKER: &str = "d_info";
const DEFAULT_START_HOUR: i32 = 8;
const DEFAULT_START_MINUTE: i32 = 30;
const ISOLATED_WORLD_NAME: &str = "dent_slot_harvester_schedule_frame";

#[derive(Debug, Deserialize)]
struct RawRow {
    text: String,
    #[serde(rename = "hasLinks")]
    has_links: bool,
}

#[derive(Debug, Deserialize)]
struct RawHeaderCell {
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawAnchor {
    href: Option<String>,
}

#[derive(Default)]
pub struct LegacyTableAdapter;

impl LegacyTableAdapter {
    pub async fn login(&self, page: &Page, clinic: &Clinic, credentials: &ClinicCredentials) -> Result<bool> {
        page.goto(&clinic.url).await.map_err(|e| Error::PageOperation(e.to_string()))?;
        let _ = tokio::time::timeout(NAVIGATION_TIMEOUT, page.wait_for_navigation()).await;

        let id_input = page.find_element(r#"input[type="text"]"#).await.ok();
        let pass_input = page.find_element(r#"input[name="password"], input[type="password"]"#).await.ok();

        if let (Some(id_el), Some(pass_el)) = (id_input, pass_input) {
            id_el.click().await.map_err(|e| Error::PageOperation(e.to_string()))?;
            id_el.type_str(&credentials.id).await.map_err(|e| Error::PageOperation(e.to_string()))?;
            pass_el.click().await.map_err(|e| Error::PageOperation(e.to_string()))?;
            pass_el.type_str(&credentials.password).await.map_err(|e| Error::PageOperation(e.to_string()))?;

            if let Ok(submit) = page.find_element(r#"input[type="submit"], button[type="submit"], input[value="ログイン"]"#).await {
                submit.click().await.map_err(|e| Error::PageOperation(e.to_string()))?;
                let _ = tokio::time::timeout(NETWORK_IDLE_TIMEOUT, page.wait_for_navigation()).await;
            }
        }

        log::info!("login complete: {}", clinic.name);
        Ok(true)
    }

    pub async fn advance_to_tomorrow(&self, page: &Page) -> Result<bool> {
        if let Ok(button) = page.find_element(r#"input[value="翌日"]"#).await {
            button.click().await.map_err(|e| Error::PageOperation(e.to_string()))?;
            let _ = tokio::time::timeout(NETWORK_IDLE_TIMEOUT, page.wait_for_navigation()).await;
            return Ok(true);
        }

        for token in NEXT_DAY_TOKENS {
            let selector = format!(r#"a:has-text("{token}")"#);
            if let Ok(link) = page.find_element(&selector).await {
                link.click().await.map_err(|e| Error::PageOperation(e.to_string()))?;
                let _ = tokio::time::timeout(NETWORK_IDLE_TIMEOUT, page.wait_for_navigation()).await;
                return Ok(true);
            }
        }

        log::warn!("next-day control not found, proceeding with today's grid");
        Ok(false)
    }

    pub async fn extract(&self, page: &Page, rules: &ExtractionRules) -> Result<HashMap<String, Vec<i32>>> {
        let Some(frame_id) = self.locate_schedule_frame(page).await? else {
            log::warn!("schedule iframe not found");
            return Ok(HashMap::new());
        };

        let headers = self.column_headers(page, &frame_id, &rules.exclude_patterns, &rules.disabled_staff).await?;
        if headers.is_empty() {
            log::warn!("header extraction failed, no staff columns found");
            return Ok(HashMap::new());
        }

        let rows = self.fetch_rows(page, &frame_id).await?;
        let row_map = build_row_time_map(&rows, rules.slot_interval);

        let base_time_minutes = if row_map.is_empty() {
            self.detect_start_time(page, &frame_id).await.unwrap_or(DEFAULT_START_HOUR * 60 + DEFAULT_START_MINUTE)
        } else {
            0
        };

        let anchors = self.fetch_new_slot_anchors(page, &frame_id).await?;
        let re = Regex::new(r"makeSlot\((\d+),\s*(\d+)\)").expect("static pattern is valid");

        let mut doctor_slots: HashMap<String, Vec<i32>> = HashMap::new();
        let mut unmapped_cols = std::collections::BTreeSet::new();
        let mut unmapped_rows = std::collections::BTreeSet::new();

        for anchor in anchors {
            let Some(href) = anchor.href else { continue };
            let Some(caps) = re.captures(&href) else { continue };
            let col_idx: usize = caps[1].parse().unwrap_or(usize::MAX);
            let row_idx: usize = caps[2].parse().unwrap_or(usize::MAX);

            let time_minutes = if !row_map.is_empty() {
                match lookup_minute(&row_map, row_idx, rules.slot_interval) {
                    Some(t) => t,
                    None => continue,
                }
            } else {
                if !row_map.contains_key(&row_idx) {
                    unmapped_rows.insert(row_idx);
                }
                base_time_minutes + (row_idx as i32) * rules.slot_interval
            };

            let Some(staff_name) = headers.get(&col_idx) else {
                unmapped_cols.insert(col_idx);
                continue;
            };

            doctor_slots.entry(staff_name.clone()).or_default().push(time_minutes);
        }

        if !unmapped_cols.is_empty() {
            log::warn!("unmapped column indices: {:?} (known columns: {:?})", unmapped_cols, headers.keys().collect::<Vec<_>>());
        }
        if !unmapped_rows.is_empty() {
            log::warn!("row indices outside the built map, interpolated: {:?}", unmapped_rows);
        }

        for slots in doctor_slots.values_mut() {
            slots.sort_unstable();
            slots.dedup();
        }

        Ok(doctor_slots)
    }

    pub async fn sync_staff(&self, page: &Page) -> Result<Vec<String>> {
        let Some(frame_id) = self.locate_schedule_frame(page).await? else {
            return Ok(Vec::new());
        };
        self.column_headers(page, &frame_id, &[], &Default::default()).await.map(|m| {
            let mut names: Vec<String> = m.into_values().collect();
            names.sort();
            names
        })
    }

    /// Walks the page's CDP frame tree for the nested schedule iframe
    /// (`<iframe src="...ts_timetable_week...">`), returning its
    /// `FrameId` so subsequent reads can target that frame's own
    /// document rather than the top-level one.
    async fn locate_schedule_frame(&self, page: &Page) -> Result<Option<FrameId>> {
        let response = page.execute(GetFrameTreeParams::default()).await.map_err(|e| Error::PageOperation(e.to_string()))?;
        Ok(find_frame_id(&response.result.frame_tree, FRAME_URL_MARKER))
    }

    async fn column_headers(
        &self,
        page: &Page,
        frame_id: &FrameId,
        exclude_patterns: &[String],
        disabled_staff: &std::collections::HashSet<String>,
    ) -> Result<HashMap<usize, String>> {
        let script = format!(
            "() => Array.from(document.querySelectorAll('tr.{HEADER_ROW_MARKER} th a')).map(a => ({{text: (a.textContent || '').trim()}}))"
        );
        let cells: Vec<RawHeaderCell> = self.evaluate_in_frame(page, frame_id, script).await.unwrap_or_default();

        let mut headers = HashMap::new();
        for (idx, cell) in cells.into_iter().enumerate() {
            let text = cell.text.trim();
            if text.is_empty() {
                continue;
            }
            if exclude_patterns.iter().any(|p| text.contains(p.as_str())) {
                log::debug!("excluded header (pattern match): {text}");
                continue;
            }
            if disabled_staff.contains(text) {
                log::debug!("excluded header (disabled staff): {text}");
                continue;
            }
            headers.insert(idx, text.to_string());
        }
        Ok(headers)
    }

    async fn fetch_rows(&self, page: &Page, frame_id: &FrameId) -> Result<Vec<RowDescriptor>> {
        let script = r#"() => {
            const rows = document.querySelectorAll('table tr');
            const out = [];
            for (const row of rows) {
                const cells = row.querySelectorAll('th, td');
                if (cells.length < 2) continue;
                out.push({
                    text: (cells[0].textContent || '').trim(),
                    hasLinks: row.querySelectorAll('a').length > 0,
                });
            }
            return out;
        }"#;
        let raw: Vec<RawRow> = self.evaluate_in_frame(page, frame_id, script).await.unwrap_or_default();
        Ok(raw.into_iter().map(|r| RowDescriptor::new(r.text, r.has_links)).collect())
    }

    async fn fetch_new_slot_anchors(&self, page: &Page, frame_id: &FrameId) -> Result<Vec<RawAnchor>> {
        let script = format!(
            r#"() => {{
                let anchors = Array.from(document.querySelectorAll('a.{NEW_SLOT_CLASS}'));
                if (anchors.length === 0) {{
                    anchors = Array.from(document.querySelectorAll('a')).filter(a => (a.textContent || '').trim() === '{NEW_SLOT_TEXT}');
                }}
                return anchors.map(a => ({{href: a.getAttribute('href')}}));
            }}"#
        );
        Ok(self.evaluate_in_frame(page, frame_id, script).await.unwrap_or_default())
    }

    async fn detect_start_time(&self, page: &Page, frame_id: &FrameId) -> Option<i32> {
        let script = r#"() => {
            const rows = document.querySelectorAll('table tr');
            const texts = [];
            for (let i = 0; i < Math.min(rows.length, 20); i++) {
                const cells = rows[i].querySelectorAll('th, td');
                if (cells.length > 0) texts.push((cells[0].textContent || '').trim());
            }
            return texts;
        }"#;
        let texts: Vec<String> = self.evaluate_in_frame(page, frame_id, script).await.ok()?;
        let re = Regex::new(r"^(\d{1,2}):(\d{2})$").ok()?;
        for text in texts {
            if text.is_empty() {
                continue;
            }
            if let Some(caps) = re.captures(&text) {
                let h: i32 = caps[1].parse().ok()?;
                let m: i32 = caps[2].parse().ok()?;
                if (0..=23).contains(&h) && (0..60).contains(&m) {
                    return Some(h * 60 + m);
                }
            }
            if let Ok(h) = text.parse::<i32>() {
                if (6..=12).contains(&h) {
                    return Some(h * 60);
                }
            }
        }
        None
    }

    /// Evaluates `script` (a JS arrow-function source, auto-invoked the
    /// same way `Page::evaluate` invokes one) inside `frame_id`'s own
    /// execution context via an isolated world, instead of the page's
    /// main-frame document. Returns `Err` rather than panicking so
    /// callers can fall back to an empty/default result the same way
    /// `Page::evaluate` failures were already handled before this method
    /// existed.
    async fn evaluate_in_frame<T: DeserializeOwned>(&self, page: &Page, frame_id: &FrameId, script: impl Into<String>) -> Result<T> {
        let world = page
            .execute(CreateIsolatedWorldParams::builder().frame_id(frame_id.clone()).world_name(ISOLATED_WORLD_NAME).build().expect("frame_id is always set"))
            .await
            .map_err(|e| Error::PageOperation(e.to_string()))?;

        let wrapped = format!("({})()", script.into());
        let evaluated = page
            .execute(
                EvaluateParams::builder()
                    .expression(wrapped)
                    .context_id(world.result.execution_context_id)
                    .return_by_value(true)
                    .build()
                    .expect("expression is always set"),
            )
            .await
            .map_err(|e| Error::PageOperation(e.to_string()))?;

        let value = evaluated.result.result.value.clone().ok_or_else(|| Error::PageOperation("frame evaluation returned no value".to_string()))?;
        serde_json::from_value(value).map_err(Error::from)
    }
}

fn find_frame_id(tree: &FrameTree, marker: &str) -> Option<FrameId> {
    if tree.frame.url.contains(marker) {
        return Some(tree.frame.id.clone());
    }
    for child in tree.child_frames.iter().flatten() {
        if let Some(id) = find_frame_id(child, marker) {
            return Some(id);
        }
    }
    None
}
