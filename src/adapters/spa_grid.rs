//! The single-page-application grid back-end (Apotool/Box-style sites): a
//! client-rendered calendar table where an empty cell with no nested
//! markup and no blocking CSS/inline style is a free slot, at a fixed
//! 15-minute interval.

use std::collections::HashMap;
use std::time::Duration;

use chromiumoxide::Page;
use regex::Regex;
use serde::Deserialize;

use crate::domain::clinic::{Clinic, ClinicCredentials};
use crate::error::{Error, Result};

pub const SPA_SLOT_INTERVAL_MINUTES: i32 = 15;

const STAFF_SETTINGS_URL: &str = "https://apo-toolboxes.stransa.co.jp/user/staffs";
const TABLE_WAIT_TIMEOUT: Duration = Duration::from_secs(30);
const OFFICE_PATH_MARKER: &str = "/office";
const CALENDAR_PATH_MARKER: &str = "/calendar/";
const NEXT_DAY_CHARS: [&str; 2] = ["›", ">"];
const BLOCKED_CSS_INDICATORS: [&str; 14] = [
    "closed", "blocked", "disabled", "holiday", "off", "gray", "lunch", "break", "reserve", "past", "empty", "none", "unavailable", "inactive",
];
const ALLOWED_BACKGROUND_TOKENS: [&str; 4] = ["#fff", "white", "transparent", "rgb(255"];

#[derive(Debug, Deserialize)]
struct RawCell {
    text: String,
    #[serde(rename = "innerHtml")]
    inner_html: String,
    class: String,
    style: String,
    colspan: u32,
    rowspan: u32,
}

#[derive(Debug, Deserialize)]
struct RawScheduleRow {
    #[serde(rename = "firstCellText")]
    first_cell_text: String,
    cells: Vec<RawCell>,
}

#[derive(Debug, Deserialize)]
struct RawScheduleTable {
    headers: Vec<String>,
    rows: Vec<RawScheduleRow>,
}

#[derive(Default)]
pub struct SpaGridAdapter;

impl SpaGridAdapter {
    pub async fn login(&self, page: &Page, clinic: &Clinic, credentials: &ClinicCredentials) -> Result<bool> {
        page.goto(&clinic.url).await.map_err(|e| Error::PageOperation(e.to_string()))?;
        let _ = tokio::time::timeout(TABLE_WAIT_TIMEOUT, page.wait_for_navigation()).await;

        if let Ok(email) = page.find_element(r#"input[type="text"], input[type="email"]"#).await {
            email.click().await.map_err(|e| Error::PageOperation(e.to_string()))?;
            email.type_str(&credentials.id).await.map_err(|e| Error::PageOperation(e.to_string()))?;
        }
        if let Ok(pass) = page.find_element(r#"input[type="password"]"#).await {
            pass.click().await.map_err(|e| Error::PageOperation(e.to_string()))?;
            pass.type_str(&credentials.password).await.map_err(|e| Error::PageOperation(e.to_string()))?;
        }
        if let Ok(submit) = page.find_element(r#"button[type="submit"]"#).await {
            submit.click().await.map_err(|e| Error::PageOperation(e.to_string()))?;
            let _ = tokio::time::timeout(Duration::from_secs(15), page.wait_for_navigation()).await;
        }

        let mut current_url = page.url().await.map_err(|e| Error::PageOperation(e.to_string()))?.unwrap_or_default();

        if current_url.contains(OFFICE_PATH_MARKER) {
            let exact_selector = format!(r#"a:has-text("{}")"#, clinic.name);
            let short_name = clinic.short_display_name();
            let short_selector = format!(r#"a:has-text("{short_name}")"#);

            let clicked = if let Ok(link) = page.find_element(&exact_selector).await {
                link.click().await.map_err(|e| Error::PageOperation(e.to_string())).map(|_| true)?
            } else if let Ok(link) = page.find_element(&short_selector).await {
                link.click().await.map_err(|e| Error::PageOperation(e.to_string())).map(|_| true)?
            } else {
                false
            };

            if clicked {
                tokio::time::sleep(Duration::from_secs(3)).await;
            } else {
                log::warn!("office link not found for {}, retargeting to /calendar/", clinic.name);
                let calendar_url = current_url.replacen(OFFICE_PATH_MARKER, "/calendar/", 1);
                page.goto(&calendar_url).await.map_err(|e| Error::PageOperation(e.to_string()))?;
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
            current_url = page.url().await.map_err(|e| Error::PageOperation(e.to_string()))?.unwrap_or_default();
        }

        if !current_url.contains(CALENDAR_PATH_MARKER) {
            log::warn!("unexpected post-login URL for {}: {current_url}", clinic.name);
            return Ok(true);
        }

        let _ = tokio::time::timeout(TABLE_WAIT_TIMEOUT, page.wait_for_navigation()).await;

        for selector in ["text=\"スタッフ\"", "button:has-text(\"スタッフ\")", "a:has-text(\"スタッフ\")"] {
            if let Ok(tab) = page.find_element(selector).await {
                tab.click().await.map_err(|e| Error::PageOperation(e.to_string()))?;
                tokio::time::sleep(Duration::from_secs(2)).await;
                break;
            }
        }

        Ok(true)
    }

    pub async fn advance_to_tomorrow(&self, page: &Page) -> Result<bool> {
        for selector in [r#"button:has-text("本日")"#, r#"a:has-text("本日")"#] {
            if let Ok(btn) = page.find_element(selector).await {
                btn.click().await.map_err(|e| Error::PageOperation(e.to_string()))?;
                tokio::time::sleep(Duration::from_secs(1)).await;
                break;
            }
        }

        if let Ok(next_btn) = page.find_element(r#"a[title="翌日"]"#).await {
            next_btn.click().await.map_err(|e| Error::PageOperation(e.to_string()))?;
            tokio::time::sleep(Duration::from_secs(3)).await;
            let _ = tokio::time::timeout(Duration::from_secs(15), page.wait_for_navigation()).await;
            return Ok(true);
        }

        let script = format!(
            "() => {{ const links = Array.from(document.querySelectorAll('a')); const target = links.find(a => {:?}.includes((a.textContent || '').trim())); if (target) {{ target.click(); return true; }} return false; }}",
            NEXT_DAY_CHARS
        );
        let clicked: bool = page.evaluate(script).await.and_then(|v| v.into_value()).unwrap_or(false);
        if clicked {
            tokio::time::sleep(Duration::from_secs(3)).await;
            return Ok(true);
        }

        log::warn!("next-day control not found, proceeding with today's grid");
        Ok(false)
    }

    pub async fn extract(&self, page: &Page) -> Result<HashMap<String, Vec<i32>>> {
        let table = self.fetch_schedule_table(page).await?;
        let Some(table) = table else {
            log::warn!("no schedule table with recognizable staff columns found");
            return Ok(HashMap::new());
        };

        let columns: HashMap<usize, &String> = table.headers.iter().enumerate().filter(|(_, text)| is_staff_column(text)).collect();
        if columns.is_empty() {
            log::warn!("schedule table found but no staff columns matched");
            return Ok(HashMap::new());
        }

        let mut chair_slots: HashMap<String, Vec<i32>> = HashMap::new();

        for row in &table.rows {
            let Some((hours, mins)) = parse_hm_prefix(&row.first_cell_text) else { continue };
            let time_minutes = hours * 60 + mins;

            for (&col_idx, chair_name) in &columns {
                let Some(cell) = row.cells.get(col_idx) else { continue };
                if is_free_cell(cell) {
                    chair_slots.entry((*chair_name).clone()).or_default().push(time_minutes);
                }
            }
        }

        for slots in chair_slots.values_mut() {
            slots.sort_unstable();
            slots.dedup();
        }

        Ok(chair_slots)
    }

    pub async fn sync_staff(&self, page: &Page) -> Result<Vec<String>> {
        page.goto(STAFF_SETTINGS_URL).await.map_err(|e| Error::PageOperation(e.to_string()))?;
        tokio::time::sleep(Duration::from_secs(3)).await;

        let current_url = page.url().await.map_err(|e| Error::PageOperation(e.to_string()))?.unwrap_or_default();
        if !current_url.contains("/user/staffs") {
            log::warn!("could not reach staff settings page, landed on {current_url}");
            return Ok(Vec::new());
        }

        let script = r#"() => {
            const names = [];
            for (const table of document.querySelectorAll('table')) {
                for (const row of table.querySelectorAll('tr')) {
                    const cells = row.querySelectorAll('td');
                    if (cells.length === 0) continue;
                    const name = (cells[0].textContent || '').trim();
                    if (name && name !== '名前' && !name.includes('\n') && name.length <= 30 && !names.includes(name)) {
                        names.push(name);
                    }
                }
            }
            return names;
        }"#;
        Ok(page.evaluate(script).await.and_then(|v| v.into_value()).unwrap_or_default())
    }

    async fn fetch_schedule_table(&self, page: &Page) -> Result<Option<RawScheduleTable>> {
        let script = r#"() => {
            const tables = Array.from(document.querySelectorAll('table'));
            for (const table of tables) {
                const rows = Array.from(table.querySelectorAll('tr'));
                if (rows.length < 10) continue;
                const firstRow = rows[0];
                const headerCells = Array.from(firstRow.querySelectorAll('td, th'));
                const headers = headerCells.map(c => (c.textContent || '').trim());
                if (headers.length === 0) continue;
                const out = [];
                for (const row of rows) {
                    const cells = Array.from(row.querySelectorAll('td, th'));
                    if (cells.length < 2) continue;
                    out.push({
                        firstCellText: (cells[0].textContent || '').trim(),
                        cells: cells.map(c => ({
                            text: (c.textContent || '').trim(),
                            innerHtml: c.innerHTML || '',
                            class: c.getAttribute('class') || '',
                            style: c.getAttribute('style') || '',
                            colspan: c.colSpan || 1,
                            rowspan: c.rowSpan || 1,
                        })),
                    });
                }
                return { headers, rows: out };
            }
            return null;
        }"#;
        let value: Option<RawScheduleTable> = page.evaluate(script).await.and_then(|v| v.into_value()).unwrap_or(None);
        Ok(value)
    }
}

/// Recognizes a staff/chair column header among time, date, and UI-chrome
/// text, grounded on the original's heuristic. Pure and unit-testable.
pub fn is_staff_column(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() || text.contains(':') {
        return false;
    }

    const EXCLUDE_EXACT: [&str; 17] = [
        "予約日", "空き枠数", "名前", "AM", "PM", "日", "月", "火", "水", "木", "金", "土",
        "«", "»", "<", ">", "本日",
    ];
    if EXCLUDE_EXACT.contains(&text) || text == "本 日" || text == "週" || text == "今日" || text == "クリア" {
        return false;
    }
    if text.contains('年') && text.contains('月') {
        return false;
    }
    if text.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    if let Some(rest) = text.strip_prefix("チェア") {
        let _ = rest;
        return true;
    }
    if text.starts_with("Dr") || text.starts_with("DH") {
        return true;
    }
    if text.starts_with("衛生士") {
        return true;
    }
    const KNOWN_COLUMNS: [&str; 7] = ["TC", "SP急患", "SP", "急患", "アシスト", "TC/SP", "矯正"];
    if KNOWN_COLUMNS.contains(&text) {
        return true;
    }
    if text.contains('/') && (4..=12).contains(&text.chars().count()) {
        return true;
    }

    let kanji_count = text.chars().count();
    if (2..=4).contains(&kanji_count) && text.chars().all(is_cjk_unified) {
        const COMMON_WORDS: [&str; 11] = ["診療", "予約", "患者", "連絡", "掲示", "一覧", "追加", "削除", "設定", "表示", "非表示"];
        if !COMMON_WORDS.contains(&text) {
            return true;
        }
    }

    false
}

fn is_cjk_unified(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

fn parse_hm_prefix(text: &str) -> Option<(i32, i32)> {
    let first_line = text.split('\n').next().unwrap_or("").trim();
    if !first_line.contains(':') {
        return None;
    }
    let re = Regex::new(r"^(\d{1,2}):(\d{2})").ok()?;
    let caps = re.captures(first_line)?;
    let h: i32 = caps[1].parse().ok()?;
    let m: i32 = caps[2].parse().ok()?;
    Some((h, m))
}

/// A cell is a free slot only if it has no text, no nested markup, no
/// blocking CSS class, and no blocking inline background color.
fn is_free_cell(cell: &RawCell) -> bool {
    let text_clean = cell.text.replace('\u{a0}', "").replace('\u{200b}', "").trim().to_string();
    if !text_clean.is_empty() {
        return false;
    }

    if cell.colspan > 1 || cell.rowspan > 1 {
        return false;
    }

    let html_clean = cell.inner_html.replace('\u{a0}', "").replace('\u{200b}', "").replace("<br>", "").replace("<br/>", "");
    if html_clean.contains('<') {
        return false;
    }

    let class_lower = cell.class.to_lowercase();
    if BLOCKED_CSS_INDICATORS.iter().any(|ind| class_lower.contains(ind)) {
        return false;
    }

    let style_lower = cell.style.to_lowercase();
    if style_lower.contains("background") && !ALLOWED_BACKGROUND_TOKENS.iter().any(|tok| style_lower.contains(tok)) {
        return false;
    }

    true
}
