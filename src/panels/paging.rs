//! Slicing of gene panels into pages.

use crate::err::PanelError;

use super::panel::GenePanel;

/// Parse an optional integer request parameter.
///
/// Missing or blank values give `None`.
pub fn parse_param(raw: Option<&str>, name: &str) -> Result<Option<i64>, PanelError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<i64>()
            .map(Some)
            .map_err(|source| PanelError::InvalidInteger {
                name: name.to_string(),
                source,
            }),
    }
}

/// Index of the first row on the 1-based page `start_page`.
///
/// Pages beyond the available rows are rejected rather than clamped.
pub fn determine_first_index(
    start_page: i64,
    page_size: usize,
    total: usize,
) -> Result<usize, PanelError> {
    let out_of_bounds = || {
        PanelError::invalid_argument(format!(
            "The requested [startpage: {}] is out of bounds.",
            start_page
        ))
    };
    if start_page < 1 || (page_size == 0 && start_page > 1) {
        return Err(out_of_bounds());
    }
    let first = usize::try_from(start_page - 1)
        .ok()
        .and_then(|page| page.checked_mul(page_size))
        .ok_or_else(out_of_bounds)?;
    if first > 0 && first >= total {
        return Err(out_of_bounds());
    }
    Ok(first)
}

/// Clamp the end of a page to the available rows.
pub fn determine_last_index(requested: usize, available: usize) -> usize {
    requested.min(available)
}

/// Number of pages of length `page_len` needed for `total` rows.
pub fn total_pages(total: usize, page_len: usize) -> usize {
    if page_len == 0 {
        1
    } else {
        ((total + page_len - 1) / page_len).max(1)
    }
}

/// Row limit; `None` for a missing value or one below 1.
fn page_limit(limit: Option<i64>) -> Option<usize> {
    limit
        .filter(|limit| *limit > 0)
        .and_then(|limit| usize::try_from(limit).ok())
}

/// JSON of page `start_page` (default 1) with `limit` rows per page.
///
/// Without a limit all rows are returned on a single page.  The result
/// carries an additional `totalpages` field.
pub fn page_panel(
    panel: &GenePanel,
    start_page: Option<i64>,
    limit: Option<i64>,
) -> Result<serde_json::Value, PanelError> {
    let size = panel.size();
    let page_len = match page_limit(limit) {
        Some(limit) if limit < size => limit,
        _ => size,
    };
    let first = determine_first_index(start_page.unwrap_or(1), page_len, size)?;
    let last = determine_last_index(first + page_len, size);

    let mut result = if first == 0 && last == size {
        panel.to_json()
    } else {
        panel.to_json_range(first, last)?
    };
    result["totalpages"] = total_pages(size, page_len).into();
    Ok(result)
}

/// JSON of at most `limit` rows starting at the 1-based row `offset`.
///
/// The result carries an additional `offset` field.
pub fn offset_panel(
    panel: &GenePanel,
    offset: Option<i64>,
    limit: Option<i64>,
) -> Result<serde_json::Value, PanelError> {
    let size = panel.size();
    let offset = offset.unwrap_or(1);
    let first = offset
        .checked_sub(1)
        .and_then(|first| usize::try_from(first).ok())
        .filter(|first| *first == 0 || *first < size)
        .ok_or_else(|| {
            PanelError::invalid_argument(format!(
                "The requested [offset: {}] is out of bounds.",
                offset
            ))
        })?;
    let page_len = page_limit(limit).unwrap_or(size);
    let last = determine_last_index(first.saturating_add(page_len), size);

    let mut result = panel.to_json_range(first, last)?;
    result["offset"] = offset.into();
    Ok(result)
}
