// src/utils/layout.rs

/// Page numbers of an attempt layout such as `"1,2,0,3,0"`.
/// Every `0` closes a page.
pub fn pages_from_layout(layout: &str) -> Vec<i64> {
    layout
        .split(',')
        .map(str::trim)
        .filter(|slot| *slot == "0")
        .enumerate()
        .map(|(page, _)| page as i64)
        .collect()
}
