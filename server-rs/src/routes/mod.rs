pub mod charge_concepts;
pub mod charges;
pub mod clients;
pub mod expenses;
pub mod health;
pub mod housekeeping;
pub mod loans;
pub mod maintenance;
pub mod payments;
pub mod products;
pub mod property;
pub mod purchases;
pub mod reservations;
pub mod room_types;
pub mod rooms;
pub mod saas;
pub mod sales;
pub mod suppliers;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Clamps list paging to sane bounds.
pub fn page(limit: Option<i64>, offset: Option<i64>, max: i64) -> (i64, i64) {
    (limit.unwrap_or(max).clamp(1, max), offset.unwrap_or(0).max(0))
}

/// `%term%` pattern for ILIKE searches, or `None` for a blank term.
pub fn search_pattern(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("%{}%", t.replace('%', "\\%").replace('_', "\\_")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_is_clamped() {
        assert_eq!(page(None, None, 100), (100, 0));
        assert_eq!(page(Some(5000), Some(-3), 100), (100, 0));
        assert_eq!(page(Some(0), Some(20), 100), (1, 20));
    }

    #[test]
    fn search_terms_are_escaped() {
        assert_eq!(search_pattern(Some(" ana ")).as_deref(), Some("%ana%"));
        assert_eq!(search_pattern(Some("50%")).as_deref(), Some("%50\\%%"));
        assert_eq!(search_pattern(Some("  ")), None);
        assert_eq!(search_pattern(None), None);
    }
}
