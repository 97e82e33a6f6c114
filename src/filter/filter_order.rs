use super::error::FilterError;
use super::filter_where::FilterWhere;
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Resolve client `sortBy` / `sortOrder` against a whitelist of
    /// `(api name, column)` pairs. Missing `sortBy` falls back to `default`;
    /// a missing or unrecognised `sortOrder` means descending.
    pub fn resolve(
        sort_by: Option<&str>,
        sort_order: Option<&str>,
        allowed: &[(&str, &str)],
        default: &str,
    ) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let sort = Self::parse_direction(sort_order);
        let requested = sort_by.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(default);

        let column = allowed
            .iter()
            .find(|(api_name, column)| *api_name == requested || *column == requested)
            .map(|(_, column)| *column)
            .ok_or_else(|| FilterError::InvalidSort(requested.to_string()))?;

        Ok(vec![FilterOrderInfo::new(column, sort)])
    }

    pub fn parse_direction(sort_order: Option<&str>) -> SortDirection {
        match sort_order {
            Some(s) if s.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }

    /// `id` is appended as a tiebreaker so pages never overlap.
    pub fn generate(infos: &[FilterOrderInfo]) -> Result<String, FilterError> {
        if infos.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(infos.len() + 1);
        for info in infos {
            FilterWhere::validate_column(&info.column)?;
            parts.push(format!("\"{}\" {}", info.column, info.sort.to_sql()));
        }
        if !infos.iter().any(|i| i.column == "id") {
            parts.push("\"id\" ASC".to_string());
        }
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SORTABLE: &[(&str, &str)] = &[("createdAt", "created_at"), ("name", "name"), ("rating", "rating")];

    #[test]
    fn defaults_to_created_at_desc() {
        let order = FilterOrder::resolve(None, None, SORTABLE, "createdAt").unwrap();
        assert_eq!(order, vec![FilterOrderInfo::new("created_at", SortDirection::Desc)]);
        assert_eq!(
            FilterOrder::generate(&order).unwrap(),
            "ORDER BY \"created_at\" DESC, \"id\" ASC"
        );
    }

    #[test]
    fn maps_api_names_to_columns() {
        let order = FilterOrder::resolve(Some("rating"), Some("ASC"), SORTABLE, "createdAt").unwrap();
        assert_eq!(order[0].column, "rating");
        assert_eq!(order[0].sort, SortDirection::Asc);
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = FilterOrder::resolve(Some("password"), None, SORTABLE, "createdAt");
        assert!(matches!(err, Err(FilterError::InvalidSort(f)) if f == "password"));
    }
}
