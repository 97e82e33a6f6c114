use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{Condition, FilterData, FilterOrderInfo, SqlResult};

pub struct Filter {
    table_name: String,
    select_columns: Vec<String>,
    conditions: Vec<Condition>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            select_columns: vec![],
            conditions: vec![],
            order_data: vec![],
            limit: None,
            offset: None,
        })
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(select) = data.select { self.select(select)?; }
        for condition in data.conditions { self.where_clause(condition); }
        if !data.order.is_empty() { self.order(data.order); }
        if let Some(limit) = data.limit { self.limit(limit, data.offset)?; }
        Ok(self)
    }

    pub fn select(&mut self, columns: Vec<String>) -> Result<&mut Self, FilterError> {
        for column in &columns {
            if column != "*" {
                FilterWhere::validate_column(column)?;
            }
        }
        self.select_columns = columns;
        Ok(self)
    }

    /// Conditions accumulate and are joined with AND.
    pub fn where_clause(&mut self, condition: Condition) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    pub fn order(&mut self, order: Vec<FilterOrderInfo>) -> &mut Self {
        self.order_data = order;
        self
    }

    pub fn limit(&mut self, limit: i64, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if limit < 0 { return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string())); }
        if let Some(off) = offset { if off < 0 { return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string())); } }
        self.limit = Some(limit);
        self.offset = offset;
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let select_clause = self.build_select_clause();
        let where_result = self.to_where_sql()?;
        let order_clause = FilterOrder::generate(&self.order_data)?;
        let limit_clause = self.build_limit_clause();

        let query = [
            format!("SELECT {}", select_clause),
            format!("FROM \"{}\"", self.table_name),
            if where_result.query.is_empty() { String::new() } else { format!("WHERE {}", where_result.query) },
            order_clause,
            limit_clause,
        ].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");

        Ok(SqlResult { query, params: where_result.params })
    }

    pub fn to_where_sql(&self) -> Result<SqlResult, FilterError> {
        let (query, params) = FilterWhere::generate(&self.conditions, 0)?;
        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let query = if where_result.query.is_empty() {
            format!("SELECT COUNT(*) AS count FROM \"{}\"", self.table_name)
        } else {
            format!("SELECT COUNT(*) AS count FROM \"{}\" WHERE {}", self.table_name, where_result.query)
        };
        Ok(SqlResult { query, params: where_result.params })
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        if name.is_empty() { return Err(FilterError::InvalidTableName("Table name cannot be empty".to_string())); }
        FilterWhere::validate_column(name)
            .map_err(|_| FilterError::InvalidTableName(format!("Invalid table name format: {}", name)))
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            "*".to_string()
        } else {
            self.select_columns.iter().map(|c| format!("\"{}\"", c)).collect::<Vec<_>>().join(", ")
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::SortDirection;

    #[test]
    fn builds_paged_select() {
        let mut filter = Filter::new("course_catalog").unwrap();
        filter
            .assign(FilterData {
                conditions: vec![Condition::search(&["name", "overview"], "sql")],
                order: vec![FilterOrderInfo::new("rating", SortDirection::Desc)],
                limit: Some(10),
                offset: Some(10),
                ..Default::default()
            })
            .unwrap();
        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT * FROM \"course_catalog\" WHERE (\"name\" ILIKE $1 OR \"overview\" ILIKE $2) \
             ORDER BY \"rating\" DESC, \"id\" ASC LIMIT 10 OFFSET 10"
        );
        assert_eq!(sql.params.len(), 2);
    }

    #[test]
    fn count_ignores_order_and_limit() {
        let mut filter = Filter::new("enrollment_catalog").unwrap();
        filter.where_clause(Condition::eq("completed", false));
        filter.limit(10, Some(20)).unwrap();
        let sql = filter.to_count_sql().unwrap();
        assert_eq!(sql.query, "SELECT COUNT(*) AS count FROM \"enrollment_catalog\" WHERE \"completed\" = $1");
    }

    #[test]
    fn unfiltered_select_has_no_where() {
        let filter = Filter::new("course_groups").unwrap();
        assert_eq!(filter.to_sql().unwrap().query, "SELECT * FROM \"course_groups\"");
    }

    #[test]
    fn validates_names_and_bounds() {
        assert!(Filter::new("users; --").is_err());
        assert!(Filter::new("").is_err());
        let mut filter = Filter::new("users").unwrap();
        assert!(filter.limit(-1, None).is_err());
        assert!(filter.limit(1, Some(-1)).is_err());
        assert!(filter.select(vec!["bad column".to_string()]).is_err());
    }
}
