use super::error::FilterError;
use super::types::{Condition, FilterOp, FilterWhereInfo, SqlValue};

/// Renders a condition tree into SQL with `$n` placeholders. A single
/// parameter list is threaded through nested groups so numbering stays
/// contiguous.
pub struct FilterWhere {
    param_values: Vec<SqlValue>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Empty input renders as an empty clause.
    pub fn generate(
        conditions: &[Condition],
        starting_param_index: usize,
    ) -> Result<(String, Vec<SqlValue>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let clause = filter_where.build_group(conditions, " AND ")?;
        Ok((clause.unwrap_or_default(), filter_where.param_values))
    }

    pub fn validate_column(column: &str) -> Result<(), FilterError> {
        let mut chars = column.chars();
        let valid_start = chars.next().map(|c| c.is_ascii_alphabetic() || c == '_').unwrap_or(false);
        if !valid_start || !column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", column)));
        }
        Ok(())
    }

    fn build_group(&mut self, conditions: &[Condition], joiner: &str) -> Result<Option<String>, FilterError> {
        let mut parts = Vec::with_capacity(conditions.len());
        for condition in conditions {
            if let Some(sql) = self.build_condition(condition)? {
                parts.push(sql);
            }
        }
        Ok(match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(parts.join(joiner)),
        })
    }

    fn build_condition(&mut self, condition: &Condition) -> Result<Option<String>, FilterError> {
        match condition {
            Condition::Field(info) => self.build_sql_condition(info).map(Some),
            Condition::And(children) => Ok(self.build_group(children, " AND ")?.map(|sql| format!("({})", sql))),
            Condition::Or(children) => {
                // An empty OR matches nothing
                Ok(Some(
                    self.build_group(children, " OR ")?
                        .map(|sql| format!("({})", sql))
                        .unwrap_or_else(|| "1=0".to_string()),
                ))
            }
            Condition::Not(child) => Ok(self.build_condition(child)?.map(|sql| format!("NOT ({})", sql))),
        }
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        Self::validate_column(&condition.column)?;
        let quoted_column = format!("\"{}\"", condition.column);

        let comparison = |symbol: &str, this: &mut Self| -> Result<String, FilterError> {
            let value = Self::single_value(condition)?;
            Ok(format!("{} {} {}", quoted_column, symbol, this.param(value)))
        };

        match condition.operator {
            FilterOp::Eq => comparison("=", self),
            FilterOp::Ne => comparison("<>", self),
            FilterOp::Gte => comparison(">=", self),
            FilterOp::ILike => comparison("ILIKE", self),
            FilterOp::In => {
                if condition.data.is_empty() {
                    return Ok("1=0".to_string());
                }
                let params: Vec<String> = condition.data.iter().map(|v| self.param(v.clone())).collect();
                Ok(format!("{} IN ({})", quoted_column, params.join(", ")))
            }
            FilterOp::IsNull => Ok(format!("{} IS NULL", quoted_column)),
            FilterOp::IsNotNull => Ok(format!("{} IS NOT NULL", quoted_column)),
        }
    }

    fn single_value(condition: &FilterWhereInfo) -> Result<SqlValue, FilterError> {
        match condition.data.as_slice() {
            [value] => Ok(value.clone()),
            _ => Err(FilterError::InvalidOperatorData(format!(
                "{:?} on {} requires exactly one value",
                condition.operator, condition.column
            ))),
        }
    }

    fn param(&mut self, value: SqlValue) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn numbers_params_across_nested_groups() {
        let group = Uuid::new_v4();
        let conditions = vec![
            Condition::eq("group_id", group),
            Condition::search(&["name", "overview"], "rust"),
            Condition::gte("rating", 4.0),
        ];
        let (sql, params) = FilterWhere::generate(&conditions, 0).unwrap();
        assert_eq!(
            sql,
            "\"group_id\" = $1 AND (\"name\" ILIKE $2 OR \"overview\" ILIKE $3) AND \"rating\" >= $4"
        );
        assert_eq!(params.len(), 4);
        assert_eq!(params[0], SqlValue::Uuid(group));
        assert_eq!(params[1], SqlValue::Text("%rust%".to_string()));
    }

    #[test]
    fn honours_starting_index() {
        let (sql, params) = FilterWhere::generate(&[Condition::eq("completed", true)], 2).unwrap();
        assert_eq!(sql, "\"completed\" = $3");
        assert_eq!(params, vec![SqlValue::Bool(true)]);
    }

    #[test]
    fn renders_null_checks_in_and_not() {
        let conditions = vec![
            Condition::is_not_null("subscription_id"),
            Condition::is_in("role", ["USER", "PROVIDER"]),
            Condition::Not(Box::new(Condition::is_null("completed_at"))),
        ];
        let (sql, params) = FilterWhere::generate(&conditions, 0).unwrap();
        assert_eq!(
            sql,
            "\"subscription_id\" IS NOT NULL AND \"role\" IN ($1, $2) AND NOT (\"completed_at\" IS NULL)"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn empty_sets_match_nothing() {
        let none: Vec<Uuid> = vec![];
        let (sql, _) = FilterWhere::generate(&[Condition::is_in("id", none)], 0).unwrap();
        assert_eq!(sql, "1=0");
        let (sql, _) = FilterWhere::generate(&[Condition::Or(vec![])], 0).unwrap();
        assert_eq!(sql, "1=0");
        let (sql, params) = FilterWhere::generate(&[], 0).unwrap();
        assert!(sql.is_empty() && params.is_empty());
    }

    #[test]
    fn rejects_unsafe_columns() {
        let err = FilterWhere::generate(&[Condition::eq("name; DROP TABLE users", "x")], 0);
        assert!(matches!(err, Err(FilterError::InvalidColumn(_))));
        assert!(FilterWhere::validate_column("_private1").is_ok());
        assert!(FilterWhere::validate_column("1abc").is_err());
    }

    #[test]
    fn search_escapes_wildcards() {
        let (_, params) = FilterWhere::generate(&[Condition::search(&["name"], "50%_off")], 0).unwrap();
        assert_eq!(params[0], SqlValue::Text("%50\\%\\_off%".to_string()));
    }
}
