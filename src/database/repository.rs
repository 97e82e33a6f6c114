use sqlx::{self, postgres::PgRow, FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::query_builder::QueryBuilder;
use crate::filter::{Condition, FilterData};

/// Typed read access to one table or view
pub struct Repository<T> {
    table_name: String,
    pool: PgPool,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Repository<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    pub fn new(table_name: impl Into<String>, pool: PgPool) -> Self {
        Self {
            table_name: table_name.into(),
            pool,
            _phantom: std::marker::PhantomData,
        }
    }

    pub async fn select_any(&self, filter_data: FilterData) -> Result<Vec<T>, DatabaseError> {
        QueryBuilder::<T>::new(&self.table_name)?
            .filter(filter_data)?
            .select_all(&self.pool)
            .await
    }

    pub async fn select_one(&self, filter_data: FilterData) -> Result<Option<T>, DatabaseError> {
        let filter_data = FilterData { limit: Some(1), offset: None, ..filter_data };
        QueryBuilder::<T>::new(&self.table_name)?
            .filter(filter_data)?
            .select_optional(&self.pool)
            .await
    }

    pub async fn select_id(&self, id: Uuid) -> Result<Option<T>, DatabaseError> {
        self.select_one(FilterData::where_all(vec![Condition::eq("id", id)])).await
    }

    pub async fn count(&self, filter_data: FilterData) -> Result<i64, DatabaseError> {
        QueryBuilder::<T>::new(&self.table_name)?
            .filter(filter_data)?
            .count(&self.pool)
            .await
    }

    /// Rows for one page plus the total matching the same conditions.
    pub async fn select_page(&self, filter_data: FilterData) -> Result<(Vec<T>, i64), DatabaseError> {
        let count_data = FilterData::where_all(filter_data.conditions.clone());
        let rows = QueryBuilder::<T>::new(&self.table_name)?.filter(filter_data)?;
        let counter = QueryBuilder::<T>::new(&self.table_name)?.filter(count_data)?;
        futures::try_join!(rows.select_all(&self.pool), counter.count(&self.pool))
    }
}
