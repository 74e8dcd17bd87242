use crate::{Result, SearchCriteria};
use sqlx::{sqlite::Sqlite, sqlite::SqlitePool, QueryBuilder};

pub struct CriteriaQueryBuilder<'a> {
    builder: QueryBuilder<'a, Sqlite>,
}

impl<'a> CriteriaQueryBuilder<'a> {
    pub fn new() -> Self {
        let builder = QueryBuilder::new("SELECT * FROM search_criteria WHERE 1=1");
        Self { builder }
    }

    pub fn with_user(mut self, user_id: &'a str) -> Self {
        self.builder.push(" AND user_id = ");
        self.builder.push_bind(user_id);
        self
    }

    pub fn active_only(mut self) -> Self {
        self.builder.push(" AND deleted_at IS NULL");
        self
    }

    pub fn backhaul_only(mut self) -> Self {
        self.builder.push(" AND backhaul = 1");
        self
    }

    /// Orders newest first and applies the limit. Call after all filters.
    pub fn newest_first(mut self, limit: Option<i64>) -> Self {
        self.builder.push(" ORDER BY updated_at DESC, id DESC");
        if let Some(limit) = limit {
            self.builder.push(" LIMIT ");
            self.builder.push_bind(limit);
        }
        self
    }

    pub async fn execute(mut self, pool: &SqlitePool) -> Result<Vec<SearchCriteria>> {
        let criteria = self
            .builder
            .build_query_as::<SearchCriteria>()
            .fetch_all(pool)
            .await?;
        Ok(criteria)
    }
}

impl<'a> Default for CriteriaQueryBuilder<'a> {
    fn default() -> Self {
        Self::new()
    }
}
