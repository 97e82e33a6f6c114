use serde::Deserialize;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use crate::database::models::{
    CourseGroup, CourseListItem, GroupTree, SubGroupListItem, SubGroupTree, SubSubGroupDetail, SubSubGroupListItem,
};
use crate::database::Repository;
use crate::error::{ApiError, AppResult};
use crate::filter::{Condition, FilterData, FilterOrder, FilterOrderInfo, PageMeta, PaginationQuery, SortDirection};

const SORTABLE: &[(&str, &str)] = &[("createdAt", "created_at"), ("name", "name")];

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupInput {
    #[validate(custom(function = "crate::extract::not_blank", message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubGroupInput {
    #[validate(custom(function = "crate::extract::not_blank", message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub group_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubSubGroupInput {
    #[validate(custom(function = "crate::extract::not_blank", message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub sub_group_id: Uuid,
}

/// Patch body shared by all three levels; `parentId` is the group for a
/// sub-group and the sub-group for a sub-sub-group.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaxonomyInput {
    #[validate(custom(function = "crate::extract::not_blank", message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "groupId", alias = "subGroupId")]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyFilter {
    pub group_id: Option<Uuid>,
    pub sub_group_id: Option<Uuid>,
}

pub struct TaxonomyService {
    pool: PgPool,
}

impl TaxonomyService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn groups(&self) -> Repository<CourseGroup> {
        Repository::new("course_groups", self.pool.clone())
    }

    fn sub_groups(&self) -> Repository<SubGroupListItem> {
        Repository::new("sub_group_catalog", self.pool.clone())
    }

    fn sub_sub_groups(&self) -> Repository<SubSubGroupListItem> {
        Repository::new("sub_sub_group_catalog", self.pool.clone())
    }

    // Groups

    pub async fn create_group(&self, input: CreateGroupInput) -> AppResult<CourseGroup> {
        let group = sqlx::query_as::<_, CourseGroup>(
            "INSERT INTO course_groups (id, name, description) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(input.name.trim())
        .bind(input.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(group)
    }

    pub async fn list_groups(&self, query: &PaginationQuery) -> AppResult<(Vec<GroupTree>, PageMeta)> {
        let page = query.page_request();
        let (groups, total) = self
            .groups()
            .select_page(page_filter(query, vec![], page.limit, page.offset())?)
            .await?;

        let trees = self.group_trees(groups).await?;
        Ok((trees, PageMeta::new(page, total)))
    }

    pub async fn get_group(&self, id: Uuid) -> AppResult<GroupTree> {
        let group = self
            .groups()
            .select_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Course group not found"))?;
        let mut trees = self.group_trees(vec![group]).await?;
        trees.pop().ok_or_else(|| ApiError::not_found("Course group not found"))
    }

    pub async fn update_group(&self, id: Uuid, input: UpdateTaxonomyInput) -> AppResult<CourseGroup> {
        sqlx::query_as::<_, CourseGroup>(
            r#"
            UPDATE course_groups
            SET name = COALESCE($2, name), description = COALESCE($3, description), updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Course group not found"))
    }

    pub async fn delete_group(&self, id: Uuid) -> AppResult<()> {
        self.delete_row("course_groups", id, "Course group not found").await
    }

    // Sub-groups

    pub async fn create_sub_group(&self, input: CreateSubGroupInput) -> AppResult<SubGroupListItem> {
        self.require_group(input.group_id).await?;

        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO course_sub_groups (id, name, description, group_id) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(input.name.trim())
            .bind(input.description)
            .bind(input.group_id)
            .execute(&self.pool)
            .await?;
        self.sub_group_item(id).await
    }

    pub async fn list_sub_groups(
        &self,
        query: &PaginationQuery,
        filter: &TaxonomyFilter,
    ) -> AppResult<(Vec<SubGroupTree>, PageMeta)> {
        let page = query.page_request();
        let mut conditions = vec![];
        if let Some(group_id) = filter.group_id {
            conditions.push(Condition::eq("group_id", group_id));
        }

        let (sub_groups, total) = self
            .sub_groups()
            .select_page(page_filter(query, conditions, page.limit, page.offset())?)
            .await?;

        let trees = self.sub_group_trees(sub_groups).await?;
        Ok((trees, PageMeta::new(page, total)))
    }

    pub async fn get_sub_group(&self, id: Uuid) -> AppResult<SubGroupTree> {
        let sub_group = self.sub_group_item(id).await?;
        let mut trees = self.sub_group_trees(vec![sub_group]).await?;
        trees.pop().ok_or_else(|| ApiError::not_found("Course sub-group not found"))
    }

    pub async fn update_sub_group(&self, id: Uuid, input: UpdateTaxonomyInput) -> AppResult<SubGroupListItem> {
        if let Some(group_id) = input.parent_id {
            self.require_group(group_id).await?;
        }

        let updated = sqlx::query(
            r#"
            UPDATE course_sub_groups
            SET name = COALESCE($2, name), description = COALESCE($3, description),
                group_id = COALESCE($4, group_id), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.description)
        .bind(input.parent_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(ApiError::not_found("Course sub-group not found"));
        }
        self.sub_group_item(id).await
    }

    pub async fn delete_sub_group(&self, id: Uuid) -> AppResult<()> {
        self.delete_row("course_sub_groups", id, "Course sub-group not found").await
    }

    // Sub-sub-groups

    pub async fn create_sub_sub_group(&self, input: CreateSubSubGroupInput) -> AppResult<SubSubGroupListItem> {
        self.require_sub_group(input.sub_group_id).await?;

        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO course_sub_sub_groups (id, name, description, sub_group_id) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(input.name.trim())
            .bind(input.description)
            .bind(input.sub_group_id)
            .execute(&self.pool)
            .await?;
        self.sub_sub_group_item(id).await
    }

    pub async fn list_sub_sub_groups(
        &self,
        query: &PaginationQuery,
        filter: &TaxonomyFilter,
    ) -> AppResult<(Vec<SubSubGroupListItem>, PageMeta)> {
        let page = query.page_request();
        let mut conditions = vec![];
        if let Some(group_id) = filter.group_id {
            conditions.push(Condition::eq("group_id", group_id));
        }
        if let Some(sub_group_id) = filter.sub_group_id {
            conditions.push(Condition::eq("sub_group_id", sub_group_id));
        }

        let (rows, total) = self
            .sub_sub_groups()
            .select_page(page_filter(query, conditions, page.limit, page.offset())?)
            .await?;
        Ok((rows, PageMeta::new(page, total)))
    }

    pub async fn get_sub_sub_group(&self, id: Uuid) -> AppResult<SubSubGroupDetail> {
        let sub_sub_group = self.sub_sub_group_item(id).await?;
        let courses = Repository::<CourseListItem>::new("course_catalog", self.pool.clone())
            .select_any(FilterData {
                conditions: vec![Condition::eq("sub_sub_group_id", id)],
                order: vec![FilterOrderInfo::new("created_at", SortDirection::Desc)],
                ..Default::default()
            })
            .await?;
        Ok(SubSubGroupDetail { sub_sub_group, courses })
    }

    pub async fn update_sub_sub_group(&self, id: Uuid, input: UpdateTaxonomyInput) -> AppResult<SubSubGroupListItem> {
        if let Some(sub_group_id) = input.parent_id {
            self.require_sub_group(sub_group_id).await?;
        }

        let updated = sqlx::query(
            r#"
            UPDATE course_sub_sub_groups
            SET name = COALESCE($2, name), description = COALESCE($3, description),
                sub_group_id = COALESCE($4, sub_group_id), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.description)
        .bind(input.parent_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(ApiError::not_found("Course sub-sub-group not found"));
        }
        self.sub_sub_group_item(id).await
    }

    pub async fn delete_sub_sub_group(&self, id: Uuid) -> AppResult<()> {
        self.delete_row("course_sub_sub_groups", id, "Course sub-sub-group not found").await
    }

    // Shared lookups

    pub async fn require_group(&self, id: Uuid) -> AppResult<()> {
        let count = self.groups().count(FilterData::where_all(vec![Condition::eq("id", id)])).await?;
        if count == 0 {
            return Err(ApiError::not_found("Course group not found"));
        }
        Ok(())
    }

    pub async fn require_sub_group(&self, id: Uuid) -> AppResult<()> {
        let count = self.sub_groups().count(FilterData::where_all(vec![Condition::eq("id", id)])).await?;
        if count == 0 {
            return Err(ApiError::not_found("Course sub-group not found"));
        }
        Ok(())
    }

    async fn sub_group_item(&self, id: Uuid) -> AppResult<SubGroupListItem> {
        self.sub_groups()
            .select_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Course sub-group not found"))
    }

    async fn sub_sub_group_item(&self, id: Uuid) -> AppResult<SubSubGroupListItem> {
        self.sub_sub_groups()
            .select_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Course sub-sub-group not found"))
    }

    async fn group_trees(&self, groups: Vec<CourseGroup>) -> AppResult<Vec<GroupTree>> {
        let group_ids: Vec<Uuid> = groups.iter().map(|g| g.id).collect();
        let sub_groups = self.children(&self.sub_groups(), "group_id", group_ids).await?;
        let sub_group_trees = self.sub_group_trees(sub_groups).await?;
        Ok(build_group_trees(groups, sub_group_trees))
    }

    async fn sub_group_trees(&self, sub_groups: Vec<SubGroupListItem>) -> AppResult<Vec<SubGroupTree>> {
        let ids: Vec<Uuid> = sub_groups.iter().map(|sg| sg.id).collect();
        let sub_sub_groups = self.children(&self.sub_sub_groups(), "sub_group_id", ids).await?;
        Ok(build_sub_group_trees(sub_groups, sub_sub_groups))
    }

    async fn children<T>(&self, repo: &Repository<T>, parent_column: &str, parent_ids: Vec<Uuid>) -> AppResult<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    {
        if parent_ids.is_empty() {
            return Ok(vec![]);
        }
        Ok(repo
            .select_any(FilterData {
                conditions: vec![Condition::is_in(parent_column, parent_ids)],
                order: vec![FilterOrderInfo::new("name", SortDirection::Asc)],
                ..Default::default()
            })
            .await?)
    }

    async fn delete_row(&self, table: &str, id: Uuid, missing: &str) -> AppResult<()> {
        let deleted = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", table))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(ApiError::not_found(missing));
        }
        Ok(())
    }
}

fn page_filter(query: &PaginationQuery, mut conditions: Vec<Condition>, limit: i64, offset: i64) -> AppResult<FilterData> {
    if let Some(term) = query.search() {
        conditions.push(Condition::search(&["name"], term));
    }
    Ok(FilterData {
        conditions,
        order: FilterOrder::resolve(query.sort_by.as_deref(), query.sort_order.as_deref(), SORTABLE, "createdAt")?,
        limit: Some(limit),
        offset: Some(offset),
        ..Default::default()
    })
}

/// Attach children to parents, keeping the parents' order.
fn build_group_trees(groups: Vec<CourseGroup>, sub_groups: Vec<SubGroupTree>) -> Vec<GroupTree> {
    let mut by_parent: HashMap<Uuid, Vec<SubGroupTree>> = HashMap::new();
    for sub_group in sub_groups {
        by_parent.entry(sub_group.sub_group.group_id).or_default().push(sub_group);
    }
    groups
        .into_iter()
        .map(|group| GroupTree {
            sub_groups: by_parent.remove(&group.id).unwrap_or_default(),
            group,
        })
        .collect()
}

fn build_sub_group_trees(
    sub_groups: Vec<SubGroupListItem>,
    sub_sub_groups: Vec<SubSubGroupListItem>,
) -> Vec<SubGroupTree> {
    let mut by_parent: HashMap<Uuid, Vec<SubSubGroupListItem>> = HashMap::new();
    for item in sub_sub_groups {
        by_parent.entry(item.sub_group_id).or_default().push(item);
    }
    sub_groups
        .into_iter()
        .map(|sub_group| SubGroupTree {
            sub_sub_groups: by_parent.remove(&sub_group.id).unwrap_or_default(),
            sub_group,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn group(name: &str) -> CourseGroup {
        CourseGroup {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sub_group(parent: &CourseGroup, name: &str) -> SubGroupListItem {
        SubGroupListItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            group_id: parent.id,
            group_name: parent.name.clone(),
            sub_sub_group_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn trees_keep_parent_order_and_empty_children() {
        let science = group("Science");
        let arts = group("Arts");
        let physics = sub_group(&science, "Physics");
        let chemistry = sub_group(&science, "Chemistry");

        let sub_trees = build_sub_group_trees(vec![physics, chemistry], vec![]);
        let trees = build_group_trees(vec![science.clone(), arts.clone()], sub_trees);

        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].group.id, science.id);
        assert_eq!(trees[0].sub_groups.len(), 2);
        assert!(trees[0].sub_groups.iter().all(|t| t.sub_sub_groups.is_empty()));
        assert_eq!(trees[1].group.id, arts.id);
        assert!(trees[1].sub_groups.is_empty());
    }

    #[test]
    fn update_body_accepts_parent_aliases() {
        let input: UpdateTaxonomyInput =
            serde_json::from_str(r#"{"groupId":"6f1c1b9e-8a57-4c37-9a39-2f7bd0d1f0aa"}"#).unwrap();
        assert!(input.parent_id.is_some());
        let input: UpdateTaxonomyInput = serde_json::from_str(r#"{"name":"Biology"}"#).unwrap();
        assert_eq!(input.name.as_deref(), Some("Biology"));
        assert!(input.parent_id.is_none());
    }

    #[test]
    fn whitespace_names_fail_validation() {
        let group: CreateGroupInput = serde_json::from_str(r#"{"name":"  "}"#).unwrap();
        assert!(group.validate().is_err());
        let leaf: CreateSubSubGroupInput =
            serde_json::from_str(r#"{"name":"\n","subGroupId":"6f1c1b9e-8a57-4c37-9a39-2f7bd0d1f0aa"}"#).unwrap();
        assert!(leaf.validate().is_err());
        let rename = UpdateTaxonomyInput { name: Some("   ".into()), ..Default::default() };
        assert!(rename.validate().is_err());
        let ok: CreateGroupInput = serde_json::from_str(r#"{"name":" Science "}"#).unwrap();
        assert!(ok.validate().is_ok());
    }
}
