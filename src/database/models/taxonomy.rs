use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CourseGroup {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of `sub_group_catalog`
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SubGroupListItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub group_id: Uuid,
    pub group_name: String,
    pub sub_sub_group_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of `sub_sub_group_catalog`: the level plus its parent chain
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SubSubGroupListItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sub_group_id: Uuid,
    pub sub_group_name: String,
    pub group_id: Uuid,
    pub group_name: String,
    pub course_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTree {
    #[serde(flatten)]
    pub group: CourseGroup,
    pub sub_groups: Vec<SubGroupTree>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubGroupTree {
    #[serde(flatten)]
    pub sub_group: SubGroupListItem,
    pub sub_sub_groups: Vec<SubSubGroupListItem>,
}

/// A sub-sub-group with its parent chain and the courses filed under it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubSubGroupDetail {
    #[serde(flatten)]
    pub sub_sub_group: SubSubGroupListItem,
    pub courses: Vec<super::course::CourseListItem>,
}
