// handlers/taxonomy.rs - course groups, sub-groups and sub-sub-groups

use axum::extract::State;
use uuid::Uuid;

use crate::database::models::{CourseGroup, GroupTree, SubGroupListItem, SubGroupTree, SubSubGroupDetail, SubSubGroupListItem};
use crate::extract::{ApiPath, ApiQuery, ValidJson};
use crate::filter::PaginationQuery;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::taxonomy_service::{
    CreateGroupInput, CreateSubGroupInput, CreateSubSubGroupInput, TaxonomyFilter, UpdateTaxonomyInput,
};
use crate::services::TaxonomyService;
use crate::state::AppState;

fn service(state: &AppState) -> TaxonomyService {
    TaxonomyService::new(state.pool.clone())
}

// Groups

pub async fn create_group(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<CreateGroupInput>,
) -> ApiResult<CourseGroup> {
    let group = service(&state).create_group(input).await?;
    Ok(ApiResponse::created("Course group created successfully", group))
}

/// GET /course-groups - Groups with their sub-group trees
pub async fn list_groups(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
) -> ApiResult<Vec<GroupTree>> {
    let (groups, meta) = service(&state).list_groups(&query).await?;
    Ok(ApiResponse::paginated("Course groups retrieved successfully", groups, meta))
}

pub async fn get_group(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<GroupTree> {
    let group = service(&state).get_group(id).await?;
    Ok(ApiResponse::success("Course group retrieved successfully", group))
}

pub async fn update_group(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ValidJson(input): ValidJson<UpdateTaxonomyInput>,
) -> ApiResult<CourseGroup> {
    let group = service(&state).update_group(id, input).await?;
    Ok(ApiResponse::success("Course group updated successfully", group))
}

pub async fn delete_group(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<()> {
    service(&state).delete_group(id).await?;
    Ok(ApiResponse::message("Course group deleted successfully"))
}

// Sub-groups

pub async fn create_sub_group(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<CreateSubGroupInput>,
) -> ApiResult<SubGroupListItem> {
    let sub_group = service(&state).create_sub_group(input).await?;
    Ok(ApiResponse::created("Course sub-group created successfully", sub_group))
}

/// GET /course-sub-groups?groupId= - Sub-groups with their sub-sub-groups
pub async fn list_sub_groups(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
    ApiQuery(filter): ApiQuery<TaxonomyFilter>,
) -> ApiResult<Vec<SubGroupTree>> {
    let (rows, meta) = service(&state).list_sub_groups(&query, &filter).await?;
    Ok(ApiResponse::paginated("Course sub-groups retrieved successfully", rows, meta))
}

pub async fn get_sub_group(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<SubGroupTree> {
    let sub_group = service(&state).get_sub_group(id).await?;
    Ok(ApiResponse::success("Course sub-group retrieved successfully", sub_group))
}

pub async fn update_sub_group(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ValidJson(input): ValidJson<UpdateTaxonomyInput>,
) -> ApiResult<SubGroupListItem> {
    let sub_group = service(&state).update_sub_group(id, input).await?;
    Ok(ApiResponse::success("Course sub-group updated successfully", sub_group))
}

pub async fn delete_sub_group(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<()> {
    service(&state).delete_sub_group(id).await?;
    Ok(ApiResponse::message("Course sub-group deleted successfully"))
}

// Sub-sub-groups

pub async fn create_sub_sub_group(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<CreateSubSubGroupInput>,
) -> ApiResult<SubSubGroupListItem> {
    let item = service(&state).create_sub_sub_group(input).await?;
    Ok(ApiResponse::created("Course sub-sub-group created successfully", item))
}

/// GET /course-sub-sub-groups?groupId=&subGroupId=
pub async fn list_sub_sub_groups(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
    ApiQuery(filter): ApiQuery<TaxonomyFilter>,
) -> ApiResult<Vec<SubSubGroupListItem>> {
    let (rows, meta) = service(&state).list_sub_sub_groups(&query, &filter).await?;
    Ok(ApiResponse::paginated("Course sub-sub-groups retrieved successfully", rows, meta))
}

pub async fn get_sub_sub_group(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<SubSubGroupDetail> {
    let item = service(&state).get_sub_sub_group(id).await?;
    Ok(ApiResponse::success("Course sub-sub-group retrieved successfully", item))
}

pub async fn update_sub_sub_group(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ValidJson(input): ValidJson<UpdateTaxonomyInput>,
) -> ApiResult<SubSubGroupListItem> {
    let item = service(&state).update_sub_sub_group(id, input).await?;
    Ok(ApiResponse::success("Course sub-sub-group updated successfully", item))
}

pub async fn delete_sub_sub_group(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<()> {
    service(&state).delete_sub_sub_group(id).await?;
    Ok(ApiResponse::message("Course sub-sub-group deleted successfully"))
}
