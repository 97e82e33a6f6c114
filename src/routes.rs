// routes.rs - router assembly
//
// Public → authenticated (any role) → role-restricted. Guards are attached
// per method with `route_layer`, so a path can mix public reads with
// restricted writes.

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::{self, StorageBackend};
use crate::handlers::{courses, dashboard, enrollments, files, health, quizzes, reviews, subscriptions, taxonomy, users};
use crate::middleware::{admin_only, admin_or_provider, jwt_auth_middleware, students_only};
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let config = config::config();

    let api = Router::new()
        .nest("/users", user_routes())
        .nest("/course-groups", group_routes())
        .nest("/course-sub-groups", sub_group_routes())
        .nest("/course-sub-sub-groups", sub_sub_group_routes())
        .nest("/courses", course_routes())
        .nest("/quizzes", quiz_routes())
        .nest("/enrollments", enrollment_routes())
        .nest("/reviews", review_routes())
        .nest("/subscriptions", subscription_routes())
        .nest("/dashboard", dashboard_routes())
        .nest("/files", file_routes());

    let mut router = Router::new()
        .route("/health", get(health::health))
        .nest(&config.api.prefix, api)
        .fallback(health::not_found)
        .with_state(state);

    if config.storage.backend == StorageBackend::Local {
        router = router.nest_service("/uploads", ServeDir::new(&config.storage.local_dir));
    }

    router
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors_layer(&config.security.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route(
            "/change-password",
            patch(users::change_password).route_layer(from_fn(jwt_auth_middleware)),
        )
        .route(
            "/me",
            get(users::me)
                .patch(users::update_me)
                .route_layer(from_fn(jwt_auth_middleware)),
        )
        .route("/", get(users::list).route_layer(from_fn(admin_only)))
        .route(
            "/:id",
            get(users::get)
                .patch(users::update)
                .delete(users::delete)
                .route_layer(from_fn(admin_only)),
        )
        .route("/:id/role", patch(users::update_role).route_layer(from_fn(admin_only)))
}

fn group_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(taxonomy::list_groups).merge(post(taxonomy::create_group).route_layer(from_fn(admin_only))),
        )
        .route(
            "/:id",
            get(taxonomy::get_group).merge(
                patch(taxonomy::update_group)
                    .delete(taxonomy::delete_group)
                    .route_layer(from_fn(admin_only)),
            ),
        )
}

fn sub_group_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(taxonomy::list_sub_groups).merge(post(taxonomy::create_sub_group).route_layer(from_fn(admin_only))),
        )
        .route(
            "/:id",
            get(taxonomy::get_sub_group).merge(
                patch(taxonomy::update_sub_group)
                    .delete(taxonomy::delete_sub_group)
                    .route_layer(from_fn(admin_only)),
            ),
        )
}

fn sub_sub_group_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(taxonomy::list_sub_sub_groups)
                .merge(post(taxonomy::create_sub_sub_group).route_layer(from_fn(admin_only))),
        )
        .route(
            "/:id",
            get(taxonomy::get_sub_sub_group).merge(
                patch(taxonomy::update_sub_sub_group)
                    .delete(taxonomy::delete_sub_sub_group)
                    .route_layer(from_fn(admin_only)),
            ),
        )
}

fn course_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(courses::list).merge(post(courses::create).route_layer(from_fn(admin_or_provider))),
        )
        .route(
            "/by-group/:groupId",
            get(courses::list_by_group).route_layer(from_fn(admin_or_provider)),
        )
        .route(
            "/by-subgroup/:subGroupId",
            get(courses::list_by_sub_group).route_layer(from_fn(admin_or_provider)),
        )
        .route(
            "/:id",
            get(courses::get).merge(
                patch(courses::update)
                    .delete(courses::delete)
                    .route_layer(from_fn(admin_or_provider)),
            ),
        )
        .route(
            "/:id/video",
            post(courses::set_video)
                .delete(courses::remove_video)
                .route_layer(from_fn(admin_or_provider)),
        )
        .route(
            "/:id/resources",
            post(courses::add_resource)
                .delete(courses::remove_resource)
                .route_layer(from_fn(admin_or_provider)),
        )
}

fn quiz_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/courses/:courseId/quiz",
            get(quizzes::get_for_course)
                .route_layer(from_fn(jwt_auth_middleware))
                .merge(post(quizzes::create).route_layer(from_fn(admin_or_provider))),
        )
        .route("/:quizId", delete(quizzes::delete).route_layer(from_fn(admin_or_provider)))
        .route("/:quizId/submit", post(quizzes::submit).route_layer(from_fn(students_only)))
        .route("/:quizId/my-attempt", get(quizzes::my_attempt).route_layer(from_fn(students_only)))
}

fn enrollment_routes() -> Router<AppState> {
    let learner = Router::new()
        .route("/courses/:courseId/enroll", post(enrollments::enroll))
        .route("/courses/:courseId/complete", patch(enrollments::complete))
        .route("/check-enrollment/:courseId", get(enrollments::check))
        .route("/my-enrollments", get(enrollments::my_enrollments))
        .route("/my-enrollments/by-group/:groupId", get(enrollments::my_enrollments_by_group))
        .route("/my-enrollments/by-subgroup/:subGroupId", get(enrollments::my_enrollments_by_sub_group))
        .route(
            "/my-enrollments/by-sub-subgroup/:subSubGroupId",
            get(enrollments::my_enrollments_by_sub_sub_group),
        )
        .route("/my-certificates", get(enrollments::my_certificates))
        .route_layer(from_fn(students_only));

    learner.route(
        "/courses/:courseId/enrollments",
        get(enrollments::course_enrollments).route_layer(from_fn(admin_or_provider)),
    )
}

fn review_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/courses/:courseId",
            get(reviews::course_reviews).merge(post(reviews::upsert).route_layer(from_fn(students_only))),
        )
        .route("/my-reviews", get(reviews::my_reviews).route_layer(from_fn(students_only)))
        .route("/:reviewId", delete(reviews::delete).route_layer(from_fn(jwt_auth_middleware)))
}

fn subscription_routes() -> Router<AppState> {
    let authenticated = Router::new()
        .route("/create-customer", post(subscriptions::create_customer))
        .route("/attach-payment", post(subscriptions::attach_payment))
        .route("/subscribe", post(subscriptions::subscribe))
        .route("/cancel", post(subscriptions::cancel))
        .route("/status", get(subscriptions::status))
        .route("/my-details", get(subscriptions::my_details))
        .route_layer(from_fn(jwt_auth_middleware));

    authenticated
        .route("/price-ids", get(subscriptions::price_ids))
        .route("/subscribers", get(subscriptions::subscribers).route_layer(from_fn(admin_only)))
}

fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/summary", get(dashboard::summary))
        .route("/registrations/monthly", get(dashboard::monthly_registrations))
        .route("/registrations/daily", get(dashboard::daily_registrations))
        .route_layer(from_fn(admin_only))
}

fn file_routes() -> Router<AppState> {
    // multipart framing on top of the raw file
    let upload_limit = config::config().api.max_upload_bytes + 1024 * 1024;

    Router::new()
        .route(
            "/upload",
            post(files::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/delete", delete(files::delete))
        .route_layer(from_fn(jwt_auth_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::testing::{bearer, lazy_pool, test_state};
    use crate::types::Role;

    fn router() -> Router {
        app(test_state(lazy_pool().unwrap()))
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get_as(uri: &str, role: Option<Role>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(role) = role {
            builder = builder.header(header::AUTHORIZATION, bearer(Uuid::new_v4(), role).unwrap());
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, role: Option<Role>, body: Value) -> Request<Body> {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(role) = role {
            builder = builder.header(header::AUTHORIZATION, bearer(Uuid::new_v4(), role).unwrap());
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn health_reports_running() {
        let (status, body) = send(get_as("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Server is running");
    }

    #[tokio::test]
    async fn unknown_route_uses_error_envelope() {
        let (status, body) = send(get_as("/api/v1/nothing-here", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Not Found");
        assert_eq!(body["errorMessages"][0]["path"], "/api/v1/nothing-here");
        assert_eq!(body["errorMessages"][0]["message"], "API Not Found");
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let (status, body) = send(get_as("/api/v1/users/me", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let request = Request::get("/api/v1/enrollments/my-enrollments")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn role_guards_reject_other_roles() {
        let (status, _) = send(get_as("/api/v1/dashboard/summary", Some(Role::User))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(get_as("/api/v1/users", Some(Role::Provider))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(post_json("/api/v1/courses", Some(Role::User), json!({ "name": "x" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let uri = format!("/api/v1/enrollments/courses/{}/enroll", Uuid::new_v4());
        let (status, _) = send(post_json(&uri, Some(Role::Provider), json!({}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(post_json("/api/v1/course-groups", Some(Role::Provider), json!({ "name": "g" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn invalid_bodies_are_rejected_before_the_database() {
        let (status, body) = send(post_json(
            "/api/v1/users/register",
            None,
            json!({ "name": "Ann", "email": "not-an-email", "password": "secret1" }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["errorMessages"].as_array().is_some_and(|errors| !errors.is_empty()));

        let uri = format!("/api/v1/reviews/courses/{}", Uuid::new_v4());
        let (status, body) = send(post_json(&uri, Some(Role::User), json!({ "rating": 9 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorMessages"][0]["path"], "rating");
    }

    #[tokio::test]
    async fn malformed_path_ids_are_bad_requests() {
        let (status, _) = send(get_as("/api/v1/enrollments/check-enrollment/not-a-uuid", Some(Role::User))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
