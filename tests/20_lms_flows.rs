//! End-to-end service flows against a real database. Each test returns early
//! when `TEST_DATABASE_URL` is not set.

use anyhow::Result;
use futures::future::join_all;
use uuid::Uuid;

use lms_api::database::models::Course;
use lms_api::filter::PaginationQuery;
use lms_api::middleware::AuthUser;
use lms_api::services::course_service::{CourseFilter, CreateCourseInput};
use lms_api::services::enrollment_service::EnrollmentFilter;
use lms_api::services::quiz_service::{CreateQuizInput, QuestionInput, SubmitQuizInput};
use lms_api::services::review_service::ReviewInput;
use lms_api::services::{CourseService, EnrollmentService, QuizService, ReviewService};
use lms_api::testing::{test_pool, TestContext};
use lms_api::types::Role;

macro_rules! require_db {
    () => {
        match test_pool().await? {
            Some(pool) => TestContext::new(pool),
            None => {
                eprintln!("TEST_DATABASE_URL not set; skipping");
                return Ok(());
            }
        }
    };
}

fn course_input(sub_sub_group_id: Uuid) -> CreateCourseInput {
    CreateCourseInput {
        name: TestContext::unique("course"),
        overview: "Overview".to_string(),
        duration: "2h".to_string(),
        learning_points: vec!["one".to_string()],
        sub_sub_group_id,
        resources: vec![],
        video_url: None,
    }
}

async fn provider_with_course(ctx: &mut TestContext) -> Result<(AuthUser, Uuid)> {
    let provider = ctx.create_user(Role::Provider).await?;
    let auth = AuthUser { id: provider.id, role: Role::Provider };
    let leaf = ctx.create_taxonomy().await?;
    let course = CourseService::new(ctx.pool.clone()).create(&auth, course_input(leaf)).await?;
    Ok((auth, course.id))
}

async fn load_course(ctx: &TestContext, id: Uuid) -> Result<Course> {
    Ok(CourseService::new(ctx.pool.clone()).get_course(id).await?)
}

fn questions(n: usize) -> Vec<QuestionInput> {
    (1..=n)
        .map(|i| QuestionInput {
            question: format!("Question {i}?"),
            options: vec!["a".into(), "b".into()],
            answer: "a".into(),
        })
        .collect()
}

fn all_correct(n: usize) -> Vec<String> {
    vec!["a".to_string(); n]
}

/// Rows in `table` whose `column` equals `id`. Both names are test literals.
async fn count_rows(ctx: &TestContext, table: &str, column: &str, id: Uuid) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE {column} = $1");
    Ok(sqlx::query_scalar(&sql).bind(id).fetch_one(&ctx.pool).await?)
}

#[tokio::test]
async fn course_under_missing_sub_sub_group_is_not_found() -> Result<()> {
    let mut ctx = require_db!();
    let provider = ctx.create_user(Role::Provider).await?;
    let auth = AuthUser { id: provider.id, role: Role::Provider };

    let err = CourseService::new(ctx.pool.clone())
        .create(&auth, course_input(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);

    ctx.cleanup().await
}

#[tokio::test]
async fn creating_with_a_video_marks_it_uploaded() -> Result<()> {
    let mut ctx = require_db!();
    let provider = ctx.create_user(Role::Provider).await?;
    let auth = AuthUser { id: provider.id, role: Role::Provider };
    let leaf = ctx.create_taxonomy().await?;
    let courses = CourseService::new(ctx.pool.clone());

    let with_video = CreateCourseInput { video_url: Some("https://videos.test/intro.mp4".into()), ..course_input(leaf) };
    let id = courses.create(&auth, with_video).await?.id;
    let course = load_course(&ctx, id).await?;
    assert!(course.video_uploaded);
    assert_eq!(course.video_url.as_deref(), Some("https://videos.test/intro.mp4"));

    let id = courses.create(&auth, course_input(leaf)).await?.id;
    assert!(!load_course(&ctx, id).await?.video_uploaded);

    ctx.cleanup().await
}

#[tokio::test]
async fn rating_tracks_mean_and_count_of_reviews() -> Result<()> {
    let mut ctx = require_db!();
    let (_, course_id) = provider_with_course(&mut ctx).await?;
    let enrollments = EnrollmentService::new(ctx.pool.clone());
    let reviews = ReviewService::new(ctx.pool.clone());

    let a = ctx.create_user(Role::User).await?;
    let b = ctx.create_user(Role::User).await?;
    enrollments.enroll(a.id, course_id).await?;
    enrollments.enroll(b.id, course_id).await?;

    reviews.upsert(a.id, course_id, ReviewInput { rating: 5, comment: None }).await?;
    reviews.upsert(b.id, course_id, ReviewInput { rating: 2, comment: Some("meh".into()) }).await?;
    let course = load_course(&ctx, course_id).await?;
    assert_eq!(course.total_ratings, 2);
    assert!((course.rating - 3.5).abs() < 1e-9);

    // second review by the same learner replaces the first
    reviews.upsert(b.id, course_id, ReviewInput { rating: 4, comment: None }).await?;
    let course = load_course(&ctx, course_id).await?;
    assert_eq!(course.total_ratings, 2);
    assert!((course.rating - 4.5).abs() < 1e-9);

    // reviewing without an enrollment is refused
    let outsider = ctx.create_user(Role::User).await?;
    let err = reviews
        .upsert(outsider.id, course_id, ReviewInput { rating: 1, comment: None })
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    ctx.cleanup().await
}

#[tokio::test]
async fn enrolling_twice_conflicts() -> Result<()> {
    let mut ctx = require_db!();
    let (_, course_id) = provider_with_course(&mut ctx).await?;
    let learner = ctx.create_user(Role::User).await?;
    let enrollments = EnrollmentService::new(ctx.pool.clone());

    enrollments.enroll(learner.id, course_id).await?;
    let err = enrollments.enroll(learner.id, course_id).await.unwrap_err();
    assert_eq!(err.status_code(), 409);

    let check = enrollments.check(learner.id, course_id).await?;
    assert!(check.is_enrolled);
    assert!(!check.completed);

    ctx.cleanup().await
}

#[tokio::test]
async fn quiz_gates_completion_and_issues_one_certificate() -> Result<()> {
    let mut ctx = require_db!();
    let (provider, course_id) = provider_with_course(&mut ctx).await?;
    let learner = ctx.create_user(Role::User).await?;
    let enrollments = EnrollmentService::new(ctx.pool.clone());
    let quizzes = QuizService::new(ctx.pool.clone());

    let quiz = quizzes.create(&provider, course_id, CreateQuizInput { questions: questions(5) }).await?;
    enrollments.enroll(learner.id, course_id).await?;

    let err = enrollments.complete(learner.id, course_id).await.unwrap_err();
    assert_eq!(err.status_code(), 400);

    // 3 of 5 is exactly 60%
    let answers = vec!["a", "a", "a", "b", "b"].into_iter().map(String::from).collect();
    let result = quizzes.submit(learner.id, quiz.id, SubmitQuizInput { answers }).await?;
    assert_eq!(result.score, 3);
    assert!(result.passed);

    let again = quizzes
        .submit(learner.id, quiz.id, SubmitQuizInput { answers: vec![] })
        .await
        .unwrap_err();
    assert_eq!(again.status_code(), 400);

    let completed = enrollments.complete(learner.id, course_id).await?;
    assert!(completed.enrollment.completed);
    assert_eq!(completed.certificate.course_id, course_id);

    let err = enrollments.complete(learner.id, course_id).await.unwrap_err();
    assert_eq!(err.status_code(), 409);

    let certificates = enrollments.my_certificates(learner.id, &EnrollmentFilter::default()).await?;
    assert_eq!(certificates.len(), 1);

    ctx.cleanup().await
}

#[tokio::test]
async fn deleting_a_user_removes_dependents_and_recomputes_ratings() -> Result<()> {
    let mut ctx = require_db!();
    let (provider, course_id) = provider_with_course(&mut ctx).await?;
    let enrollments = EnrollmentService::new(ctx.pool.clone());
    let reviews = ReviewService::new(ctx.pool.clone());
    let quizzes = QuizService::new(ctx.pool.clone());

    let quiz = quizzes.create(&provider, course_id, CreateQuizInput { questions: questions(5) }).await?;
    let stays = ctx.create_user(Role::User).await?;
    let leaves = ctx.create_user(Role::User).await?;
    for user in [&stays, &leaves] {
        enrollments.enroll(user.id, course_id).await?;
    }
    reviews.upsert(stays.id, course_id, ReviewInput { rating: 2, comment: None }).await?;
    reviews.upsert(leaves.id, course_id, ReviewInput { rating: 4, comment: None }).await?;
    quizzes.submit(leaves.id, quiz.id, SubmitQuizInput { answers: all_correct(5) }).await?;
    enrollments.complete(leaves.id, course_id).await?;

    ctx.users().delete(leaves.id).await?;

    let course = load_course(&ctx, course_id).await?;
    assert_eq!(course.total_ratings, 1);
    assert!((course.rating - 2.0).abs() < 1e-9);

    for table in ["enrollments", "reviews", "quiz_attempts", "certificates"] {
        assert_eq!(count_rows(&ctx, table, "user_id", leaves.id).await?, 0, "{table}");
    }
    assert_eq!(ctx.users().get_user(leaves.id).await.unwrap_err().status_code(), 404);
    assert_eq!(ctx.users().delete(leaves.id).await.unwrap_err().status_code(), 404);

    ctx.cleanup().await
}

#[tokio::test]
async fn deleting_a_user_without_dependents_succeeds() -> Result<()> {
    let mut ctx = require_db!();
    let loner = ctx.create_user(Role::User).await?;

    ctx.users().delete(loner.id).await?;
    assert_eq!(ctx.users().get_user(loner.id).await.unwrap_err().status_code(), 404);

    ctx.cleanup().await
}

#[tokio::test]
async fn deleting_a_course_removes_its_dependents_only() -> Result<()> {
    let mut ctx = require_db!();
    let (provider, doomed) = provider_with_course(&mut ctx).await?;
    let courses = CourseService::new(ctx.pool.clone());
    let kept = courses.create(&provider, course_input(load_course(&ctx, doomed).await?.sub_sub_group_id)).await?.id;
    let enrollments = EnrollmentService::new(ctx.pool.clone());
    let reviews = ReviewService::new(ctx.pool.clone());
    let quizzes = QuizService::new(ctx.pool.clone());

    let quiz = quizzes.create(&provider, doomed, CreateQuizInput { questions: questions(5) }).await?;
    let learner = ctx.create_user(Role::User).await?;
    for course_id in [doomed, kept] {
        enrollments.enroll(learner.id, course_id).await?;
    }
    reviews.upsert(learner.id, doomed, ReviewInput { rating: 1, comment: None }).await?;
    reviews.upsert(learner.id, kept, ReviewInput { rating: 5, comment: None }).await?;
    quizzes.submit(learner.id, quiz.id, SubmitQuizInput { answers: all_correct(5) }).await?;
    enrollments.complete(learner.id, doomed).await?;

    courses.delete(&provider, doomed).await?;

    for table in ["reviews", "certificates", "enrollments", "quizzes"] {
        assert_eq!(count_rows(&ctx, table, "course_id", doomed).await?, 0, "{table}");
    }
    assert_eq!(count_rows(&ctx, "quiz_attempts", "quiz_id", quiz.id).await?, 0);
    assert_eq!(count_rows(&ctx, "questions", "quiz_id", quiz.id).await?, 0);
    assert_eq!(count_rows(&ctx, "courses", "id", doomed).await?, 0);

    let other = load_course(&ctx, kept).await?;
    assert_eq!(other.total_ratings, 1);
    assert!((other.rating - 5.0).abs() < 1e-9);
    assert_eq!(count_rows(&ctx, "enrollments", "course_id", kept).await?, 1);

    ctx.cleanup().await
}

#[tokio::test]
async fn reviews_racing_a_course_delete_never_fail_internally() -> Result<()> {
    let mut ctx = require_db!();
    let provider = ctx.create_user(Role::Provider).await?;
    let auth = AuthUser { id: provider.id, role: Role::Provider };
    let leaf = ctx.create_taxonomy().await?;
    let courses = CourseService::new(ctx.pool.clone());
    let enrollments = EnrollmentService::new(ctx.pool.clone());
    let reviews = ReviewService::new(ctx.pool.clone());

    let mut learners = Vec::new();
    for _ in 0..3 {
        learners.push(ctx.create_user(Role::User).await?.id);
    }

    for round in 0..10 {
        let course_id = courses.create(&auth, course_input(leaf)).await?.id;
        for learner in &learners {
            enrollments.enroll(*learner, course_id).await?;
            reviews.upsert(*learner, course_id, ReviewInput { rating: 3, comment: None }).await?;
        }

        let upserts = learners.iter().enumerate().map(|(i, learner)| {
            let rating = 1 + (round + i as i32) % 5;
            reviews.upsert(*learner, course_id, ReviewInput { rating, comment: None })
        });
        let (deleted, upserted) = tokio::join!(courses.delete(&auth, course_id), join_all(upserts));

        deleted?;
        for result in upserted {
            if let Err(e) = result {
                assert_eq!(e.status_code(), 404, "round {round}: {e}");
            }
        }
        assert_eq!(count_rows(&ctx, "reviews", "course_id", course_id).await?, 0);
    }

    ctx.cleanup().await
}

#[tokio::test]
async fn pagination_reports_pages_and_clamps_short_last_page() -> Result<()> {
    let mut ctx = require_db!();
    let provider = ctx.create_user(Role::Provider).await?;
    let auth = AuthUser { id: provider.id, role: Role::Provider };
    let leaf = ctx.create_taxonomy().await?;
    let courses = CourseService::new(ctx.pool.clone());

    for _ in 0..15 {
        courses.create(&auth, course_input(leaf)).await?;
    }

    let filter = CourseFilter { provider_id: Some(provider.id), ..Default::default() };
    let query = PaginationQuery { page: Some(2), limit: Some(10), ..Default::default() };
    let (items, meta) = courses.list(&query, &filter).await?;
    assert_eq!(items.len(), 5);
    assert_eq!(meta.total, 15);
    assert_eq!(meta.total_page, 2);
    assert_eq!(meta.page, 2);

    let bad_sort = PaginationQuery { sort_by: Some("password".into()), ..Default::default() };
    assert_eq!(courses.list(&bad_sort, &filter).await.unwrap_err().status_code(), 400);

    ctx.cleanup().await
}
