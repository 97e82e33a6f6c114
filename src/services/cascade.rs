//! Multi-statement deletes and aggregate maintenance. Every function takes a
//! connection that is expected to be inside an open transaction.

use sqlx::PgConnection;
use uuid::Uuid;

/// Lock course rows in id order so concurrent writers queue instead of deadlocking.
pub async fn lock_courses(conn: &mut PgConnection, course_ids: &[Uuid]) -> Result<Vec<Uuid>, sqlx::Error> {
    if course_ids.is_empty() {
        return Ok(vec![]);
    }
    let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM courses WHERE id = ANY($1) ORDER BY id FOR UPDATE")
        .bind(course_ids)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Set `rating` / `total_ratings` from the course's current review rows.
/// No reviews yields 0 / 0.
pub async fn recompute_course_rating(conn: &mut PgConnection, course_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE courses c
        SET rating = agg.avg_rating, total_ratings = agg.review_count, updated_at = now()
        FROM (
            SELECT COALESCE(AVG(rating), 0)::float8 AS avg_rating, COUNT(*)::int4 AS review_count
            FROM reviews WHERE course_id = $1
        ) agg
        WHERE c.id = $1
        "#,
    )
    .bind(course_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Delete a course and everything hanging off it. Returns false when the
/// course did not exist. The course row is locked first, the same order
/// review writes use.
pub async fn purge_course(conn: &mut PgConnection, course_id: Uuid) -> Result<bool, sqlx::Error> {
    if lock_courses(conn, &[course_id]).await?.is_empty() {
        return Ok(false);
    }

    let statements = [
        "DELETE FROM reviews WHERE course_id = $1",
        "DELETE FROM certificates WHERE course_id = $1",
        "DELETE FROM enrollments WHERE course_id = $1",
        "DELETE FROM quiz_attempts WHERE quiz_id IN (SELECT id FROM quizzes WHERE course_id = $1)",
        "DELETE FROM questions WHERE quiz_id IN (SELECT id FROM quizzes WHERE course_id = $1)",
        "DELETE FROM quizzes WHERE course_id = $1",
    ];
    for sql in statements {
        sqlx::query(sql).bind(course_id).execute(&mut *conn).await?;
    }

    let deleted = sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(course_id)
        .execute(&mut *conn)
        .await?;
    Ok(deleted.rows_affected() > 0)
}

/// Delete a quiz with its attempts and questions.
pub async fn purge_quiz(conn: &mut PgConnection, quiz_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query("DELETE FROM quiz_attempts WHERE quiz_id = $1").bind(quiz_id).execute(&mut *conn).await?;
    sqlx::query("DELETE FROM questions WHERE quiz_id = $1").bind(quiz_id).execute(&mut *conn).await?;
    let deleted = sqlx::query("DELETE FROM quizzes WHERE id = $1").bind(quiz_id).execute(&mut *conn).await?;
    Ok(deleted.rows_affected() > 0)
}

/// Delete a user's reviews (re-aggregating the affected courses), certificates,
/// quiz attempts, enrollments and provided courses, then the user. Returns
/// false when the user did not exist.
pub async fn purge_user(conn: &mut PgConnection, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let reviewed: Vec<(Uuid,)> = sqlx::query_as("SELECT DISTINCT course_id FROM reviews WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
    let reviewed: Vec<Uuid> = reviewed.into_iter().map(|(id,)| id).collect();

    let provided: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM courses WHERE provider_id = $1")
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
    let provided: Vec<Uuid> = provided.into_iter().map(|(id,)| id).collect();

    // one locking pass in id order over every course this cascade touches
    let mut touched: Vec<Uuid> = reviewed.iter().chain(&provided).copied().collect();
    touched.sort_unstable();
    touched.dedup();
    lock_courses(conn, &touched).await?;

    sqlx::query("DELETE FROM reviews WHERE user_id = $1").bind(user_id).execute(&mut *conn).await?;
    for course_id in reviewed.iter().filter(|id| !provided.contains(id)) {
        recompute_course_rating(conn, *course_id).await?;
    }

    for sql in [
        "DELETE FROM certificates WHERE user_id = $1",
        "DELETE FROM quiz_attempts WHERE user_id = $1",
        "DELETE FROM enrollments WHERE user_id = $1",
    ] {
        sqlx::query(sql).bind(user_id).execute(&mut *conn).await?;
    }

    for course_id in provided {
        purge_course(conn, course_id).await?;
    }

    let deleted = sqlx::query("DELETE FROM users WHERE id = $1").bind(user_id).execute(&mut *conn).await?;
    Ok(deleted.rows_affected() > 0)
}
