use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::{Question, QuestionView, Quiz, QuizAttempt, QuizView};
use crate::error::{ApiError, AppResult};
use crate::middleware::AuthUser;
use crate::services::cascade;

/// Share of correct answers needed to pass, in percent
pub const PASS_PERCENT: i64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionInput {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuizInput {
    pub questions: Vec<QuestionInput>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuizInput {
    pub answers: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub attempt: QuizAttempt,
    pub score: i32,
    pub total_questions: i32,
    pub percentage: f64,
    pub passed: bool,
}

impl From<QuizAttempt> for QuizResult {
    fn from(attempt: QuizAttempt) -> Self {
        Self {
            score: attempt.score,
            total_questions: attempt.total_questions,
            percentage: percentage(attempt.score, attempt.total_questions),
            passed: is_passing(attempt.score, attempt.total_questions),
            attempt,
        }
    }
}

/// Reject empty quizzes and malformed questions, naming the 1-based index.
pub fn validate_questions(questions: &[QuestionInput]) -> AppResult<()> {
    if questions.is_empty() {
        return Err(ApiError::bad_request("A quiz needs at least one question"));
    }
    for (i, q) in questions.iter().enumerate() {
        let n = i + 1;
        if q.question.trim().is_empty() {
            return Err(ApiError::bad_request(format!("Question {} is missing its text", n)));
        }
        if q.options.len() < 2 {
            return Err(ApiError::bad_request(format!("Question {} needs at least two options", n)));
        }
        if !q.options.contains(&q.answer) {
            return Err(ApiError::bad_request(format!("Question {} answer must be one of its options", n)));
        }
    }
    Ok(())
}

/// `answers[i]` is compared with the question at position `i`; missing
/// answers count as wrong.
pub fn score_answers(questions: &[Question], answers: &[String]) -> i32 {
    questions
        .iter()
        .enumerate()
        .filter(|(i, q)| answers.get(*i) == Some(&q.answer))
        .count() as i32
}

pub fn is_passing(score: i32, total: i32) -> bool {
    total > 0 && (score as i64) * 100 >= PASS_PERCENT * total as i64
}

pub fn percentage(score: i32, total: i32) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (score as f64 * 10000.0 / total as f64).round() / 100.0
}

/// The course's quiz with ordered questions, `None` when it has none.
pub async fn load_quiz_view(pool: &PgPool, course_id: Uuid, reveal_answers: bool) -> AppResult<Option<QuizView>> {
    let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE course_id = $1")
        .bind(course_id)
        .fetch_optional(pool)
        .await?;
    let Some(quiz) = quiz else {
        return Ok(None);
    };

    let questions = load_questions(pool, quiz.id).await?;
    Ok(Some(QuizView {
        id: quiz.id,
        course_id: quiz.course_id,
        created_at: quiz.created_at,
        questions: questions
            .into_iter()
            .map(|q| QuestionView::from_question(q, reveal_answers))
            .collect(),
    }))
}

async fn load_questions(pool: &PgPool, quiz_id: Uuid) -> AppResult<Vec<Question>> {
    Ok(sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE quiz_id = $1 ORDER BY position")
        .bind(quiz_id)
        .fetch_all(pool)
        .await?)
}

pub struct QuizService {
    pool: PgPool,
}

impl QuizService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, auth: &AuthUser, course_id: Uuid, input: CreateQuizInput) -> AppResult<QuizView> {
        validate_questions(&input.questions)?;

        let provider_id = sqlx::query_scalar::<_, Uuid>("SELECT provider_id FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Course not found"))?;
        if !auth.can_manage(provider_id) {
            return Err(ApiError::forbidden("You can only manage your own courses"));
        }

        let existing = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM quizzes WHERE course_id = $1)")
            .bind(course_id)
            .fetch_one(&self.pool)
            .await?;
        if existing {
            return Err(ApiError::bad_request("Quiz already exists for this course"));
        }

        let quiz_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO quizzes (id, course_id) VALUES ($1, $2)")
            .bind(quiz_id)
            .bind(course_id)
            .execute(&mut *tx)
            .await?;
        for (position, q) in input.questions.into_iter().enumerate() {
            sqlx::query(
                "INSERT INTO questions (id, quiz_id, position, question, options, answer) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(quiz_id)
            .bind(position as i32)
            .bind(q.question.trim())
            .bind(q.options)
            .bind(q.answer)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(quiz_id = %quiz_id, course_id = %course_id, "Quiz created");
        load_quiz_view(&self.pool, course_id, true)
            .await?
            .ok_or_else(|| ApiError::not_found("Quiz not found"))
    }

    /// Answers are only revealed to admins and the course's provider.
    pub async fn get_for_course(&self, auth: &AuthUser, course_id: Uuid) -> AppResult<QuizView> {
        let provider_id = sqlx::query_scalar::<_, Uuid>("SELECT provider_id FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Course not found"))?;

        load_quiz_view(&self.pool, course_id, auth.can_manage(provider_id))
            .await?
            .ok_or_else(|| ApiError::not_found("Quiz not found for this course"))
    }

    pub async fn delete(&self, auth: &AuthUser, quiz_id: Uuid) -> AppResult<()> {
        let provider_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT c.provider_id FROM quizzes q JOIN courses c ON c.id = q.course_id WHERE q.id = $1",
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Quiz not found"))?;
        if !auth.can_manage(provider_id) {
            return Err(ApiError::forbidden("You can only manage your own courses"));
        }

        let mut tx = self.pool.begin().await?;
        if !cascade::purge_quiz(&mut tx, quiz_id).await? {
            return Err(ApiError::not_found("Quiz not found"));
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn submit(&self, user_id: Uuid, quiz_id: Uuid, input: SubmitQuizInput) -> AppResult<QuizResult> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM quizzes WHERE id = $1)")
            .bind(quiz_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(ApiError::not_found("Quiz not found"));
        }
        if self.find_attempt(user_id, quiz_id).await?.is_some() {
            return Err(ApiError::bad_request("You have already attempted this quiz"));
        }

        let questions = load_questions(&self.pool, quiz_id).await?;
        let score = score_answers(&questions, &input.answers);

        // a concurrent second submit trips quiz_attempts_user_quiz_key
        let attempt = sqlx::query_as::<_, QuizAttempt>(
            r#"
            INSERT INTO quiz_attempts (id, user_id, quiz_id, score, total_questions)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(quiz_id)
        .bind(score)
        .bind(questions.len() as i32)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(quiz_id = %quiz_id, user_id = %user_id, score, total = questions.len(), "Quiz submitted");
        Ok(attempt.into())
    }

    pub async fn my_attempt(&self, user_id: Uuid, quiz_id: Uuid) -> AppResult<QuizResult> {
        self.find_attempt(user_id, quiz_id)
            .await?
            .map(QuizResult::from)
            .ok_or_else(|| ApiError::not_found("No attempt found for this quiz"))
    }

    async fn find_attempt(&self, user_id: Uuid, quiz_id: Uuid) -> AppResult<Option<QuizAttempt>> {
        Ok(
            sqlx::query_as::<_, QuizAttempt>("SELECT * FROM quiz_attempts WHERE user_id = $1 AND quiz_id = $2")
                .bind(user_id)
                .bind(quiz_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(position: i32, answer: &str) -> Question {
        Question {
            id: Uuid::new_v4(),
            quiz_id: Uuid::nil(),
            position,
            question: format!("Q{}", position),
            options: vec!["a".into(), "b".into(), "c".into()],
            answer: answer.to_string(),
        }
    }

    fn input(options: &[&str], answer: &str) -> QuestionInput {
        QuestionInput {
            question: "What?".into(),
            options: options.iter().map(|s| s.to_string()).collect(),
            answer: answer.into(),
        }
    }

    #[test]
    fn validation_names_the_offending_question() {
        assert!(validate_questions(&[]).is_err());
        assert!(validate_questions(&[input(&["a", "b"], "a")]).is_ok());

        let err = validate_questions(&[input(&["a", "b"], "a"), input(&["a"], "a")]).unwrap_err();
        assert!(err.message().contains("Question 2"), "{}", err.message());

        let err = validate_questions(&[input(&["a", "b"], "c")]).unwrap_err();
        assert!(err.message().contains("Question 1"));
    }

    #[test]
    fn scores_by_position() {
        let questions = vec![question(0, "a"), question(1, "b"), question(2, "c")];
        let answers = vec!["a".to_string(), "c".to_string(), "c".to_string()];
        assert_eq!(score_answers(&questions, &answers), 2);
        assert_eq!(score_answers(&questions, &["a".to_string()]), 1);
        assert_eq!(score_answers(&questions, &[]), 0);
    }

    #[test]
    fn sixty_percent_passes() {
        assert!(is_passing(3, 5));
        assert!(!is_passing(2, 5));
        assert!(is_passing(6, 10));
        assert!(!is_passing(5, 10));
        assert!(!is_passing(0, 0));
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(0, 0), 0.0);
    }
}
