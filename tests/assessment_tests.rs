// tests/assessment_tests.rs

mod common;

use std::collections::HashMap;

use chrono::{Duration, Utc};
use common::{TestApp, answer_key_workbook, spawn_app, unique_name};
use serde_json::{Value, json};

/// Creates an MCQ test with a three-question answer key.
async fn mcq_test(app: &TestApp, admin: &str) -> i64 {
    let test_id = app
        .create_test(
            admin,
            json!({
                "title": "Geography basics",
                "description": "Warm-up quiz",
                "kind": "mcq",
                "duration_minutes": 15
            }),
        )
        .await;

    let workbook = answer_key_workbook(vec![
        vec!["Capital of France?", "Paris", "Rome", "Madrid", "A"],
        vec!["Largest ocean?", "Atlantic", "Pacific", "Pacific"],
        vec!["Continent of Kenya?", "Asia", "Africa", "Europe", "B"],
    ]);
    let resp = app.upload_answer_key(admin, test_id, workbook).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["questions"], 3);

    test_id
}

#[tokio::test]
async fn mcq_flow_scores_once_and_blocks_retakes() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.user_token().await;
    let test_id = mcq_test(&app, &admin).await;

    // Catalogue shows the test as not attempted
    let tests: Vec<Value> = app.get("/api/tests/user-tests", &token).await.json().await.unwrap();
    let entry = tests.iter().find(|t| t["id"] == test_id).expect("test listed");
    assert_eq!(entry["attempted"], false);
    assert_eq!(entry["question_count"], 3);

    // Eligible before submitting
    let eligibility: Value = app
        .get(&format!("/api/tests/check-eligibility/{}", test_id), &token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(eligibility["eligible"], true);

    // Start: questions come without answers
    let started: Value = app
        .post(&format!("/api/tests/start/{}", test_id), &token, json!({}))
        .await
        .json()
        .await
        .unwrap();
    let questions = started["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    assert!(questions.iter().all(|q| q.get("answer").is_none()));
    assert_eq!(started["timer"]["expired"], false);
    assert!(started["timer"]["remaining_seconds"].as_i64().unwrap() > 14 * 60);

    // Restarting resumes the same clock
    let resumed: Value = app
        .post(&format!("/api/tests/start/{}", test_id), &token, json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(resumed["timer"]["started_at"], started["timer"]["started_at"]);

    // Answer two of three correctly, with sloppy casing on one
    let mut answers: HashMap<i64, String> = HashMap::new();
    for q in questions {
        let id = q["id"].as_i64().unwrap();
        let answer = match q["content"].as_str().unwrap() {
            "Capital of France?" => " paris ",
            "Largest ocean?" => "Atlantic",
            _ => "Africa",
        };
        answers.insert(id, answer.to_string());
    }

    let submit = app
        .post(
            &format!("/api/tests/submit/{}", test_id),
            &token,
            json!({ "answers": answers }),
        )
        .await;
    assert_eq!(submit.status().as_u16(), 200);
    let result: Value = submit.json().await.unwrap();
    assert_eq!(result["score"], 2);
    assert_eq!(result["total"], 3);
    assert_eq!(result["passed"], true);
    assert_eq!(result["late"], false);
    assert_eq!(result["status"], "graded");

    // One attempt only
    let again = app
        .post(
            &format!("/api/tests/submit/{}", test_id),
            &token,
            json!({ "answers": answers }),
        )
        .await;
    assert_eq!(again.status().as_u16(), 409);

    let restart = app
        .post(&format!("/api/tests/start/{}", test_id), &token, json!({}))
        .await;
    assert_eq!(restart.status().as_u16(), 409);

    let eligibility: Value = app
        .get(&format!("/api/tests/check-eligibility/{}", test_id), &token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(eligibility["eligible"], false);
    assert_eq!(eligibility["reason"], "already_attempted");

    // Catalogue, profile, leaderboard and admin view reflect the result
    let tests: Vec<Value> = app.get("/api/tests/user-tests", &token).await.json().await.unwrap();
    let entry = tests.iter().find(|t| t["id"] == test_id).unwrap();
    assert_eq!(entry["attempted"], true);
    assert_eq!(entry["score"], 2);

    let me: Value = app.get("/api/users/me", &token).await.json().await.unwrap();
    assert_eq!(me["tests_taken"], 1);
    assert_eq!(me["average_percentage"], 66.67);

    let mine: Vec<Value> = app.get("/api/users/me/results", &token).await.json().await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["title"], "Geography basics");

    let board: Vec<Value> = app
        .client
        .get(app.url(&format!("/api/tests/{}/leaderboard", test_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0]["score"], 2);

    let admin_view: Vec<Value> = app
        .get(&format!("/api/admin/tests/{}/results", test_id), &admin)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(admin_view.len(), 1);
    assert_eq!(admin_view[0]["fullscreen_exits"], 0);
}

#[tokio::test]
async fn submit_requires_started_attempt() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.user_token().await;
    let test_id = mcq_test(&app, &admin).await;

    let resp = app
        .post(
            &format!("/api/tests/submit/{}", test_id),
            &token,
            json!({ "answers": {} }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 400);

    let timer = app.get(&format!("/api/tests/timer/{}", test_id), &token).await;
    assert_eq!(timer.status().as_u16(), 404);
}

#[tokio::test]
async fn submit_with_wrong_payload_for_kind_is_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.user_token().await;
    let test_id = mcq_test(&app, &admin).await;

    app.post(&format!("/api/tests/start/{}", test_id), &token, json!({}))
        .await;
    let resp = app
        .post(
            &format!("/api/tests/submit/{}", test_id),
            &token,
            json!({ "typed_text": "hello" }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 400);

    // The rejected payload did not consume the attempt
    let eligibility: Value = app
        .get(&format!("/api/tests/check-eligibility/{}", test_id), &token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(eligibility["eligible"], true);
}

#[tokio::test]
async fn late_submission_is_flagged() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.user_token().await;
    let test_id = mcq_test(&app, &admin).await;

    app.post(&format!("/api/tests/start/{}", test_id), &token, json!({}))
        .await;

    // Move the start two hours back: far past the 15 minute deadline
    sqlx::query("UPDATE test_attempts SET started_at = ? WHERE test_id = ?")
        .bind(Utc::now() - Duration::hours(2))
        .bind(test_id)
        .execute(&app.pool)
        .await
        .unwrap();

    let timer: Value = app
        .get(&format!("/api/tests/timer/{}", test_id), &token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(timer["expired"], true);
    assert_eq!(timer["remaining_seconds"], 0);

    let result: Value = app
        .post(
            &format!("/api/tests/submit/{}", test_id),
            &token,
            json!({ "answers": {} }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(result["late"], true);
    assert_eq!(result["score"], 0);
}

#[tokio::test]
async fn fullscreen_exits_are_counted() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.user_token().await;
    let test_id = mcq_test(&app, &admin).await;

    let before_start = app
        .post(&format!("/api/tests/violation/{}", test_id), &token, json!({}))
        .await;
    assert_eq!(before_start.status().as_u16(), 404);

    app.post(&format!("/api/tests/start/{}", test_id), &token, json!({}))
        .await;
    for expected in 1..=2 {
        let body: Value = app
            .post(&format!("/api/tests/violation/{}", test_id), &token, json!({}))
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(body["fullscreen_exits"], expected);
    }

    app.post(
        &format!("/api/tests/submit/{}", test_id),
        &token,
        json!({ "answers": {} }),
    )
    .await;

    let admin_view: Vec<Value> = app
        .get(&format!("/api/admin/tests/{}/results", test_id), &admin)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(admin_view[0]["fullscreen_exits"], 2);
}

#[tokio::test]
async fn mcq_without_questions_cannot_start() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.user_token().await;
    let test_id = app
        .create_test(&admin, json!({ "title": "Empty", "kind": "mcq", "duration_minutes": 5 }))
        .await;

    let resp = app
        .post(&format!("/api/tests/start/{}", test_id), &token, json!({}))
        .await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn invalid_answer_key_upload_is_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let test_id = app
        .create_test(&admin, json!({ "title": "Broken", "kind": "mcq", "duration_minutes": 5 }))
        .await;

    let resp = app
        .upload_answer_key(&admin, test_id, b"this is not a workbook".to_vec())
        .await;
    assert_eq!(resp.status().as_u16(), 400);

    let missing = app.upload_answer_key(&admin, 9999, answer_key_workbook(vec![vec!["Q", "a", "a"]])).await;
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn reupload_replaces_answer_key() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let test_id = mcq_test(&app, &admin).await;

    let resp = app
        .upload_answer_key(&admin, test_id, answer_key_workbook(vec![vec!["Only one", "x", "y", "y"]]))
        .await;
    assert_eq!(resp.status().as_u16(), 200);

    let questions: Vec<Value> = app
        .get(&format!("/api/admin/tests/{}/questions", test_id), &admin)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0]["answer"], "y");
    assert_eq!(questions[0]["options"], json!(["x", "y"]));
}

#[tokio::test]
async fn answer_key_is_locked_once_a_test_is_started() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.user_token().await;
    let test_id = mcq_test(&app, &admin).await;

    let started: Value = app
        .post(&format!("/api/tests/start/{}", test_id), &token, json!({}))
        .await
        .json()
        .await
        .unwrap();
    let question_ids: Vec<i64> = started["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["id"].as_i64().unwrap())
        .collect();

    let resp = app
        .upload_answer_key(&admin, test_id, answer_key_workbook(vec![vec!["Only one", "x", "y", "y"]]))
        .await;
    assert_eq!(resp.status().as_u16(), 409);

    // The running attempt still scores against the ids it was given
    let questions: Vec<Value> = app
        .get(&format!("/api/admin/tests/{}/questions", test_id), &admin)
        .await
        .json()
        .await
        .unwrap();
    let stored_ids: Vec<i64> = questions.iter().map(|q| q["id"].as_i64().unwrap()).collect();
    assert_eq!(stored_ids, question_ids);

    let answers: HashMap<i64, String> = questions
        .iter()
        .map(|q| (q["id"].as_i64().unwrap(), q["answer"].as_str().unwrap().to_string()))
        .collect();
    let result: Value = app
        .post(
            &format!("/api/tests/submit/{}", test_id),
            &token,
            json!({ "answers": answers }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(result["score"], 3);
    assert_eq!(result["total"], 3);

    // Still locked after the submission
    let resp = app
        .upload_answer_key(&admin, test_id, answer_key_workbook(vec![vec!["Only one", "x", "y", "y"]]))
        .await;
    assert_eq!(resp.status().as_u16(), 409);
}

/// Registers a user and stores a graded result for it directly.
async fn seed_result(app: &TestApp, test_id: i64, score: i64, submitted_minutes_ago: i64) -> String {
    let username = unique_name("lb");
    let user: Value = app.register(&username, "password123").await.json().await.unwrap();

    sqlx::query(
        r#"
        INSERT INTO user_results (user_id, test_id, score, total, status, late, submitted_at)
        VALUES (?, ?, ?, 20, 'graded', FALSE, ?)
        "#,
    )
    .bind(user["id"].as_i64().unwrap())
    .bind(test_id)
    .bind(score)
    .bind(Utc::now() - Duration::minutes(submitted_minutes_ago))
    .execute(&app.pool)
    .await
    .unwrap();

    username
}

async fn leaderboard(app: &TestApp, test_id: i64) -> Vec<Value> {
    app.client
        .get(app.url(&format!("/api/tests/{}/leaderboard", test_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn leaderboard_orders_by_score_then_earliest_submission() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let test_id = mcq_test(&app, &admin).await;

    // Inserted out of order so row ids do not decide the ties
    let late_top = seed_result(&app, test_id, 15, 5).await;
    let low = seed_result(&app, test_id, 9, 30).await;
    let early_top = seed_result(&app, test_id, 15, 20).await;
    let middle = seed_result(&app, test_id, 12, 1).await;

    let board = leaderboard(&app, test_id).await;
    let names: Vec<&str> = board.iter().map(|e| e["username"].as_str().unwrap()).collect();
    assert_eq!(names, vec![early_top.as_str(), late_top.as_str(), middle.as_str(), low.as_str()]);
    let scores: Vec<i64> = board.iter().map(|e| e["score"].as_i64().unwrap()).collect();
    assert_eq!(scores, vec![15, 15, 12, 9]);
}

#[tokio::test]
async fn leaderboard_is_capped_at_ten_entries() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let test_id = mcq_test(&app, &admin).await;

    for score in 0..12 {
        seed_result(&app, test_id, score, 1).await;
    }

    let board = leaderboard(&app, test_id).await;
    assert_eq!(board.len(), 10);
    assert_eq!(board[0]["score"], 11);
    assert_eq!(board[9]["score"], 2);
}

#[tokio::test]
async fn typing_test_reports_speed_and_accuracy() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.user_token().await;
    let test_id = app
        .create_test(
            &admin,
            json!({
                "title": "Typing sprint",
                "kind": "typing",
                "duration_minutes": 1,
                "passage": "the quick brown fox jumps over the lazy dog"
            }),
        )
        .await;

    let started: Value = app
        .post(&format!("/api/tests/start/{}", test_id), &token, json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(started["passage"], "the quick brown fox jumps over the lazy dog");
    assert!(started.get("questions").is_none());

    let result: Value = app
        .post(
            &format!("/api/tests/submit/{}", test_id),
            &token,
            json!({ "typed_text": "the quick brown fx jumps" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(result["score"], 4);
    assert_eq!(result["total"], 9);
    assert_eq!(result["details"]["typed_words"], 5);
    assert_eq!(result["details"]["accuracy"], 80.0);
    assert!(result["details"]["wpm"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn programming_upload_is_pending_until_graded() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.user_token().await;
    let test_id = app
        .create_test(
            &admin,
            json!({
                "title": "FizzBuzz",
                "kind": "programming",
                "duration_minutes": 30,
                "problem_statement": "Print FizzBuzz up to 100."
            }),
        )
        .await;

    let started: Value = app
        .post(&format!("/api/tests/start/{}", test_id), &token, json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(started["problem_statement"], "Print FizzBuzz up to 100.");

    let result: Value = app
        .post(
            &format!("/api/tests/submit/{}", test_id),
            &token,
            json!({ "source_code": "fn main() {}", "language": "rust" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(result["status"], "pending");
    assert_eq!(result["passed"], false);

    // Pending results stay off the leaderboard
    let board: Vec<Value> = app
        .client
        .get(app.url(&format!("/api/tests/{}/leaderboard", test_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(board.is_empty());

    let uploads: Vec<Value> = app
        .get(&format!("/api/admin/tests/{}/uploads", test_id), &admin)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0]["language"], "rust");
    let upload_id = uploads[0]["id"].as_i64().unwrap();

    let out_of_range = app
        .put(
            &format!("/api/admin/uploads/{}/grade", upload_id),
            &admin,
            json!({ "grade": 150 }),
        )
        .await;
    assert_eq!(out_of_range.status().as_u16(), 400);

    let graded = app
        .put(
            &format!("/api/admin/uploads/{}/grade", upload_id),
            &admin,
            json!({ "grade": 85, "feedback": "Clean solution" }),
        )
        .await;
    assert_eq!(graded.status().as_u16(), 200);

    let mine: Vec<Value> = app.get("/api/users/me/results", &token).await.json().await.unwrap();
    assert_eq!(mine[0]["status"], "graded");
    assert_eq!(mine[0]["score"], 85);
}

#[tokio::test]
async fn unpublished_and_deleted_tests_are_hidden() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let token = app.user_token().await;
    let test_id = mcq_test(&app, &admin).await;

    let resp = app
        .put(
            &format!("/api/admin/tests/{}/publish", test_id),
            &admin,
            json!({ "is_published": false }),
        )
        .await;
    assert_eq!(resp.status().as_u16(), 200);

    let tests: Vec<Value> = app.get("/api/tests/user-tests", &token).await.json().await.unwrap();
    assert!(tests.iter().all(|t| t["id"] != test_id));

    let eligibility = app
        .get(&format!("/api/tests/check-eligibility/{}", test_id), &token)
        .await;
    assert_eq!(eligibility.status().as_u16(), 404);

    let deleted = app
        .client
        .delete(app.url(&format!("/api/admin/tests/{}", test_id)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 204);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE test_id = ?")
        .bind(test_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
