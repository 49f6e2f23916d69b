// tests/api_tests.rs

use aula_backend::{
    config::Config, exam::machine::AttemptRegistry, live::hub::LiveHub, routes, state::AppState,
};
use sqlx::postgres::PgPoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    // Note: For Postgres, you must have a running database.
    // We'll read from DATABASE_URL environment variable.
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState {
        pool,
        config,
        hub: LiveHub::new(),
        attempts: AttemptRegistry::new(),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// Registers a fresh presenter and returns (username, bearer token).
async fn register_and_login(address: &str, client: &reqwest::Client) -> (String, String) {
    let username = format!("prof_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";

    let response = client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({"username": username, "password": password}))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(response.status().as_u16(), 201);

    let login = client
        .post(&format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": username, "password": password}))
        .send()
        .await
        .expect("Failed to login")
        .json::<serde_json::Value>()
        .await
        .unwrap();

    let token = login["token"].as_str().unwrap().to_string();
    (username, token)
}

#[tokio::test]
async fn health_check_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn session_lifecycle() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = register_and_login(&address, &client).await;

    // Create
    let created = client
        .post(&format!("{}/api/sessions/", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);
    let created = created.json::<serde_json::Value>().await.unwrap();
    let code = created["session_code"].as_str().unwrap().to_string();
    assert!(code.starts_with("AULAPUDU-"));
    assert_eq!(code.len(), "AULAPUDU-".len() + 5);
    assert_eq!(created["topic"], format!("realtime:{}", code));

    // A spectator can join by code, no account needed.
    let joined = client
        .post(&format!("{}/api/sessions/join", address))
        .json(&serde_json::json!({"session_code": code, "spectator_name": "Ana"}))
        .send()
        .await
        .unwrap();
    assert_eq!(joined.status().as_u16(), 200);

    // Malformed codes are rejected before any lookup.
    let bad = client
        .post(&format!("{}/api/sessions/join", address))
        .json(&serde_json::json!({"session_code": "AULAPUDU-12", "spectator_name": "Ana"}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status().as_u16(), 400);

    // Delete, then joining is a 404.
    let deleted = client
        .delete(&format!("{}/api/sessions/{}", address, code))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 204);

    let gone = client
        .post(&format!("{}/api/sessions/join", address))
        .json(&serde_json::json!({"session_code": code, "spectator_name": "Ana"}))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status().as_u16(), 404);
}

#[tokio::test]
async fn exam_flow_from_creation_to_grading() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = register_and_login(&address, &client).await;

    // Create an exam: one multiple-choice, one true/false.
    let exam = client
        .post(&format!("{}/api/exams/", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Prueba de Historia",
            "time_limit_minutes": 30,
            "questions": [
                {
                    "text": "Capital de Chile?",
                    "question_type": "multiple-choice",
                    "choices": ["Santiago", "Lima", "Quito"],
                    "correct_answer": "Santiago"
                },
                {
                    "text": "El agua hierve a 100C al nivel del mar.",
                    "question_type": "true-false",
                    "correct_answer": "true"
                }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(exam.status().as_u16(), 201);
    let exam = exam.json::<serde_json::Value>().await.unwrap();
    let exam_id = exam["id"].as_i64().unwrap();
    assert_eq!(exam["is_active"], false);

    // Students cannot join until activation.
    let activated = client
        .post(&format!("{}/api/exams/{}/activate", address, exam_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    let join_code = activated["join_code"].as_str().unwrap().to_string();
    assert!(activated["is_active"].as_bool().unwrap());

    // Student joins anonymously; the questions must not leak answers.
    let joined = client
        .post(&format!("{}/api/exams/join", address))
        .json(&serde_json::json!({"join_code": join_code, "student_name": "Benja"}))
        .send()
        .await
        .unwrap();
    assert_eq!(joined.status().as_u16(), 201);
    let joined = joined.json::<serde_json::Value>().await.unwrap();
    let attempt_id = joined["attempt_id"].as_i64().unwrap();
    let questions = joined["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    for q in questions {
        assert!(q.get("correct_answer").is_none());
    }
    // True/false questions surface the fixed choice pair.
    assert_eq!(
        questions[1]["choices"],
        serde_json::json!(["true", "false"])
    );

    // Answer both: first correctly, second incorrectly after an overwrite.
    let q1 = questions[0]["id"].as_i64().unwrap();
    let q2 = questions[1]["id"].as_i64().unwrap();
    for (question_id, value) in [(q1, "Santiago"), (q2, "true"), (q2, "false")] {
        let saved = client
            .put(&format!("{}/api/attempts/{}/answers", address, attempt_id))
            .json(&serde_json::json!({"question_id": question_id, "value": value}))
            .send()
            .await
            .unwrap();
        assert_eq!(saved.status().as_u16(), 204);
    }

    // Answers are only accepted for this exam's questions.
    let stray = client
        .put(&format!("{}/api/attempts/{}/answers", address, attempt_id))
        .json(&serde_json::json!({"question_id": 999_999, "value": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(stray.status().as_u16(), 400);

    // Results stay sealed while the attempt is in progress, so the
    // correct answers cannot be read mid-exam.
    let early = client
        .get(&format!("{}/api/attempts/{}/results", address, attempt_id))
        .send()
        .await
        .unwrap();
    assert_eq!(early.status().as_u16(), 409);

    // Submission requires explicit confirmation.
    let unconfirmed = client
        .post(&format!("{}/api/attempts/{}/submit", address, attempt_id))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(unconfirmed.status().as_u16(), 400);

    let submitted = client
        .post(&format!("{}/api/attempts/{}/submit", address, attempt_id))
        .json(&serde_json::json!({"confirmed": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(submitted.status().as_u16(), 200);
    let submitted = submitted.json::<serde_json::Value>().await.unwrap();
    // 1 of 2 correct: the overwrite made the second answer wrong.
    assert_eq!(submitted["score"].as_f64().unwrap(), 50.0);

    // Finalized means finalized: no re-grade, no more answers.
    let again = client
        .post(&format!("{}/api/attempts/{}/submit", address, attempt_id))
        .json(&serde_json::json!({"confirmed": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status().as_u16(), 409);

    let late_answer = client
        .put(&format!("{}/api/attempts/{}/answers", address, attempt_id))
        .json(&serde_json::json!({"question_id": q1, "value": "Lima"}))
        .send()
        .await
        .unwrap();
    assert_eq!(late_answer.status().as_u16(), 409);

    // The student can read back the finalized result, with a breakdown
    // showing each question, what they answered and what was expected.
    let result = client
        .get(&format!("{}/api/attempts/{}/results", address, attempt_id))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(result["score"].as_f64().unwrap(), 50.0);
    assert!(result["end_time"].is_string());

    let breakdown = result["questions"].as_array().unwrap();
    assert_eq!(breakdown.len(), 2);
    assert_eq!(breakdown[0]["question_text"], "Capital de Chile?");
    assert_eq!(breakdown[0]["student_answer"], "Santiago");
    assert_eq!(breakdown[0]["correct_answer"], "Santiago");
    assert_eq!(breakdown[0]["is_correct"], true);
    assert_eq!(breakdown[1]["student_answer"], "false");
    assert_eq!(breakdown[1]["correct_answer"], "true");
    assert_eq!(breakdown[1]["is_correct"], false);

    // The presenter sees the finalized attempt.
    let attempts = client
        .get(&format!("{}/api/exams/{}/attempts", address, exam_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    let attempts = attempts.as_array().unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0]["student_name"], "Benja");
    assert_eq!(attempts[0]["score"].as_f64().unwrap(), 50.0);
}

#[tokio::test]
async fn exam_validation_rejects_bad_shapes() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = register_and_login(&address, &client).await;

    // Multiple-choice with a correct answer outside the options.
    let response = client
        .post(&format!("{}/api/exams/", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Inconsistente",
            "time_limit_minutes": 10,
            "questions": [{
                "text": "2 + 2?",
                "question_type": "multiple-choice",
                "choices": ["3", "5"],
                "correct_answer": "4"
            }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // No questions at all.
    let response = client
        .post(&format!("{}/api/exams/", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Vacia",
            "time_limit_minutes": 10,
            "questions": []
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn ownership_is_enforced_across_presenters() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token_a) = register_and_login(&address, &client).await;
    let (_, token_b) = register_and_login(&address, &client).await;

    let exam = client
        .post(&format!("{}/api/exams/", address))
        .bearer_auth(&token_a)
        .json(&serde_json::json!({
            "title": "De A",
            "time_limit_minutes": 10,
            "questions": [{
                "text": "Pregunta?",
                "question_type": "open-ended"
            }]
        }))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    let exam_id = exam["id"].as_i64().unwrap();

    let forbidden = client
        .delete(&format!("{}/api/exams/{}", address, exam_id))
        .bearer_auth(&token_b)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);

    let no_token = client
        .get(&format!("{}/api/exams/", address))
        .send()
        .await
        .unwrap();
    assert_eq!(no_token.status().as_u16(), 401);
}

#[tokio::test]
async fn question_bank_round_trip() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = register_and_login(&address, &client).await;

    // A multiple-choice bank question needs at least two options.
    let invalid = client
        .post(&format!("{}/api/questions/", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Incompleta",
            "question_type": "multiple-choice",
            "choices": ["solo una"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status().as_u16(), 400);

    let created = client
        .post(&format!("{}/api/questions/", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Que les parecio la clase?",
            "question_type": "multiple-choice",
            "choices": ["Buena", "Regular", "Mala"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);
    let created = created.json::<serde_json::Value>().await.unwrap();
    let question_id = created["id"].as_i64().unwrap();

    let listed = client
        .get(&format!("{}/api/questions/", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert!(
        listed
            .as_array()
            .unwrap()
            .iter()
            .any(|q| q["id"].as_i64() == Some(question_id))
    );

    let deleted = client
        .delete(&format!("{}/api/questions/{}", address, question_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 204);
}

#[tokio::test]
async fn file_registration_validates_type() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (_, token) = register_and_login(&address, &client).await;

    let rejected = client
        .post(&format!("{}/api/files/", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "name": "virus.exe",
            "file_type": "exe",
            "file_url": "https://files.example/virus.exe"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status().as_u16(), 400);

    let accepted = client
        .post(&format!("{}/api/files/", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "name": "clase1.pdf",
            "file_type": "PDF",
            "file_url": "https://files.example/clase1.pdf"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status().as_u16(), 201);
    let accepted = accepted.json::<serde_json::Value>().await.unwrap();
    // Stored lowercase regardless of how it was sent.
    assert_eq!(accepted["file_type"], "pdf");
}
