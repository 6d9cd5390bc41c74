// tests/api_tests.rs

use async_trait::async_trait;
use quiz_engine::{
    config::Config,
    error::{AppError, AppResult},
    routes,
    site::{Params, SiteClient},
    state::AppState,
    storage::LocalStore,
    utils::time::now_secs,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

const USER_ID: i64 = 7;
const QUIZ_ID: i64 = 4;
const COURSE_ID: i64 = 2;
const PASSWORD: &str = "secret";

/// Stand-in for the remote site, answering from a fixed quiz setup.
struct FakeSite {
    rules: Vec<&'static str>,
    quiz: Value,
    attempts: Vec<Value>,
    calls: Mutex<Vec<(String, Params)>>,
}

impl FakeSite {
    fn new(rules: &[&'static str], quiz: Value, attempts: Vec<Value>) -> Self {
        Self {
            rules: rules.to_vec(),
            quiz,
            attempts,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls_to(&self, function: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(f, _)| f == function)
            .count()
    }
}

fn param<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

fn preflight_value<'a>(params: &'a Params, field: &str) -> Option<&'a str> {
    (0..)
        .map_while(|i| {
            param(params, &format!("preflightdata[{}][name]", i))
                .map(|name| (name, param(params, &format!("preflightdata[{}][value]", i))))
        })
        .find(|(name, _)| *name == field)
        .and_then(|(_, value)| value)
}

#[async_trait]
impl SiteClient for FakeSite {
    fn user_id(&self) -> i64 {
        USER_ID
    }

    async fn call(&self, function: &str, params: Params) -> AppResult<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((function.to_string(), params.clone()));

        match function {
            "mod_quiz_get_quizzes_by_courses" => Ok(json!({ "quizzes": [self.quiz.clone()] })),
            "mod_quiz_get_quiz_access_information" => Ok(json!({
                "canattempt": true,
                "canreviewmyattempts": true,
                "activerulenames": self.rules,
                "accessrules": [],
                "preventaccessreasons": [],
            })),
            "mod_quiz_get_user_attempts" => Ok(json!({ "attempts": self.attempts })),
            "mod_quiz_start_attempt" => {
                if self.rules.contains(&"quizaccess_password")
                    && preflight_value(&params, "quizpassword") != Some(PASSWORD)
                {
                    return Err(AppError::Validation("The password entered was incorrect".to_string()));
                }
                Ok(json!({
                    "attempt": {
                        "id": 30, "quiz": QUIZ_ID, "userid": USER_ID, "attempt": 1,
                        "state": "inprogress", "timestart": now_secs(), "layout": "1,2,0"
                    },
                    "warnings": []
                }))
            }
            "mod_quiz_process_attempt" => {
                let state = if param(&params, "finishattempt") == Some("1") {
                    "finished"
                } else {
                    "inprogress"
                };
                Ok(json!({ "state": state, "warnings": [] }))
            }
            "core_group_get_activity_groupmode" => Ok(json!({ "groupmode": 0 })),
            _ => Err(AppError::Transport(format!("unexpected call {}", function))),
        }
    }
}

fn quiz_json(review_attempt: i64) -> Value {
    json!({
        "id": QUIZ_ID,
        "course": COURSE_ID,
        "coursemodule": 17,
        "name": "Week 1",
        "grade": 10.0,
        "sumgrades": 5.0,
        "decimalpoints": 2,
        "timeclose": 0,
        "navmethod": "free",
        "allowofflineattempts": 1,
        "reviewattempt": review_attempt,
        "reviewcorrectness": review_attempt,
        "reviewmarks": review_attempt,
        "reviewspecificfeedback": 0,
        "reviewgeneralfeedback": 0,
        "reviewrightanswer": 0,
        "reviewoverallfeedback": 0,
    })
}

fn finished_attempt(timefinish: i64) -> Value {
    json!({
        "id": 29, "quiz": QUIZ_ID, "userid": USER_ID, "attempt": 1,
        "state": "finished", "timestart": timefinish - 600, "timefinish": timefinish,
        "timemodified": timefinish, "layout": "1,0"
    })
}

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345") and the fake site.
async fn spawn_app(site: FakeSite) -> (String, Arc<FakeSite>) {
    // 1. A private in-memory local store, migrated
    let store = LocalStore::in_memory()
        .await
        .expect("Failed to open in-memory store");

    // 2. Create test configuration and state
    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        site_url: "http://site.invalid".to_string(),
        site_token: "test_token".to_string(),
        site_user_id: USER_ID,
        bind_addr: "127.0.0.1:0".to_string(),
        rust_log: "error".to_string(),
        sync_interval: 300,
        offline_disabled: false,
    };

    let site = Arc::new(site);
    let state = AppState::new(config, site.clone(), store);

    // 3. Create the router with the app state
    let app = routes::create_router(state);

    // 4. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 5. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, site)
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let (address, _) = spawn_app(FakeSite::new(&[], quiz_json(0), vec![])).await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn access_reports_password_preflight() {
    let (address, _) = spawn_app(FakeSite::new(
        &["quizaccess_password", "quizaccess_ipaddress"],
        quiz_json(0),
        vec![],
    ))
    .await;
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/api/quizzes/{}/access?course_id={}", address, QUIZ_ID, COURSE_ID))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["unsupported_rules"], json!([]));
    assert_eq!(body["preflight_required"], true);
    assert_eq!(body["offline"], true);
    assert_eq!(body["has_data_to_sync"], false);
}

#[tokio::test]
async fn access_lists_unsupported_rules() {
    let (address, _) = spawn_app(FakeSite::new(
        &["quizaccess_password", "quizaccess_proctoring"],
        quiz_json(0),
        vec![],
    ))
    .await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(&format!("{}/api/quizzes/{}/access?course_id={}", address, QUIZ_ID, COURSE_ID))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();

    assert_eq!(body["unsupported_rules"], json!(["quizaccess_proctoring"]));
    assert_eq!(body["preflight_required"], false);
}

#[tokio::test]
async fn access_rejects_invalid_course() {
    let (address, site) = spawn_app(FakeSite::new(&[], quiz_json(0), vec![])).await;
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/api/quizzes/{}/access?course_id=0", address, QUIZ_ID))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(site.calls_to("mod_quiz_get_quizzes_by_courses"), 0);
}

#[tokio::test]
async fn start_attempt_without_password_is_cancelled() {
    let (address, site) = spawn_app(FakeSite::new(&["quizaccess_password"], quiz_json(0), vec![])).await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/api/quizzes/{}/attempts", address, QUIZ_ID))
        .json(&json!({ "course_id": COURSE_ID }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 409);
    assert_eq!(site.calls_to("mod_quiz_start_attempt"), 0);
}

#[tokio::test]
async fn start_attempt_with_wrong_password_returns_rejection() {
    let (address, site) = spawn_app(FakeSite::new(&["quizaccess_password"], quiz_json(0), vec![])).await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/api/quizzes/{}/attempts", address, QUIZ_ID))
        .json(&json!({
            "course_id": COURSE_ID,
            "preflight_data": { "quizpassword": "wrong" }
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "The password entered was incorrect");
    assert_eq!(site.calls_to("mod_quiz_start_attempt"), 1);
}

#[tokio::test]
async fn start_attempt_with_password_remembers_it() {
    let (address, _) = spawn_app(FakeSite::new(&["quizaccess_password"], quiz_json(0), vec![])).await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/api/quizzes/{}/attempts", address, QUIZ_ID))
        .json(&json!({
            "course_id": COURSE_ID,
            "preflight_data": { "quizpassword": PASSWORD }
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let attempt: Value = response.json().await.unwrap();
    assert_eq!(attempt["id"], 30);
    assert_eq!(attempt["state"], "inprogress");

    // The accepted password is kept, so no form is needed next time.
    let access: Value = client
        .get(&format!("{}/api/quizzes/{}/access?course_id={}", address, QUIZ_ID, COURSE_ID))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(access["preflight_required"], false);
}

#[tokio::test]
async fn review_allowed_right_after_finishing() {
    let (address, _) = spawn_app(FakeSite::new(
        &[],
        quiz_json(0x11110),
        vec![finished_attempt(now_secs() - 10)],
    ))
    .await;
    let client = reqwest::Client::new();

    let response = client
        .get(&format!(
            "{}/api/quizzes/{}/attempts/29/review?course_id={}",
            address, QUIZ_ID, COURSE_ID
        ))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["can_review"], true);
    assert_eq!(body["state"], "Finished");
    assert_eq!(body["message"], "");
    assert_eq!(body["options"]["attempt"], true);
    assert_eq!(body["options"]["marks"], "mark_and_max");
}

#[tokio::test]
async fn review_denied_after_the_review_window() {
    let (address, _) = spawn_app(FakeSite::new(
        &[],
        quiz_json(0x10000),
        vec![finished_attempt(now_secs() - 10_000)],
    ))
    .await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(&format!(
            "{}/api/quizzes/{}/attempts/29/review?course_id={}",
            address, QUIZ_ID, COURSE_ID
        ))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();

    assert_eq!(body["can_review"], false);
    assert_eq!(body["message"], "You are not able to review this quiz attempt.");
    assert_eq!(body["options"]["attempt"], false);
}

#[tokio::test]
async fn review_of_unknown_attempt_is_404() {
    let (address, _) = spawn_app(FakeSite::new(&[], quiz_json(0x11110), vec![])).await;
    let client = reqwest::Client::new();

    let response = client
        .get(&format!(
            "{}/api/quizzes/{}/attempts/99/review?course_id={}",
            address, QUIZ_ID, COURSE_ID
        ))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn sync_without_offline_data() {
    let (address, site) = spawn_app(FakeSite::new(&[], quiz_json(0), vec![])).await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/api/quizzes/{}/sync?course_id={}", address, QUIZ_ID, COURSE_ID))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["attempt_finished"], false);
    assert_eq!(body["warnings"], json!([]));
    assert_eq!(site.calls_to("mod_quiz_get_user_attempts"), 0);
}

#[tokio::test]
async fn offline_answers_are_synced() {
    let in_progress = json!({
        "id": 30, "quiz": QUIZ_ID, "userid": USER_ID, "attempt": 1,
        "state": "inprogress", "timestart": now_secs() - 600,
        "timemodified": now_secs() - 300, "layout": "1,0,2,0"
    });
    let (address, site) = spawn_app(FakeSite::new(&[], quiz_json(0), vec![in_progress])).await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/api/quizzes/{}/attempts/30/offline", address, QUIZ_ID))
        .json(&json!({
            "course_id": COURSE_ID,
            "answers": { "q30:2_answer": "1" },
            "page": 1,
            "finish": true
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);
    let stored: Value = response.json().await.unwrap();
    assert_eq!(stored["currentpage"], 1);
    assert_eq!(stored["finishedoffline"], true);

    let access: Value = client
        .get(&format!("{}/api/quizzes/{}/access?course_id={}", address, QUIZ_ID, COURSE_ID))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(access["has_data_to_sync"], true);

    let result: Value = client
        .post(&format!("{}/api/quizzes/{}/sync?course_id={}", address, QUIZ_ID, COURSE_ID))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(result["attempt_finished"], true);
    assert_eq!(result["warnings"], json!([]));
    assert_eq!(site.calls_to("mod_quiz_process_attempt"), 1);
}

#[tokio::test]
async fn offline_answers_reject_unknown_page() {
    let in_progress = json!({
        "id": 30, "quiz": QUIZ_ID, "userid": USER_ID, "attempt": 1,
        "state": "inprogress", "layout": "1,0"
    });
    let (address, _) = spawn_app(FakeSite::new(&[], quiz_json(0), vec![in_progress])).await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/api/quizzes/{}/attempts/30/offline", address, QUIZ_ID))
        .json(&json!({ "course_id": COURSE_ID, "page": 3 }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}
