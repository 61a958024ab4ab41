use std::{path::Path, sync::Arc, time::Duration};

use actix_web::{http::StatusCode, test, web, App};
use serde_json::Value;
use serptitle::{
    configuration::{AnalysisSettings, InstructionSettings},
    domain::{Provider, SearchTitle},
    routes::{analyze_route, challenge_route, default_route, instructions_route},
    services::{
        testing::{MockAcquirer, MockTitleGenerator},
        FrequencyAnalyzer, InstructionStore, OperatorSignal, Pipeline, ResolutionSignal,
    },
};

fn instruction_store(dir: &Path) -> InstructionStore {
    InstructionStore::new(&InstructionSettings {
        current_path: dir.join("current_instructions.txt").to_string_lossy().into_owned(),
        default_path: dir.join("default_instructions.txt").to_string_lossy().into_owned(),
    })
}

fn pipeline(titles: Vec<SearchTitle>, generator: Arc<MockTitleGenerator>) -> Pipeline {
    Pipeline::new(
        Arc::new(MockAcquirer::new(titles)),
        FrequencyAnalyzer::with_reference_year(&AnalysisSettings::default(), 2025),
        100,
    )
    .with_generator(generator)
}

#[actix_web::test]
async fn analyze_returns_results_and_saves_edited_instructions() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("default_instructions.txt"), "Shipped default").unwrap();
    let generator = Arc::new(MockTitleGenerator::replying(
        Provider::Anthropic,
        "Marathon Training Plans That Work",
    ));
    let titles = vec![
        SearchTitle::new("Marathon Training Plan for Beginners", Some("runnersworld.com".to_string())),
        SearchTitle::new("Free Marathon Training Plans", Some("halhigdon.com".to_string())),
    ];
    let app = test::init_service(
        App::new()
            .service(analyze_route::analyze)
            .app_data(web::Data::new(pipeline(titles, generator.clone())))
            .app_data(web::Data::new(instruction_store(dir.path()))),
    )
    .await;

    let request = test::TestRequest::post()
        .uri("/analyze")
        .set_form([
            ("keyword", "marathon training"),
            ("temperature", "0.7"),
            ("instructions", "Mention beginners"),
        ])
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, request).await;

    assert_eq!(body["keyword"], "marathon training");
    assert_eq!(body["num_titles_analyzed"], 2);
    assert_eq!(body["top_terms"][0], "marathon");
    assert_eq!(body["term_frequency"]["training"], 2);
    assert_eq!(body["claude_title"], "Marathon Training Plans That Work");
    assert!(body.get("gpt4_title").is_none());
    assert_eq!(generator.calls()[0].temperature, 0.7);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("current_instructions.txt")).unwrap(),
        "Mention beginners"
    );
}

#[actix_web::test]
async fn reset_instructions_reports_missing_default() {
    let dir = tempfile::tempdir().unwrap();
    let app = test::init_service(
        App::new()
            .service(instructions_route::reset_instructions)
            .app_data(web::Data::new(instruction_store(dir.path()))),
    )
    .await;

    let missing = test::call_service(
        &app,
        test::TestRequest::post().uri("/reset-instructions").to_request(),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(missing).await;
    assert_eq!(body["error"], "Default instructions file not found");

    std::fs::write(dir.path().join("default_instructions.txt"), "Shipped default").unwrap();
    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post().uri("/reset-instructions").to_request(),
    )
    .await;
    assert_eq!(body["instructions"], "Shipped default");
}

#[actix_web::test]
async fn index_renders_current_instructions() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("current_instructions.txt"), "Use <em> sparingly").unwrap();
    let app = test::init_service(
        App::new()
            .service(default_route::index)
            .app_data(web::Data::new(instruction_store(dir.path()))),
    )
    .await;

    let body = test::call_and_read_body(&app, test::TestRequest::get().uri("/").to_request()).await;
    let html = String::from_utf8(body.to_vec()).unwrap();

    assert!(html.contains("Use &lt;em&gt; sparingly"));
}

#[actix_web::test]
async fn resolve_route_rejects_when_nothing_waits() {
    let signal = Arc::new(OperatorSignal::new());
    let app = test::init_service(
        App::new()
            .service(challenge_route::resolve_challenge)
            .app_data(web::Data::from(signal.clone())),
    )
    .await;

    let response = test::call_service(
        &app,
        test::TestRequest::post().uri("/challenge/resolve").to_request(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["error"], "No challenge is waiting for resolution");

    let waited = tokio::time::timeout(Duration::from_millis(200), signal.wait_for_resolution()).await;
    assert!(waited.is_err());
}

#[actix_web::test]
async fn resolve_route_releases_a_waiting_run() {
    let signal = Arc::new(OperatorSignal::new());
    let app = test::init_service(
        App::new()
            .service(challenge_route::resolve_challenge)
            .app_data(web::Data::from(signal.clone())),
    )
    .await;

    let operator = async {
        while !signal.is_waiting() {
            tokio::task::yield_now().await;
        }
        test::call_service(
            &app,
            test::TestRequest::post().uri("/challenge/resolve").to_request(),
        )
        .await
    };
    let (waited, response) = tokio::time::timeout(Duration::from_secs(2), async {
        tokio::join!(signal.wait_for_resolution(), operator)
    })
    .await
    .unwrap();

    waited.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!signal.is_waiting());
}
