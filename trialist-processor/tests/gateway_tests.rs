//! Analysis gateway tests against a local HTTP server

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use trialist_processor::lookup::RegimenArm;
use trialist_processor::models::{DataPoint, NormalizedDocument, TrialMetadata};
use trialist_processor::{AnalysisGateway, GatewayError, HttpAnalysisGateway};

fn document() -> NormalizedDocument {
    NormalizedDocument {
        metadata: TrialMetadata {
            regimen_a: vec!["Classical".to_string()],
            regimen_b: vec!["Rock".to_string()],
            trial_start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            trial_end_date: NaiveDate::from_ymd_opt(2020, 2, 11).unwrap(),
            regimen_duration: 7,
            number_of_cycles: 3,
            cycle_ab_pairs: "AB,BA,AB".to_string(),
            cognitive_function_prompt_key: None,
        },
        data: vec![DataPoint {
            cycle: 1,
            timestamp: "2020-01-01T04:00:00.000-08:00".to_string(),
            regimen: Some(RegimenArm::A),
            values: BTreeMap::from([("painAvg".to_string(), 5)]),
        }],
    }
}

/// Serve `app` on an ephemeral port and return the analysis URL
async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/ocpu/wrap/json", addr)
}

fn gateway(url: String) -> HttpAnalysisGateway {
    HttpAnalysisGateway::new(url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_submit_returns_json_object() {
    let app = Router::new().route(
        "/ocpu/wrap/json",
        post(|Json(body): Json<Value>| async move {
            Json(json!({
                "successful": true,
                "regimen_a": body["metadata"]["regimen_a"].clone(),
                "points": body["data"].as_array().map(|d| d.len()).unwrap_or(0),
                "first_regimen": body["data"][0]["regimen"].clone(),
            }))
        }),
    );
    let url = spawn(app).await;

    let result = gateway(url).submit(&document()).await.unwrap();

    assert_eq!(result["successful"], json!(true));
    assert_eq!(result["regimen_a"], json!(["Classical"]));
    assert_eq!(result["points"], json!(1));
    assert_eq!(result["first_regimen"], json!("A"));
}

#[tokio::test]
async fn test_server_error_is_status_error() {
    let app = Router::new().route(
        "/ocpu/wrap/json",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "R error: object not found") }),
    );
    let url = spawn(app).await;

    match gateway(url).submit(&document()).await {
        Err(GatewayError::Status(code, body)) => {
            assert_eq!(code, 500);
            assert!(body.contains("object not found"));
        }
        other => panic!("Expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_only_200_counts_as_success() {
    let app = Router::new().route(
        "/ocpu/wrap/json",
        post(|| async { (StatusCode::CREATED, Json(json!({"successful": true}))) }),
    );
    let url = spawn(app).await;

    assert!(matches!(
        gateway(url).submit(&document()).await,
        Err(GatewayError::Status(201, _))
    ));
}

#[tokio::test]
async fn test_non_object_body_is_parse_error() {
    let app = Router::new()
        .route("/ocpu/wrap/json", post(|| async { Json(json!([1, 2, 3])) }))
        .route("/ocpu/text", post(|| async { "not json" }));
    let url = spawn(app).await;

    assert!(matches!(
        gateway(url.clone()).submit(&document()).await,
        Err(GatewayError::Parse(_))
    ));

    let text_url = url.replace("/ocpu/wrap/json", "/ocpu/text");
    assert!(matches!(
        gateway(text_url).submit(&document()).await,
        Err(GatewayError::Parse(_))
    ));
}

#[tokio::test]
async fn test_unreachable_service_is_network_error() {
    // Reserve a port, then close it
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = gateway(format!("http://{}/ocpu", addr)).submit(&document()).await;
    assert!(matches!(result, Err(GatewayError::Network(_))));
}

#[tokio::test]
async fn test_boxed_gateway_submits_from_spawned_task() {
    let app = Router::new().route(
        "/ocpu/wrap/json",
        post(|| async { Json(json!({"successful": true})) }),
    );
    let url = spawn(app).await;

    let boxed: Box<dyn AnalysisGateway> = Box::new(gateway(url));
    let result = tokio::spawn(async move { boxed.submit(&document()).await })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result["successful"], json!(true));
}
