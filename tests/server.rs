mod common;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::SnapshotBuilder;
use timetable_solver::data::{ComponentType, RoomType};
use timetable_solver::server::router;

async fn post(body: Value) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/timetable/solve")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn solve_returns_a_report() {
    let snapshot = SnapshotBuilder::new()
        .slots(2)
        .room(1, RoomType::Hall, 100)
        .room(2, RoomType::Classroom, 35)
        .professor(1)
        .assistant(2)
        .course(1, &[ComponentType::Lecture, ComponentType::Tutorial], 60, &[1, 2])
        .build();

    let (status, body) = post(json!({ "snapshot": snapshot })).await;
    assert_eq!(status, StatusCode::OK);
    let report: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(report["entries"].as_array().unwrap().len(), 3);
    assert!(report["score"]["total"].is_i64());
    assert_eq!(report["statistics"]["variablesCount"], 3);
    assert_eq!(report["entries"][0]["componentType"], "Lecture");
}

#[tokio::test]
async fn config_overrides_are_applied() {
    let snapshot = SnapshotBuilder::new()
        .slots(1)
        .room(1, RoomType::Hall, 100)
        .professor(1)
        .course(1, &[ComponentType::Lecture], 90, &[1])
        .course(2, &[ComponentType::Lecture], 90, &[1])
        .build();

    let (status, body) = post(json!({
        "snapshot": snapshot,
        "config": { "solver": { "ac3MinVariables": 0 } }
    }))
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(String::from_utf8_lossy(&body).contains("ArcConsistency"));
}

#[tokio::test]
async fn invalid_input_is_a_bad_request() {
    let snapshot = SnapshotBuilder::new()
        .room(1, RoomType::Hall, 100)
        .professor(1)
        .course(1, &[ComponentType::Lecture], 90, &[1])
        .build();

    let (status, body) = post(json!({ "snapshot": snapshot })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8_lossy(&body).contains("invalid input"));
}
