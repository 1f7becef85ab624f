use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use move_dispatch::api::rest::router;
use move_dispatch::state::{AppState, EngineSettings};
use serde_json::{json, Value};
use tower::ServiceExt;

const ACTOR_ID: &str = "6f1f4c1e-3b57-4a0e-9a43-0c3f4d1c2b10";

fn setup() -> axum::Router {
    let state = AppState::new(1024, EngineSettings::default());
    router(Arc::new(state))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-actor-id", ACTOR_ID)
        .header("x-actor-name", "Dispatch Desk")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn patch_request(uri: &str, body: Value) -> Request<Body> {
    json_request("PATCH", uri, body)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn post_ok(app: &axum::Router, uri: &str, body: Value) -> Value {
    let res = app
        .clone()
        .oneshot(json_request("POST", uri, body))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK, "POST {uri}");
    body_json(res).await
}

async fn create_bin(app: &axum::Router, number: &str, lat: f64, lng: f64) -> String {
    let bin = post_ok(
        app,
        "/bins",
        json!({
            "bin_number": number,
            "location": { "lat": lat, "lng": lng },
            "address": { "street": format!("{number} Shore"), "city": "Leith", "postal_code": "EH6" },
            "fill_percentage": 35
        }),
    )
    .await;
    bin["id"].as_str().unwrap().to_string()
}

/// Driver with a shift holding two uncompleted stops at 10 and 20.
async fn seed_route(app: &axum::Router) -> (String, String) {
    let driver = post_ok(
        app,
        "/users",
        json!({ "name": "Morag", "role": "driver", "device_token": "tok-1" }),
    )
    .await;
    let driver_id = driver["id"].as_str().unwrap().to_string();

    let shift = post_ok(app, "/shifts", json!({ "driver_id": driver_id })).await;
    let shift_id = shift["id"].as_str().unwrap().to_string();

    for (number, sequence) in [("B1", 10), ("B2", 20)] {
        let bin_id = create_bin(app, number, 55.97, -3.17).await;
        post_ok(
            app,
            &format!("/shifts/{shift_id}/stops"),
            json!({ "bin_id": bin_id, "sequence_order": sequence }),
        )
        .await;
    }

    (driver_id, shift_id)
}

async fn create_move(app: &axum::Router, body: Value) -> Value {
    post_ok(app, "/move-requests", body).await
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["bins"], 0);
    assert_eq!(body["shifts"], 0);
    assert_eq!(body["move_requests"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("realtime_subscribers"));
}

#[tokio::test]
async fn mutations_without_actor_are_unauthorized() {
    let app = setup();
    let request = Request::builder()
        .method("POST")
        .uri("/move-requests")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn get_nonexistent_move_request_returns_404() {
    let app = setup();
    let response = app
        .oneshot(get_request(
            "/move-requests/00000000-0000-0000-0000-000000000000",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn create_move_request_returns_pending_view() {
    let app = setup();
    let bin_id = create_bin(&app, "B7", 55.95, -3.19).await;

    let body = create_move(
        &app,
        json!({
            "bin_id": bin_id,
            "scheduled_date": "2030-01-01T09:00:00Z",
            "move_type": "store"
        }),
    )
    .await;

    assert_eq!(body["status"], "pending");
    assert_eq!(body["urgency"], "scheduled");
    assert_eq!(body["display_urgency"], "scheduled");
    assert_eq!(body["bin_number"], "B7");
    assert_eq!(body["assignment"]["kind"], "none");
    assert_eq!(body["original_address"]["street"], "B7 Shore");

    let bin = app
        .oneshot(get_request(&format!("/bins/{bin_id}")))
        .await
        .unwrap();
    assert_eq!(body_json(bin).await["status"], "pending_move");
}

#[tokio::test]
async fn relocation_without_destination_returns_400() {
    let app = setup();
    let bin_id = create_bin(&app, "B8", 55.95, -3.19).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/move-requests",
            json!({
                "bin_id": bin_id,
                "scheduled_date": "2030-01-01T09:00:00Z",
                "move_type": "relocation"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "validation_error");
}

#[tokio::test]
async fn assign_to_active_shift_flow() {
    let app = setup();
    let (_driver_id, shift_id) = seed_route(&app).await;

    let res = app
        .clone()
        .oneshot(patch_request(
            &format!("/shifts/{shift_id}/status"),
            json!({ "status": "active" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let bin_id = create_bin(&app, "M1", 55.975, -3.165).await;
    let created = create_move(
        &app,
        json!({
            "bin_id": bin_id,
            "scheduled_date": "2030-01-01T09:00:00Z",
            "move_type": "pickup_only",
            "disposal_action": "retire"
        }),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/move-requests/{id}/assign-shift"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let assigned = body_json(res).await;
    assert_eq!(assigned["status"], "in_progress");
    assert_eq!(assigned["assigned_shift_id"], shift_id);
    assert_eq!(assigned["assigned_driver_name"], "Morag");

    let shift = app
        .clone()
        .oneshot(get_request(&format!("/shifts/{shift_id}")))
        .await
        .unwrap();
    let shift = body_json(shift).await;
    assert_eq!(shift["total_bins"], 3);
    let stops = shift["stops"].as_array().unwrap();
    assert_eq!(stops.len(), 3);
    assert_eq!(stops[1]["sequence_order"], 11);
    assert_eq!(stops[1]["move_request_id"], id);

    // Unassigning work the driver is already on is blocked.
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/move-requests/{id}/unassign"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["code"], "guardrail");

    let history = app
        .oneshot(get_request(&format!("/move-requests/{id}/history")))
        .await
        .unwrap();
    let history = body_json(history).await;
    let kinds: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["created", "assigned"]);
}

#[tokio::test]
async fn malformed_assign_body_is_rejected_before_touching_routes() {
    let app = setup();
    let (_driver_id, shift_id) = seed_route(&app).await;
    let res = app
        .clone()
        .oneshot(patch_request(
            &format!("/shifts/{shift_id}/status"),
            json!({ "status": "active" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let bin_id = create_bin(&app, "M2", 55.975, -3.165).await;
    let created = create_move(
        &app,
        json!({ "bin_id": bin_id, "scheduled_date": "2030-01-01T09:00:00Z", "move_type": "store" }),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/move-requests/{id}/assign-shift"),
            json!({
                "shift_id": "not-a-uuid",
                "insertion_hint": { "mode": "after_bin", "bin_id": "zzz" }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["code"], "validation_error");

    let shift = app
        .clone()
        .oneshot(get_request(&format!("/shifts/{shift_id}")))
        .await
        .unwrap();
    let shift = body_json(shift).await;
    assert_eq!(shift["stops"].as_array().unwrap().len(), 2);
    assert_eq!(shift["total_bins"], 2);

    // No body at all still means automatic selection.
    let empty = Request::builder()
        .method("POST")
        .uri(format!("/move-requests/{id}/assign-shift"))
        .header("x-actor-id", ACTOR_ID)
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(empty).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let assigned = body_json(res).await;
    assert_eq!(assigned["assigned_shift_id"], shift_id);
}

#[tokio::test]
async fn assign_past_the_last_sequence_is_rejected() {
    let app = setup();
    let driver = post_ok(&app, "/users", json!({ "name": "Morag", "role": "driver" })).await;
    let shift = post_ok(&app, "/shifts", json!({ "driver_id": driver["id"] })).await;
    let shift_id = shift["id"].as_str().unwrap();

    let edge = create_bin(&app, "E1", 55.97, -3.17).await;
    post_ok(
        &app,
        &format!("/shifts/{shift_id}/stops"),
        json!({ "bin_id": edge, "sequence_order": i32::MAX }),
    )
    .await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/shifts/{shift_id}/stops"),
            json!({ "bin_id": edge }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let bin_id = create_bin(&app, "M3", 55.975, -3.165).await;
    let created = create_move(
        &app,
        json!({ "bin_id": bin_id, "scheduled_date": "2030-01-01T09:00:00Z", "move_type": "store" }),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/move-requests/{id}/assign-shift"),
            json!({ "shift_id": shift_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["code"], "validation_error");

    let res = app
        .oneshot(get_request(&format!("/move-requests/{id}")))
        .await
        .unwrap();
    let request = body_json(res).await;
    assert_eq!(request["status"], "pending");
    assert_eq!(request["assignment"]["kind"], "none");
}

#[tokio::test]
async fn stale_edit_returns_409() {
    let app = setup();
    let bin_id = create_bin(&app, "B9", 55.95, -3.19).await;
    let created = create_move(
        &app,
        json!({
            "bin_id": bin_id,
            "scheduled_date": "2030-01-01T09:00:00Z",
            "move_type": "store"
        }),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let res = app
        .clone()
        .oneshot(patch_request(
            &format!("/move-requests/{id}"),
            json!({
                "notes": "gate code 4411",
                "client_updated_at": "2001-01-01T00:00:00Z"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body = body_json(res).await;
    assert_eq!(body["code"], "conflict");
    assert!(body["error"].as_str().unwrap().contains("refetch"));

    let res = app
        .oneshot(patch_request(
            &format!("/move-requests/{id}"),
            json!({
                "notes": "gate code 4411",
                "client_updated_at": created["updated_at"]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["notes"], "gate code 4411");
}

#[tokio::test]
async fn manual_relocation_completes_and_moves_bin() {
    let app = setup();
    let crew = post_ok(
        &app,
        "/users",
        json!({ "name": "Ewan", "role": "operator" }),
    )
    .await;
    let bin_id = create_bin(&app, "B3", 55.95, -3.19).await;

    let created = create_move(
        &app,
        json!({
            "bin_id": bin_id,
            "scheduled_date": "2030-01-01T09:00:00Z",
            "move_type": "relocation",
            "new_location": { "lat": 55.99, "lng": -3.15 },
            "new_address": { "street": "9 New Quay", "city": "Leith", "postal_code": "EH6" }
        }),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let assigned = post_ok(
        &app,
        &format!("/move-requests/{id}/assign-user"),
        json!({ "user_id": crew["id"] }),
    )
    .await;
    assert_eq!(assigned["status"], "assigned");
    assert_eq!(assigned["assigned_user_id"], crew["id"]);

    let done = post_ok(&app, &format!("/move-requests/{id}/complete"), json!({})).await;
    assert_eq!(done["status"], "completed");
    assert_eq!(done["display_urgency"], "resolved");

    let history = app
        .oneshot(get_request(&format!("/bins/{bin_id}/history")))
        .await
        .unwrap();
    let history = body_json(history).await;
    let moves = history["moves"].as_array().unwrap();
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0]["from_address"]["street"], "B3 Shore");
    assert_eq!(moves[0]["to_address"]["street"], "9 New Quay");
    assert_eq!(history["entries"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn cancel_then_list_filters_by_status() {
    let app = setup();
    let first = create_bin(&app, "C1", 55.95, -3.19).await;
    let second = create_bin(&app, "C2", 55.96, -3.18).await;

    let keep = create_move(
        &app,
        json!({ "bin_id": first, "scheduled_date": "2030-01-01T09:00:00Z", "move_type": "store" }),
    )
    .await;
    let dropped = create_move(
        &app,
        json!({ "bin_id": second, "scheduled_date": "2030-01-02T09:00:00Z", "move_type": "store" }),
    )
    .await;
    let drop_id = dropped["id"].as_str().unwrap();

    let cancelled = post_ok(&app, &format!("/move-requests/{drop_id}/cancel"), json!({})).await;
    assert_eq!(cancelled["status"], "cancelled");

    let res = app
        .clone()
        .oneshot(get_request("/move-requests?status=pending"))
        .await
        .unwrap();
    let pending = body_json(res).await;
    let pending = pending.as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["id"], keep["id"]);

    let res = app
        .clone()
        .oneshot(get_request("/move-requests"))
        .await
        .unwrap();
    let all = body_json(res).await;
    let scheduled: Vec<&str> = all
        .as_array()
        .unwrap()
        .iter()
        .map(|view| view["scheduled_date"].as_str().unwrap())
        .collect();
    assert_eq!(
        scheduled,
        vec!["2030-01-02T09:00:00Z", "2030-01-01T09:00:00Z"]
    );

    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/move-requests/{drop_id}/cancel"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}
