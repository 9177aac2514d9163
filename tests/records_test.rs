use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::*;

#[tokio::test]
async fn test_owner_create_then_get_round_trip() {
    let app = spawn_app().await;
    let login = app.login_as("anna", "therapist").await;

    let (status, body) = app
        .post(
            "/api/owners",
            &login,
            json!({
                "action": "create",
                "first_name": "  Maria ",
                "last_name": "Becker",
                "email": "maria@example.de",
                "city": "Kiel",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    assert!(body["message"].is_string());
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app.get(&format!("/api/owners?action=get&id={}", id), Some(&login)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["first_name"], "Maria");
    assert_eq!(body["data"]["city"], "Kiel");
    assert_eq!(body["data"]["patients"], json!([]));

    let (status, body) = app.get("/api/owners?q=Beck", Some(&login)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_required_field_is_rejected() {
    let app = spawn_app().await;
    let login = app.login_as("anna", "therapist").await;

    let (status, body) = app
        .post("/api/owners", &login, json!({"action": "create", "first_name": "Maria"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body);
    assert!(body["message"].as_str().unwrap().starts_with("Ungültige Eingabe"), "{}", body);

    let (status, body) = app
        .post(
            "/api/owners",
            &login,
            json!({"action": "create", "first_name": "Maria", "last_name": "   "}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body);

    let (status, body) = app.post("/api/owners", &login, json!({"first_name": "Maria"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body);
}

#[tokio::test]
async fn test_unknown_action_and_missing_record() {
    let app = spawn_app().await;
    let login = app.login_as("anna", "therapist").await;

    let (status, body) = app.get("/api/owners?action=export", Some(&login)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body);

    let (status, body) = app.get("/api/patients?action=get&id=999", Some(&login)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error_envelope(&body);

    let (status, _) = app
        .post("/api/patients", &login, json!({"action": "delete", "id": 999}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_patient_with_unknown_owner() {
    let app = spawn_app().await;
    let login = app.login_as("anna", "therapist").await;

    let (status, body) = app
        .post(
            "/api/patients",
            &login,
            json!({"action": "create", "owner_id": 4711, "name": "Bello", "species": "Hund"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body);
}

#[tokio::test]
async fn test_patient_delete_blocked_by_appointments() {
    let app = spawn_app().await;
    let login = app.login_as("anna", "therapist").await;
    let owner_id = app.create_owner(&login, "Hansen").await;
    let patient_id = app.create_patient(&login, owner_id, "Bello").await;

    let (status, body) = app
        .post(
            "/api/appointments",
            &login,
            json!({
                "action": "create",
                "patient_id": patient_id,
                "title": "Erstbefund",
                "starts_at": "2026-03-02T09:00:00",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["ends_at"], "2026-03-02T10:00:00");

    let (status, body) = app
        .post("/api/patients", &login, json!({"action": "delete", "id": patient_id}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_error_envelope(&body);
}

#[tokio::test]
async fn test_owner_delete_cascades_to_patients() {
    let app = spawn_app().await;
    let login = app.login_as("chef", "admin").await;
    let owner_id = app.create_owner(&login, "Hansen").await;
    let patient_id = app.create_patient(&login, owner_id, "Bello").await;

    let (status, _) = app
        .post(
            "/api/treatments",
            &login,
            json!({
                "action": "create",
                "patient_id": patient_id,
                "treatment_date": "2026-03-02",
                "therapy_type": "Unterwasserlaufband",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .post("/api/owners", &login, json!({"action": "delete", "id": owner_id}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .get(&format!("/api/patients?action=get&id={}", patient_id), Some(&login))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app
        .get(&format!("/api/treatments?patient_id={}", patient_id), Some(&login))
        .await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_permissions_follow_role() {
    let app = spawn_app().await;
    let reception = app.login_as("empfang", "reception").await;
    let owner_id = app.create_owner(&reception, "Vogel").await;

    let (status, body) = app
        .post("/api/owners", &reception, json!({"action": "delete", "id": owner_id}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error_envelope(&body);

    let (status, _) = app.get("/api/treatments", Some(&reception)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/dashboard", Some(&reception)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_invoice_totals_and_status() {
    let app = spawn_app().await;
    let login = app.login_as("anna", "therapist").await;
    let owner_id = app.create_owner(&login, "Hansen").await;

    let (status, body) = app
        .post(
            "/api/invoices",
            &login,
            json!({
                "action": "create",
                "owner_id": owner_id,
                "issue_date": "2026-03-02",
                "items": [
                    {"description": "Befundaufnahme", "quantity": 1, "unit_price_cents": 6000},
                    {"description": "Lasertherapie", "quantity": 2, "unit_price_cents": 2500, "tax_rate": 7},
                ],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let invoice = &body["data"];
    assert_eq!(invoice["net_cents"], 11000);
    assert_eq!(invoice["tax_cents"], 1140 + 350);
    assert_eq!(invoice["gross_cents"], 11000 + 1490);
    assert_eq!(invoice["items"].as_array().unwrap().len(), 2);
    assert!(invoice["invoice_number"].as_str().unwrap().starts_with("RE-2026-"));
    let id = invoice["id"].as_i64().unwrap();

    let (status, body) = app
        .post("/api/invoices", &login, json!({"action": "set_status", "id": id, "status": "paid"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "paid");
    assert!(body["data"]["paid_at"].is_string());

    let (status, body) = app
        .post("/api/invoices", &login, json!({"action": "set_status", "id": id, "status": "lost"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body);

    let (_, body) = app.get("/api/dashboard", Some(&login)).await;
    assert_eq!(body["data"]["owners"], 1);
}

#[tokio::test]
async fn test_notes_record_author() {
    let app = spawn_app().await;
    let login = app.login_as("anna", "therapist").await;
    let owner_id = app.create_owner(&login, "Hansen").await;

    let (status, body) = app
        .post(
            "/api/notes",
            &login,
            json!({"action": "create", "owner_id": owner_id, "title": "Rückruf", "content": "Bitte zurückrufen"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["data"]["created_by"].is_i64());

    let (_, body) = app
        .get(&format!("/api/notes?owner_id={}", owner_id), Some(&login))
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_documents_require_patient_filter() {
    let app = spawn_app().await;
    let login = app.login_as("anna", "therapist").await;
    let owner_id = app.create_owner(&login, "Hansen").await;
    let patient_id = app.create_patient(&login, owner_id, "Bello").await;

    let (status, _) = app.get("/api/documents", Some(&login)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/api/documents",
            &login,
            json!({"action": "create", "patient_id": patient_id, "title": "Röntgen", "file_path": "../etc/passwd"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body);

    let (status, _) = app
        .post(
            "/api/documents",
            &login,
            json!({"action": "create", "patient_id": patient_id, "title": "Röntgen", "file_path": "bello/roentgen.pdf"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app
        .get(&format!("/api/documents?patient_id={}", patient_id), Some(&login))
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_settings_bulk_update() {
    let app = spawn_app().await;
    let admin = app.login_as("chef", "admin").await;

    let (status, body) = app
        .post(
            "/api/settings",
            &admin,
            json!({"action": "update", "values": {"practice_name": "Praxis Pfote", "default_tax_rate": 7}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, body) = app.get("/api/settings", Some(&admin)).await;
    assert_eq!(body["data"]["practice_name"], "Praxis Pfote");
    assert_eq!(body["data"]["default_tax_rate"], "7");

    let (status, _) = app
        .post("/api/settings", &admin, json!({"action": "update", "values": {"smtp": "{}"}}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/settings",
            &admin,
            json!({"action": "save_invoice_design", "design": {"primary_color": "grün"}}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let therapist = app.login_as("anna", "therapist").await;
    let (status, _) = app
        .post(
            "/api/settings",
            &therapist,
            json!({"action": "update", "values": {"practice_name": "X"}}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/api/settings?action=invoice_design", Some(&therapist)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["primary_color"], "#2f6f4f");
}

#[tokio::test]
async fn test_paid_invoice_cannot_be_reopened() {
    let app = spawn_app().await;
    let reception = app.login_as("paula", "reception").await;
    let owner_id = app.create_owner(&reception, "Hansen").await;
    let items = json!([{"description": "Kontrolle", "quantity": 1, "unit_price_cents": 3000}]);

    let (status, body) = app
        .post(
            "/api/invoices",
            &reception,
            json!({"action": "create", "owner_id": owner_id, "items": items}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .post("/api/invoices", &reception, json!({"action": "set_status", "id": id, "status": "paid"}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post("/api/invoices", &reception, json!({"action": "set_status", "id": id, "status": "draft"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_error_envelope(&body);

    let (status, _) = app
        .post(
            "/api/invoices",
            &reception,
            json!({
                "action": "update",
                "id": id,
                "owner_id": owner_id,
                "items": [{"description": "Kontrolle", "quantity": 1, "unit_price_cents": 1}],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post("/api/invoices", &reception, json!({"action": "set_status", "id": id, "status": "cancelled"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = app.get(&format!("/api/invoices?action=get&id={}", id), Some(&reception)).await;
    assert_eq!(body["data"]["status"], "paid");
    assert_eq!(body["data"]["gross_cents"], 3570);
    assert!(body["data"]["paid_at"].is_string());

    let admin = app.login_as("chef", "admin").await;
    let (status, body) = app
        .post("/api/invoices", &admin, json!({"action": "set_status", "id": id, "status": "cancelled"}))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "cancelled");
}

#[tokio::test]
async fn test_invoice_amounts_are_bounded() {
    let app = spawn_app().await;
    let login = app.login_as("anna", "therapist").await;
    let owner_id = app.create_owner(&login, "Hansen").await;

    let (status, body) = app
        .post(
            "/api/invoices",
            &login,
            json!({
                "action": "create",
                "owner_id": owner_id,
                "items": [
                    {"description": "A", "quantity": 1, "unit_price_cents": i64::MAX},
                    {"description": "B", "quantity": 1, "unit_price_cents": i64::MAX},
                ],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body);
}

#[tokio::test]
async fn test_numeric_settings_are_range_checked() {
    let app = spawn_app().await;
    let admin = app.login_as("chef", "admin").await;

    for values in [
        json!({"invoice_due_days": "1000000000"}),
        json!({"invoice_due_days": -3}),
        json!({"default_tax_rate": "500"}),
    ] {
        let (status, body) = app
            .post("/api/settings", &admin, json!({"action": "update", "values": values}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_error_envelope(&body);
    }

    let (status, _) = app
        .post("/api/settings", &admin, json!({"action": "update", "values": {"invoice_due_days": 30}}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let owner_id = app.create_owner(&admin, "Hansen").await;
    let (status, body) = app
        .post(
            "/api/invoices",
            &admin,
            json!({
                "action": "create",
                "owner_id": owner_id,
                "issue_date": "2026-03-02",
                "items": [{"description": "Kontrolle", "quantity": 1, "unit_price_cents": 3000}],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["due_date"], "2026-04-01");
}

#[tokio::test]
async fn test_malformed_invoice_design_reports_design_field() {
    let app = spawn_app().await;
    let admin = app.login_as("chef", "admin").await;

    let (status, body) = app
        .post(
            "/api/settings",
            &admin,
            json!({"action": "save_invoice_design", "design": {"primary_color": 5}}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("design"), "{}", body);

    let (status, body) = app
        .post(
            "/api/settings",
            &admin,
            json!({"action": "save_invoice_design", "primary_color": "#112233"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["primary_color"], "#112233");
}
