use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::*;

#[tokio::test]
async fn test_admin_routes_reject_other_roles() {
    let app = spawn_app().await;
    let therapist = app.login_as("anna", "therapist").await;

    for path in [
        "/api/admin/users",
        "/api/admin/roles",
        "/api/admin/backups",
        "/api/admin/cron",
        "/api/admin/email-templates",
        "/api/admin/modules",
        "/api/admin/activity",
    ] {
        let (status, body) = app.get(path, Some(&therapist)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", path);
        assert_error_envelope(&body);
    }

    let (status, _) = app.get("/api/admin/users", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_management() {
    let app = spawn_app().await;
    let admin = app.login_as("chef", "admin").await;
    let admin_id = app
        .state
        .database
        .find_user_by_identifier("chef")
        .await
        .unwrap()
        .unwrap()
        .id;

    let (status, body) = app
        .post(
            "/api/admin/users",
            &admin,
            json!({"action": "create", "username": "lena", "email": "lena@praxis.example", "role": "reception", "password": "kurz"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body);

    let (status, body) = app
        .post(
            "/api/admin/users",
            &admin,
            json!({"action": "create", "username": "lena", "email": "lena@praxis.example", "role": "reception", "password": "sicheres-passwort"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert!(body["data"].get("password_hash").is_none());
    let lena = body["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .post(
            "/api/admin/users",
            &admin,
            json!({"action": "create", "username": "lena", "email": "other@praxis.example", "role": "reception", "password": "sicheres-passwort"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .post("/api/admin/users", &admin, json!({"action": "toggle_active", "id": lena}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], false);

    let (status, _) = app
        .post("/api/admin/users", &admin, json!({"action": "toggle_active", "id": admin_id}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post("/api/admin/users", &admin, json!({"action": "delete", "id": admin_id}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post("/api/admin/users", &admin, json!({"action": "delete", "id": lena}))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_role_permissions_update() {
    let app = spawn_app().await;
    let admin = app.login_as("chef", "admin").await;

    let (_, body) = app.get("/api/admin/roles", Some(&admin)).await;
    let reception = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "reception")
        .unwrap()["id"]
        .as_i64()
        .unwrap();

    let (status, body) = app
        .post(
            "/api/admin/roles",
            &admin,
            json!({"action": "set_permissions", "id": reception, "permissions": ["owners.view", "treatments.view"]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let desk = app.login_as("empfang", "reception").await;
    let (status, _) = app.get("/api/treatments", Some(&desk)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/patients", Some(&desk)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            "/api/admin/roles",
            &admin,
            json!({"action": "set_permissions", "id": reception, "permissions": ["owners.fly"]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_backup_and_restore() {
    let app = spawn_app().await;
    let admin = app.login_as("chef", "admin").await;
    let owner_id = app.create_owner(&admin, "Jansen").await;

    let (status, body) = app.post("/api/admin/backups", &admin, json!({"action": "create"})).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let backup_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["checksum"].as_str().unwrap().len(), 64);

    let (status, _) = app
        .post("/api/owners", &admin, json!({"action": "delete", "id": owner_id}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post("/api/admin/backups", &admin, json!({"action": "restore", "id": backup_id}))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let owner = app.state.database.get_owner(owner_id).await.unwrap();
    assert_eq!(owner.unwrap().last_name, "Jansen");

    let (_, body) = app.get("/api/admin/backups", Some(&admin)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cron_job_runs_on_demand() {
    let app = spawn_app().await;
    let admin = app.login_as("chef", "admin").await;

    let (status, body) = app
        .post(
            "/api/admin/cron",
            &admin,
            json!({"action": "create", "name": "Overdue", "job_type": "mark_overdue_invoices", "interval_minutes": 15}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let job_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .post("/api/admin/cron", &admin, json!({"action": "run", "id": job_id}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "success");

    let (_, body) = app
        .get(&format!("/api/admin/cron?action=logs&job_id={}", job_id), Some(&admin))
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .post(
            "/api/admin/cron",
            &admin,
            json!({"action": "create", "name": "Bad", "job_type": "rm_rf", "interval_minutes": 15}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/api/admin/cron",
            &admin,
            json!({"action": "create", "name": "Huge", "job_type": "backup", "interval_minutes": 1_000_000_000_000i64}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body);

    let (status, body) = app
        .post("/api/admin/cron", &admin, json!({"action": "run", "id": job_id}))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
async fn test_email_template_preview_and_smtp_masking() {
    let app = spawn_app().await;
    let admin = app.login_as("chef", "admin").await;

    let (_, body) = app.get("/api/admin/email-templates", Some(&admin)).await;
    let reminder = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["template_key"] == "appointment_reminder")
        .unwrap()["id"]
        .as_i64()
        .unwrap();

    let (status, body) = app
        .post(
            "/api/admin/email-templates",
            &admin,
            json!({"action": "preview", "id": reminder, "variables": {"patient_name": "Bello"}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let subject = body["data"]["subject"].as_str().unwrap();
    assert!(subject.contains("Bello"));
    assert!(subject.contains("{{ appointment_date }}"));

    let (status, body) = app
        .post(
            "/api/admin/email-templates",
            &admin,
            json!({"action": "save_smtp", "smtp": {
                "host": "smtp.praxis.example",
                "port": 587,
                "username": "praxis",
                "password": "streng-geheim",
                "from_address": "info@praxis.example",
            }}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_ne!(body["data"]["password"], "streng-geheim");

    let (_, body) = app.get("/api/admin/email-templates?action=smtp", Some(&admin)).await;
    assert_eq!(body["data"]["host"], "smtp.praxis.example");
    assert_ne!(body["data"]["password"], "streng-geheim");

    let (_, body) = app.get("/api/settings", Some(&admin)).await;
    assert!(body["data"].get("smtp").is_none());
}

#[tokio::test]
async fn test_module_toggle() {
    let app = spawn_app().await;
    let admin = app.login_as("chef", "admin").await;

    let (_, body) = app.get("/api/admin/modules", Some(&admin)).await;
    let module = body["data"].as_array().unwrap()[0].clone();
    let key = module["module_key"].as_str().unwrap();
    let enabled = module["is_enabled"].as_bool().unwrap();

    let (status, body) = app
        .post("/api/admin/modules", &admin, json!({"action": "toggle", "module_key": key}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_enabled"], !enabled);

    let (status, _) = app
        .post(
            "/api/admin/modules",
            &admin,
            json!({"action": "update_config", "module_key": key, "config": [1, 2]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
