mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{acquire_db_lock, body_to_json, body_to_vec, MultipartBody, TestApp};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
struct ApplicationInfo {
    id: Uuid,
    status: String,
    current_owner: Option<Uuid>,
    applied_at: String,
}

async fn seed_user_and_admin(app: &TestApp) -> Result<(String, String)> {
    app.insert_user("user@example.com", "s3cret-s3cret", "User", "user")
        .await?;
    app.insert_user("admin@example.com", "s3cret-s3cret", "Admin", "admin")
        .await?;
    let user_token = app.login_token("user@example.com", "s3cret-s3cret").await?;
    let admin_token = app
        .login_token("admin@example.com", "s3cret-s3cret")
        .await?;
    Ok((user_token, admin_token))
}

async fn submit_ok(app: &TestApp, token: &str) -> Result<ApplicationInfo> {
    let response = app
        .submit_application(token, "intern", "I am interested", 0)
        .await?;
    anyhow::ensure!(
        response.status() == StatusCode::CREATED,
        "submit failed with {}",
        response.status()
    );
    Ok(serde_json::from_slice(
        &body_to_vec(response.into_body()).await?,
    )?)
}

#[tokio::test]
async fn submit_and_get_roundtrip() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (user_token, _) = seed_user_and_admin(&app).await?;

    let before = Utc::now();
    let response = app
        .submit_application(&user_token, "intern", "I am interested", 2)
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let submitted: ApplicationInfo =
        serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;

    assert_eq!(submitted.status, "submitted");
    assert_eq!(submitted.current_owner, None);
    let applied_at: DateTime<Utc> = submitted.applied_at.parse()?;
    assert!(applied_at >= before - chrono::Duration::seconds(5));
    assert!(applied_at <= Utc::now() + chrono::Duration::seconds(5));

    // resume + two certificates in the object store
    assert_eq!(app.storage().object_count().await, 3);

    let response = app
        .get(&format!("/api/applications/{}", submitted.id), Some(&user_token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let detail = body_to_json(response.into_body()).await?;
    assert_eq!(detail["status"], "submitted");
    assert_eq!(detail["cover_letter"], "I am interested");
    assert_eq!(detail["applicant"]["email"], "user@example.com");
    assert_eq!(detail["documents"].as_array().map(|docs| docs.len()), Some(2));
    assert!(detail["documents"]
        .as_array()
        .unwrap()
        .iter()
        .all(|doc| doc["doc_type"] == "certificate"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn submit_validation_failures() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (user_token, _) = seed_user_and_admin(&app).await?;

    // unsupported kind
    let multipart = MultipartBody::new()
        .text("type", "contractor")
        .text("cover_letter", "hello")
        .file("resume", "resume.pdf", "application/pdf", b"%PDF");
    let response = app
        .post_multipart("/api/applications", multipart, Some(&user_token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["kind"], "validation");

    // missing resume
    let multipart = MultipartBody::new()
        .text("type", "intern")
        .text("cover_letter", "hello");
    let response = app
        .post_multipart("/api/applications", multipart, Some(&user_token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // blank cover letter
    let multipart = MultipartBody::new()
        .text("type", "intern")
        .text("cover_letter", "   ")
        .file("resume", "resume.pdf", "application/pdf", b"%PDF");
    let response = app
        .post_multipart("/api/applications", multipart, Some(&user_token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn listings_are_scoped_and_ordered() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (user_token, admin_token) = seed_user_and_admin(&app).await?;
    app.insert_user("other@example.com", "s3cret-s3cret", "Other", "user")
        .await?;
    let other_token = app
        .login_token("other@example.com", "s3cret-s3cret")
        .await?;

    let first = submit_ok(&app, &user_token).await?;
    let second = submit_ok(&app, &user_token).await?;
    submit_ok(&app, &other_token).await?;

    let response = app.get("/api/applications", Some(&user_token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let mine = body_to_json(response.into_body()).await?;
    let mine = mine.as_array().unwrap();
    assert_eq!(mine.len(), 2);
    // applied_at descending: the newest submission first
    assert_eq!(mine[0]["id"], json!(second.id));
    assert_eq!(mine[1]["id"], json!(first.id));

    let response = app.get("/api/applications/admin", Some(&admin_token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let all = body_to_json(response.into_body()).await?;
    assert_eq!(all.as_array().unwrap().len(), 3);
    assert!(all.as_array().unwrap()[0]["applicant"]["email"].is_string());

    let response = app
        .get(
            "/api/applications/admin?status=submitted",
            Some(&admin_token),
        )
        .await?;
    let filtered = body_to_json(response.into_body()).await?;
    assert_eq!(filtered.as_array().unwrap().len(), 3);

    let response = app
        .get("/api/applications/admin?status=offered", Some(&admin_token))
        .await?;
    let filtered = body_to_json(response.into_body()).await?;
    assert_eq!(filtered.as_array().unwrap().len(), 0);

    let response = app
        .get("/api/applications/admin?status=bogus", Some(&admin_token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn admin_operations_are_forbidden_for_users() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (user_token, _) = seed_user_and_admin(&app).await?;
    let application = submit_ok(&app, &user_token).await?;

    let response = app.get("/api/applications/admin", Some(&user_token)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post_json(
            &format!("/api/applications/{}/transition", application.id),
            &json!({ "status": "under_review" }),
            Some(&user_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["kind"], "forbidden");
    assert_eq!(body["error"], "permission denied");

    let response = app
        .post_json(
            "/api/interviews",
            &json!({
                "application_id": application.id,
                "meet_link": "https://meet.example/x",
                "scheduled_for": (Utc::now() + chrono::Duration::days(1)).to_rfc3339(),
                "duration_minutes": 30,
            }),
            Some(&user_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.get("/api/admin/actions", Some(&user_token)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn transition_walks_the_graph_and_rejects_skips() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (user_token, admin_token) = seed_user_and_admin(&app).await?;
    let application = submit_ok(&app, &user_token).await?;

    let response = app
        .post_json(
            &format!("/api/applications/{}/transition", application.id),
            &json!({ "status": "under_review" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["status"], "under_review");
    assert!(body["current_owner"].is_string());

    // skipping interview_scheduled and offered is rejected
    let response = app
        .post_json(
            &format!("/api/applications/{}/transition", application.id),
            &json!({ "status": "accepted" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["kind"], "illegal_transition");
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("under_review"));
    assert!(message.contains("accepted"));

    // repeating the same transition is a self-loop and fails
    let response = app
        .post_json(
            &format!("/api/applications/{}/transition", application.id),
            &json!({ "status": "under_review" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // unknown status string is a validation error, not a transition error
    let response = app
        .post_json(
            &format!("/api/applications/{}/transition", application.id),
            &json!({ "status": "in_review" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // missing application
    let response = app
        .post_json(
            &format!("/api/applications/{}/transition", Uuid::new_v4()),
            &json!({ "status": "under_review" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // every admin transition leaves an audit row
    let response = app
        .get(
            &format!("/api/admin/actions?application_id={}", application.id),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let actions = body_to_json(response.into_body()).await?;
    let actions = actions.as_array().unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0]["action_type"], "status-change");
    assert_eq!(actions[0]["payload"]["status"], "under_review");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn rejection_clears_owner_and_is_absorbing() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (user_token, admin_token) = seed_user_and_admin(&app).await?;
    let application = submit_ok(&app, &user_token).await?;

    let response = app
        .post_json(
            &format!("/api/applications/{}/transition", application.id),
            &json!({ "status": "under_review" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post_json(
            &format!("/api/applications/{}/transition", application.id),
            &json!({ "status": "rejected" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["status"], "rejected");
    assert!(body["current_owner"].is_null());

    // nothing leaves rejected
    let response = app
        .post_json(
            &format!("/api/applications/{}/transition", application.id),
            &json!({ "status": "under_review" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn withdraw_is_owner_only_and_terminal() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (user_token, _) = seed_user_and_admin(&app).await?;
    app.insert_user("other@example.com", "s3cret-s3cret", "Other", "user")
        .await?;
    let other_token = app
        .login_token("other@example.com", "s3cret-s3cret")
        .await?;

    let application = submit_ok(&app, &user_token).await?;

    let response = app
        .post_json(
            &format!("/api/applications/{}/withdraw", application.id),
            &json!({}),
            Some(&other_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post_json(
            &format!("/api/applications/{}/withdraw", application.id),
            &json!({}),
            Some(&user_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["status"], "withdrawn");

    let response = app
        .post_json(
            &format!("/api/applications/{}/withdraw", application.id),
            &json!({}),
            Some(&user_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn applications_are_invisible_to_strangers() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (user_token, admin_token) = seed_user_and_admin(&app).await?;
    app.insert_user("other@example.com", "s3cret-s3cret", "Other", "user")
        .await?;
    let other_token = app
        .login_token("other@example.com", "s3cret-s3cret")
        .await?;

    let application = submit_ok(&app, &user_token).await?;

    let response = app
        .get(&format!("/api/applications/{}", application.id), Some(&other_token))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .get(&format!("/api/applications/{}", application.id), Some(&admin_token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .get(&format!("/api/applications/{}", application.id), None)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await?;
    Ok(())
}
