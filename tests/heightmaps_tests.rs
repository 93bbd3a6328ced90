//! Integration tests for auth and heightmap endpoints

mod common;

use common::{bodies_for, jpegs, make_token, seed_tokens, test_client};
use dev2gis_client::types::{JobStatus, Page};
use dev2gis_client::{
    BatchOptions, ClientError, CredentialStore, MergeMethod, PollOptions, UploadFile,
    UploadOutcome, ValidationError,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn heightmap(id: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "user_id": "u1",
        "image_url": "http://storage/raw/1.jpg",
        "status": status,
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z",
    })
}

#[tokio::test]
async fn test_login_persists_session() {
    let server = MockServer::start().await;
    let t = test_client(&server);
    let access = make_token("u1", 900);

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "pilot@example.com", "password": "hunter2hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"id": "u1", "email": "pilot@example.com", "name": "Pilot"},
            "tokens": {"access_token": access, "refresh_token": "r1", "expires_at": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = t
        .client
        .login("pilot@example.com", "hunter2hunter2")
        .await
        .unwrap();
    assert_eq!(response.user.unwrap().name, "Pilot");

    assert_eq!(t.store.access_token().unwrap(), access);
    assert_eq!(t.store.refresh_token().unwrap(), "r1");
    assert_eq!(t.store.cached_user().unwrap().id, "u1");
    assert!(t.client.is_authenticated());
    assert_eq!(t.client.current_user().unwrap().email, "u1@example.com");
}

#[tokio::test]
async fn test_register_without_token_is_malformed() {
    let server = MockServer::start().await;
    let t = test_client(&server);

    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"user": null})))
        .mount(&server)
        .await;

    let err = t
        .client
        .register("Pilot", "pilot@example.com", "longpassword")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::MalformedResponse { .. }));
    assert!(t.store.is_empty());
}

#[tokio::test]
async fn test_login_validation_happens_before_network() {
    let server = MockServer::start().await;
    let t = test_client(&server);

    let err = t.client.login("not-an-email", "longpassword").await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(ValidationError::InvalidEmail)));

    let err = t.client.register("P", "p@example.com", "longpassword").await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(ValidationError::NameTooShort { .. })));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_logout_clears_everything() {
    let server = MockServer::start().await;
    let t = test_client(&server);
    seed_tokens(&t.store, "a", "r");

    t.client.logout().unwrap();
    assert!(t.store.is_empty());
    assert_eq!(t.navigator.count(), 1);
}

#[tokio::test]
async fn test_single_png_uses_file_field() {
    let server = MockServer::start().await;
    let t = test_client(&server);
    seed_tokens(&t.store, "access", "refresh");

    Mock::given(method("POST"))
        .and(path("/heightmaps/upload"))
        .and(header("authorization", "Bearer access"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"id": "job-1", "status": "pending"})))
        .expect(1)
        .mount(&server)
        .await;

    let png = UploadFile::new("site.png", vec![0x89, b'P', b'N', b'G']);
    let outcome = t
        .client
        .submit_upload(vec![png], BatchOptions::default())
        .await
        .unwrap();
    assert!(matches!(outcome, UploadOutcome::Single(_)));
    assert_eq!(outcome.job_id(), "job-1");

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));

    let body = &bodies_for(&server, "/heightmaps/upload").await[0];
    assert!(body.contains("name=\"file\"; filename=\"site.png\""));
    assert!(body.contains("image/png"));
    assert!(!body.contains("name=\"files\""));
}

#[tokio::test]
async fn test_six_jpegs_with_orthophoto_go_to_batch() {
    let server = MockServer::start().await;
    let t = test_client(&server);
    seed_tokens(&t.store, "access", "refresh");

    Mock::given(method("POST"))
        .and(path("/heightmaps/batch/upload"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "id": "batch-1", "status": "pending", "image_count": 6, "merge_method": "max"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let options = BatchOptions {
        merge_method: MergeMethod::Max,
        fast_mode: true,
        generate_orthophoto: true,
        ..Default::default()
    };
    let outcome = t.client.submit_upload(jpegs(6), options).await.unwrap();
    let UploadOutcome::Batch(batch) = outcome else {
        panic!("expected a batch upload");
    };
    assert_eq!(batch.image_count, 6);

    let body = &bodies_for(&server, "/heightmaps/batch/upload").await[0];
    assert_eq!(body.matches("name=\"files\"").count(), 6);
    assert!(body.contains("name=\"generation_mode\"\r\n\r\nboth"));
    assert!(body.contains("name=\"merge_method\"\r\n\r\nmax"));
    assert!(body.contains("name=\"fast_mode\"\r\n\r\ntrue"));
}

#[tokio::test]
async fn test_upload_rejections_never_hit_network() {
    let server = MockServer::start().await;
    let t = test_client(&server);

    let err = t
        .client
        .submit_upload(jpegs(4), BatchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Validation(ValidationError::InsufficientFiles { count: 4, min: 5 })
    ));

    let err = t
        .client
        .upload_batch(jpegs(4), BatchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(ValidationError::BatchTooSmall { min: 5 })));

    let options = BatchOptions {
        generate_heightmap: false,
        generate_orthophoto: false,
        ..Default::default()
    };
    let err = t.client.upload_batch(jpegs(5), options).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(ValidationError::NoGenerationMode)));

    let err = t
        .client
        .upload_single(UploadFile::new("notes.txt", b"hello".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Validation(ValidationError::UnsupportedFileType { .. })
    ));

    let err = t.client.submit_upload(Vec::new(), BatchOptions::default()).await.unwrap_err();
    assert_eq!(err.status(), 0);

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_heightmaps_with_paging() {
    let server = MockServer::start().await;
    let t = test_client(&server);

    Mock::given(method("GET"))
        .and(path("/heightmaps"))
        .and(query_param("limit", "100"))
        .and(query_param("offset", "40"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "heightmaps": [heightmap("h1", "completed")],
            "limit": 100,
            "offset": 40
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/heightmaps/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "batch_heightmaps": [], "limit": 20, "offset": 0
        })))
        .mount(&server)
        .await;

    let list = t.client.list_heightmaps(Page::new(500, 40)).await.unwrap();
    assert_eq!(list.heightmaps.len(), 1);
    assert_eq!(list.heightmaps[0].status, JobStatus::Completed);

    let batches = t.client.list_batch_heightmaps(Page::default()).await.unwrap();
    assert!(batches.batch_heightmaps.is_empty());
}

#[tokio::test]
async fn test_wait_for_heightmap_polls_until_terminal() {
    let server = MockServer::start().await;
    let t = test_client(&server);

    Mock::given(method("GET"))
        .and(path("/heightmaps/h1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(heightmap("h1", "processing")))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/heightmaps/h1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(heightmap("h1", "completed")))
        .mount(&server)
        .await;

    let poll = PollOptions {
        interval: Duration::from_millis(10),
        max_attempts: 10,
    };
    let job = t.client.wait_for_heightmap("h1", poll).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(bodies_for(&server, "/heightmaps/h1").await.len(), 3);
}

#[tokio::test]
async fn test_wait_for_batch_times_out() {
    let server = MockServer::start().await;
    let t = test_client(&server);

    Mock::given(method("GET"))
        .and(path("/heightmaps/batch/b1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "b1", "user_id": "u1", "status": "processing", "image_count": 6,
            "processed_count": 2, "merge_method": "medium",
            "created_at": "2026-01-01T00:00:00Z", "updated_at": "2026-01-01T00:00:00Z"
        })))
        .mount(&server)
        .await;

    let poll = PollOptions {
        interval: Duration::from_millis(5),
        max_attempts: 3,
    };
    let err = t.client.wait_for_batch_heightmap("b1", poll).await.unwrap_err();
    assert!(matches!(err, ClientError::PollTimeout { attempts: 3, .. }));
}
