//! Engine client tests against a mock HTTP server

use std::collections::BTreeMap;

use bytes::Bytes;
use futures::StreamExt;
use harbormaster::docker::client::{DockerClient, Options};
use harbormaster::docker::{ControlPlane, EventFilter, TaskFilter};
use harbormaster::errors::ControlPlaneError;
use serde_json::json;
use swarm_api::{SecretSpec, ServiceSpec, UpdateState};
use wiremock::matchers::{body_bytes, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> DockerClient {
    DockerClient::new(&Options {
        host: server.uri(),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_list_services_filters_by_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.43/services"))
        .and(query_param("filters", r#"{"name":["web"]}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "ID": "svc1",
                "Version": {"Index": 12},
                "Spec": {"Name": "web", "TaskTemplate": {}},
                "UpdateStatus": {"State": "rollback_started", "Message": "update paused due to failure"}
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let services = client_for(&server).list_services("web").await.unwrap();

    assert_eq!(services.len(), 1);
    assert_eq!(services[0].id, "svc1");
    assert_eq!(services[0].version.index, 12);
    let status = services[0].update_status.as_ref().unwrap();
    assert_eq!(status.state, Some(UpdateState::RollbackStarted));
    assert_eq!(status.message, "update paused due to failure");
}

#[tokio::test]
async fn test_update_sends_version() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1.43/services/svc1/update"))
        .and(query_param("version", "12"))
        .and(body_partial_json(json!({"Name": "web"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Warnings": null})))
        .expect(1)
        .mount(&server)
        .await;

    let spec = ServiceSpec {
        name: "web".to_string(),
        ..Default::default()
    };
    client_for(&server)
        .update_service("svc1", 12, &spec)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_out_of_sequence_is_a_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1.43/services/svc1/update"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "message": "rpc error: code = Unknown desc = update out of sequence"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .update_service("svc1", 3, &ServiceSpec::default())
        .await
        .unwrap_err();

    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_missing_service_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.43/services/gone"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "service gone not found"})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).inspect_service("gone").await.unwrap_err();

    match err {
        ControlPlaneError::NotFound(message) => assert_eq!(message, "service gone not found"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_create_secret_returns_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1.43/secrets/create"))
        .and(body_partial_json(json!({"Name": "db-1", "Data": "aHVudGVyMg=="})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ID": "sec123"})))
        .expect(1)
        .mount(&server)
        .await;

    let spec = SecretSpec {
        name: "db-1".to_string(),
        labels: BTreeMap::new(),
        data: "aHVudGVyMg==".to_string(),
    };
    let id = client_for(&server).create_secret(&spec).await.unwrap();

    assert_eq!(id, "sec123");
}

#[tokio::test]
async fn test_list_tasks_filters_by_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.43/tasks"))
        .and(query_param("filters", r#"{"service":["svc1"]}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "ID": "t1",
                "ServiceID": "svc1",
                "CreatedAt": "2024-05-01T10:00:00Z",
                "Status": {"State": "failed", "Err": "task: non-zero exit (1)"}
            }
        ])))
        .mount(&server)
        .await;

    let tasks = client_for(&server)
        .list_tasks(&TaskFilter::service("svc1"))
        .await
        .unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status.err, "task: non-zero exit (1)");
    assert!(tasks[0].created_at.is_some());
}

#[tokio::test]
async fn test_event_feed_decodes_lines() {
    let server = MockServer::start().await;
    let body = concat!(
        r#"{"Type":"container","Action":"create","Actor":{"ID":"c1","Attributes":{"com.docker.swarm.service.id":"svc1","name":"web.1"}}}"#,
        "\n",
        r#"{"Type":"container","Action":"health_status: healthy","Actor":{"ID":"c1"}}"#,
        "\n",
    );
    Mock::given(method("GET"))
        .and(path("/v1.43/events"))
        .and(query_param("filters", r#"{"type":["container"]}"#))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let mut events = client_for(&server)
        .subscribe_events(&EventFilter::containers())
        .await
        .unwrap();

    let first = events.next().await.unwrap().unwrap();
    assert_eq!(first.action, "create");
    assert_eq!(first.service_id(), Some("svc1"));

    let second = events.next().await.unwrap().unwrap();
    assert_eq!(second.action, "health_status: healthy");

    assert!(events.next().await.is_none());
}

#[tokio::test]
async fn test_inspect_and_list_images() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.43/images/web:1.4.2/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Id": "sha256:aaa",
            "RepoTags": ["web:1.4.2"],
            "Size": 1024
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.43/images/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"Id": "sha256:aaa", "RepoTags": ["web:1.4.2"]},
            {"Id": "sha256:bbb", "RepoTags": null}
        ])))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let image = client.inspect_image("web:1.4.2").await.unwrap();
    let images = client.list_images().await.unwrap();

    assert_eq!(image.id, "sha256:aaa");
    assert_eq!(images.len(), 2);
    assert_eq!(images[1].id, "sha256:bbb");
    assert!(images[1].repo_tags.is_none());
}

#[tokio::test]
async fn test_save_image_streams_the_archive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.43/images/get"))
        .and(query_param("names", "web:1.4.2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/x-tar")
                .set_body_bytes(b"layer-data".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut archive = client_for(&server).save_image("web:1.4.2").await.unwrap();
    let mut data = Vec::new();
    while let Some(chunk) = archive.next().await {
        data.extend_from_slice(&chunk.unwrap());
    }

    assert_eq!(data, b"layer-data");
}

#[tokio::test]
async fn test_load_image_uploads_tar() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1.43/images/load"))
        .and(query_param("quiet", "1"))
        .and(header("content-type", "application/x-tar"))
        .and(body_bytes(b"layer-data".to_vec()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{\"stream\":\"Loaded image: web:1.4.2\\n\"}\n"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let chunks: Vec<Result<Bytes, ControlPlaneError>> = vec![
        Ok(Bytes::from_static(b"layer-")),
        Ok(Bytes::from_static(b"data")),
    ];
    client_for(&server)
        .load_image(futures::stream::iter(chunks).boxed())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_load_image_reports_stream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1.43/images/load"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"errorDetail\":{\"message\":\"unexpected EOF\"},\"error\":\"unexpected EOF\"}\n",
        ))
        .mount(&server)
        .await;

    let chunks: Vec<Result<Bytes, ControlPlaneError>> = vec![Ok(Bytes::from_static(b"trunc"))];
    let err = client_for(&server)
        .load_image(futures::stream::iter(chunks).boxed())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ControlPlaneError::Api { status: 200, ref message } if message == "unexpected EOF"
    ));
}

#[tokio::test]
async fn test_prune_reports() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1.43/containers/prune"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ContainersDeleted": ["c1", "c2"],
            "SpaceReclaimed": 2048
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1.43/volumes/prune"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "VolumesDeleted": null,
            "SpaceReclaimed": 0
        })))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server);

    let containers = client.prune_containers().await.unwrap();
    let volumes = client.prune_volumes().await.unwrap();

    assert_eq!(containers.containers_deleted.unwrap(), vec!["c1", "c2"]);
    assert_eq!(containers.space_reclaimed, 2048);
    assert!(volumes.volumes_deleted.is_none());
}
