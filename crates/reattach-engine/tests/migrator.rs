//! End-to-end runs against a mock API server, one per strategy shape.

use httpmock::Method::{DELETE, GET, PATCH, POST, PUT};
use httpmock::MockServer;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::broadcast::Receiver;

use reattach_client::{ApiSession, Credentials};
use reattach_core::{RunOptions, WriteStrategy};
use reattach_engine::Migrator;
use reattach_events::{EventBus, EventEnvelope};
use reattach_test_support::fixtures::{
    attachment_json, created_json, item_json, page_json, work_key_json,
};

async fn session_for(server: &MockServer) -> ApiSession {
    server.mock(|when, then| {
        when.method(GET)
            .path("/rest/v2/projects")
            .query_param("maxResults", "1");
        then.status(200).json_body(page_json(&[], None));
    });
    ApiSession::connect(
        reqwest::Client::new(),
        server.base_url().parse().expect("mock server url"),
        Credentials::Basic {
            username: "user".to_string(),
            password: "secret".to_string(),
        },
    )
    .await
    .expect("connect")
}

fn temp_staging() -> TempDir {
    tempfile::Builder::new()
        .prefix("reattach-engine-")
        .tempdir()
        .expect("temp dir")
}

fn options(strategy: WriteStrategy, staging: &TempDir) -> RunOptions {
    RunOptions {
        project: 7,
        item_type: Some(23),
        prefix: String::new(),
        start_index: 1,
        strategy,
        staging_dir: staging.path().join("staging"),
        delete_after_run: true,
    }
}

fn drain_kinds(receiver: &mut Receiver<EventEnvelope>) -> Vec<&'static str> {
    let mut kinds = Vec::new();
    while let Ok(envelope) = receiver.try_recv() {
        kinds.push(envelope.event.kind());
    }
    kinds
}

#[tokio::test]
async fn in_place_run_overwrites_matching_attachments() {
    let server = MockServer::start_async().await;
    let session = session_for(&server).await;

    server.mock(|when, then| {
        when.method(GET)
            .path("/rest/v2/abstractitems")
            .query_param("project", "7")
            .query_param("itemType", "23");
        then.status(200).json_body(page_json(
            &[
                attachment_json(31, "imageA.png", Some("imageA.png"), Some(5), 23),
                attachment_json(32, "spec.docx", Some("spec.docx"), Some(5), 23),
                attachment_json(33, "Image B.jpg", Some("imageB.jpg"), Some(6), 23),
            ],
            None,
        ));
    });
    for id in [31, 33] {
        server.mock(move |when, then| {
            when.method(GET)
                .path(format!("/rest/v2/attachments/{id}/file"));
            then.status(200).body(b"bytes");
        });
    }
    let upload_a = server.mock(|when, then| {
        when.method(PUT).path("/rest/v2/attachments/31/file");
        then.status(200);
    });
    let upload_b = server.mock(|when, then| {
        when.method(PUT).path("/rest/v2/attachments/33/file");
        then.status(200);
    });

    let staging = temp_staging();
    let opts = options(WriteStrategy::InPlace, &staging);
    let bus = EventBus::new();
    let mut receiver = bus.subscribe();
    let migrator = Migrator::new(session, bus);

    let report = migrator.run(&opts).await.expect("run");
    assert_eq!(report.records_seen, 3);
    assert_eq!(report.matched, 2);
    assert_eq!(report.downloaded, 2);
    assert_eq!(report.uploaded, 2);
    assert_eq!(report.failed, 0);
    assert!(report.is_clean());
    upload_a.assert();
    upload_b.assert();

    // delete_after_run removed the staging directory
    assert!(!opts.staging_dir.exists());
    assert!(report.staging_dir.is_none());

    let kinds = drain_kinds(&mut receiver);
    assert!(kinds.contains(&"records_matched"));
    assert!(kinds.contains(&"cleanup_completed"));
    assert!(!kinds.contains(&"original_deleted"));
}

#[tokio::test]
async fn in_place_failures_do_not_stop_other_plans() {
    let server = MockServer::start_async().await;
    let session = session_for(&server).await;

    server.mock(|when, then| {
        when.method(GET).path("/rest/v2/abstractitems");
        then.status(200).json_body(page_json(
            &[
                attachment_json(31, "image1.png", Some("image1.png"), Some(5), 23),
                attachment_json(32, "image2.png", Some("image2.png"), Some(5), 23),
                attachment_json(33, "image3.png", Some("image3.png"), Some(5), 23),
            ],
            None,
        ));
    });
    for id in [31, 32, 33] {
        server.mock(move |when, then| {
            when.method(GET)
                .path(format!("/rest/v2/attachments/{id}/file"));
            then.status(200).body(b"bytes");
        });
    }
    server.mock(|when, then| {
        when.method(PUT).path("/rest/v2/attachments/31/file");
        then.status(200);
    });
    server.mock(|when, then| {
        when.method(PUT).path("/rest/v2/attachments/32/file");
        then.status(500)
            .json_body(json!({"meta": {"status": 500, "message": "boom"}}));
    });
    let last_upload = server.mock(|when, then| {
        when.method(PUT).path("/rest/v2/attachments/33/file");
        then.status(200);
    });

    let staging = temp_staging();
    let opts = options(WriteStrategy::InPlace, &staging);
    let migrator = Migrator::new(session, EventBus::new());

    let report = migrator.run(&opts).await.expect("run");
    assert_eq!(report.uploaded, 2);
    assert_eq!(report.failed, 1);
    assert!(!report.is_clean());
    last_upload.assert();
}

#[tokio::test]
async fn by_item_run_replaces_and_deletes_originals() {
    let server = MockServer::start_async().await;
    let session = session_for(&server).await;

    server.mock(|when, then| {
        when.method(GET)
            .path("/rest/v2/items")
            .query_param("project", "7");
        then.status(200)
            .json_body(page_json(&[item_json(5, "Folder"), item_json(6, "Leaf")], None));
    });
    server.mock(|when, then| {
        when.method(GET).path("/rest/v2/items/5/attachments");
        then.status(200).json_body(page_json(
            &[attachment_json(31, "image one.png", Some("image1.png"), None, 23)],
            None,
        ));
    });
    server.mock(|when, then| {
        when.method(GET).path("/rest/v2/items/6/attachments");
        then.status(404);
    });
    server.mock(|when, then| {
        when.method(GET).path("/rest/v2/attachments/31/file");
        then.status(200).body(b"bytes");
    });
    let create = server.mock(|when, then| {
        when.method(POST).path("/rest/v2/projects/7/attachments");
        then.status(201).json_body(created_json(901));
    });
    let upload = server.mock(|when, then| {
        when.method(PUT).path("/rest/v2/attachments/901/file");
        then.status(200);
    });
    let link = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/v2/items/5/attachments")
            .json_body(json!({"attachment": 901}));
        then.status(201);
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/rest/v2/items/5/attachments/31");
        then.status(204);
    });

    let staging = temp_staging();
    let opts = options(WriteStrategy::ByItem, &staging);
    let bus = EventBus::new();
    let mut receiver = bus.subscribe();
    let migrator = Migrator::new(session, bus);

    let report = migrator.run(&opts).await.expect("run");
    assert_eq!(report.matched, 1);
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.linked, 1);
    assert_eq!(report.deleted, 1);
    assert!(!report.delete_phase_skipped);
    create.assert();
    upload.assert();
    link.assert();
    delete.assert();

    let kinds = drain_kinds(&mut receiver);
    assert!(kinds.contains(&"placeholder_created"));
    assert!(kinds.contains(&"linked"));
    assert!(kinds.contains(&"original_deleted"));
}

#[tokio::test]
async fn by_item_halts_on_first_failure_and_keeps_originals() {
    let server = MockServer::start_async().await;
    let session = session_for(&server).await;

    server.mock(|when, then| {
        when.method(GET).path("/rest/v2/items");
        then.status(200)
            .json_body(page_json(&[item_json(5, "Folder")], None));
    });
    server.mock(|when, then| {
        when.method(GET).path("/rest/v2/items/5/attachments");
        then.status(200).json_body(page_json(
            &[
                attachment_json(31, "imageA.png", Some("imageA.png"), None, 23),
                attachment_json(32, "imageB.png", Some("imageB.png"), None, 23),
                attachment_json(33, "imageC.png", Some("imageC.png"), None, 23),
            ],
            None,
        ));
    });
    for id in [31, 32, 33] {
        server.mock(move |when, then| {
            when.method(GET)
                .path(format!("/rest/v2/attachments/{id}/file"));
            then.status(200).body(b"bytes");
        });
    }
    let first_create = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/v2/projects/7/attachments")
            .json_body_includes(r#"{"fields": {"name": "imageA_00001.png"}}"#);
        then.status(201).json_body(created_json(901));
    });
    server.mock(|when, then| {
        when.method(PUT).path("/rest/v2/attachments/901/file");
        then.status(200);
    });
    let first_link = server.mock(|when, then| {
        when.method(POST).path("/rest/v2/items/5/attachments");
        then.status(201);
    });
    // The second placeholder is created but its upload fails, leaving an
    // orphan that is reported rather than rolled back.
    let second_create = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/v2/projects/7/attachments")
            .json_body_includes(r#"{"fields": {"name": "imageB_00002.png"}}"#);
        then.status(201).json_body(created_json(902));
    });
    server.mock(|when, then| {
        when.method(PUT).path("/rest/v2/attachments/902/file");
        then.status(500);
    });
    let third_create = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/v2/projects/7/attachments")
            .json_body_includes(r#"{"fields": {"name": "imageC_00003.png"}}"#);
        then.status(201).json_body(created_json(903));
    });
    let deletes = server.mock(|when, then| {
        when.method(DELETE).path_includes("/attachments/");
        then.status(204);
    });

    let staging = temp_staging();
    let opts = options(WriteStrategy::ByItem, &staging);
    let bus = EventBus::new();
    let mut receiver = bus.subscribe();
    let migrator = Migrator::new(session, bus);

    let report = migrator.run(&opts).await.expect("run");
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.linked, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.deleted, 0);
    assert!(report.delete_phase_skipped);
    first_create.assert();
    first_link.assert();
    second_create.assert();
    third_create.assert_calls(0);
    deletes.assert_calls(0);

    let kinds = drain_kinds(&mut receiver);
    assert!(kinds.contains(&"transfer_failed"));
    assert!(kinds.contains(&"transfers_halted"));
    assert!(kinds.contains(&"delete_phase_skipped"));
}

#[tokio::test]
async fn in_place_rename_submits_one_batch_for_all_plans() {
    let server = MockServer::start_async().await;
    let session = session_for(&server).await;

    server.mock(|when, then| {
        when.method(GET).path("/rest/v2/abstractitems");
        then.status(200).json_body(page_json(
            &[
                attachment_json(31, "image1.png", Some("image1.png"), Some(5), 23),
                attachment_json(32, "image2.png", Some("image2.png"), Some(5), 23),
            ],
            None,
        ));
    });
    for id in [31, 32] {
        server.mock(move |when, then| {
            when.method(GET)
                .path(format!("/rest/v2/attachments/{id}/file"));
            then.status(200).body(b"bytes");
        });
        server.mock(move |when, then| {
            when.method(PUT)
                .path(format!("/rest/v2/attachments/{id}/file"));
            then.status(200);
        });
    }
    let patch = server.mock(|when, then| {
        when.method(PATCH).path("/rest/v1/items").json_body(json!([
            {
                "items": [31],
                "operations": [
                    {"op": "replace", "path": "/fields/name", "value": "image1_00001.png"}
                ]
            },
            {
                "items": [32],
                "operations": [
                    {"op": "replace", "path": "/fields/name", "value": "image2_00002.png"}
                ]
            }
        ]));
        then.status(200).json_body(work_key_json("work-77"));
    });

    let staging = temp_staging();
    let opts = options(WriteStrategy::InPlaceRename, &staging);
    let migrator = Migrator::new(session, EventBus::new());

    let report = migrator.run(&opts).await.expect("run");
    assert_eq!(report.uploaded, 2);
    assert_eq!(report.work_key.as_deref(), Some("work-77"));
    patch.assert();
}

#[tokio::test]
async fn empty_match_set_creates_no_staging_directory() {
    let server = MockServer::start_async().await;
    let session = session_for(&server).await;

    server.mock(|when, then| {
        when.method(GET).path("/rest/v2/abstractitems");
        then.status(200).json_body(page_json(
            &[attachment_json(31, "diagram.vsd", Some("diagram.vsd"), Some(5), 23)],
            None,
        ));
    });

    let staging = temp_staging();
    let opts = options(WriteStrategy::InPlace, &staging);
    let bus = EventBus::new();
    let mut receiver = bus.subscribe();
    let migrator = Migrator::new(session, bus);

    let report = migrator.run(&opts).await.expect("run");
    assert_eq!(report.records_seen, 1);
    assert_eq!(report.matched, 0);
    assert!(!opts.staging_dir.exists());

    let kinds = drain_kinds(&mut receiver);
    assert!(kinds.contains(&"nothing_to_do"));
    assert!(!kinds.contains(&"cleanup_completed"));
}

#[tokio::test]
async fn failed_download_skips_the_plan_but_not_the_run() {
    let server = MockServer::start_async().await;
    let session = session_for(&server).await;

    server.mock(|when, then| {
        when.method(GET).path("/rest/v2/abstractitems");
        then.status(200).json_body(page_json(
            &[
                attachment_json(31, "image1.png", Some("image1.png"), Some(5), 23),
                attachment_json(32, "image2.png", Some("image2.png"), Some(5), 23),
            ],
            None,
        ));
    });
    server.mock(|when, then| {
        when.method(GET).path("/rest/v2/attachments/31/file");
        then.status(500);
    });
    server.mock(|when, then| {
        when.method(GET).path("/rest/v2/attachments/32/file");
        then.status(200).body(b"bytes");
    });
    let skipped_upload = server.mock(|when, then| {
        when.method(PUT).path("/rest/v2/attachments/31/file");
        then.status(200);
    });
    let upload = server.mock(|when, then| {
        when.method(PUT).path("/rest/v2/attachments/32/file");
        then.status(200);
    });

    let staging = temp_staging();
    let opts = options(WriteStrategy::InPlace, &staging);
    let migrator = Migrator::new(session, EventBus::new());

    let report = migrator.run(&opts).await.expect("run");
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.failed, 1);
    skipped_upload.assert_calls(0);
    upload.assert();
}

#[tokio::test]
async fn staging_directory_is_kept_on_request() {
    let server = MockServer::start_async().await;
    let session = session_for(&server).await;

    server.mock(|when, then| {
        when.method(GET).path("/rest/v2/abstractitems");
        then.status(200).json_body(page_json(
            &[attachment_json(31, "image1.png", Some("image1.png"), Some(5), 23)],
            None,
        ));
    });
    server.mock(|when, then| {
        when.method(GET).path("/rest/v2/attachments/31/file");
        then.status(200).body(b"bytes");
    });
    server.mock(|when, then| {
        when.method(PUT).path("/rest/v2/attachments/31/file");
        then.status(200);
    });

    let staging = temp_staging();
    let mut opts = options(WriteStrategy::InPlace, &staging);
    opts.delete_after_run = false;
    let bus = EventBus::new();
    let mut receiver = bus.subscribe();
    let migrator = Migrator::new(session, bus);

    let report = migrator.run(&opts).await.expect("run");
    assert_eq!(report.staging_dir.as_deref(), Some(opts.staging_dir.as_path()));
    assert!(opts.staging_dir.join("image1_00001.png").is_file());

    let kinds = drain_kinds(&mut receiver);
    assert!(kinds.contains(&"staging_kept"));
}

#[tokio::test]
async fn in_place_without_an_item_type_is_rejected() {
    let server = MockServer::start_async().await;
    let session = session_for(&server).await;

    let staging = temp_staging();
    let mut opts = options(WriteStrategy::InPlace, &staging);
    opts.item_type = None;
    let migrator = Migrator::new(session, EventBus::new());

    let err = migrator.run(&opts).await.expect_err("missing item type");
    assert!(err.detail().contains("item_type"));
}

#[tokio::test]
async fn pagination_is_followed_during_discovery() {
    let server = MockServer::start_async().await;
    let session = session_for(&server).await;

    let next = format!(
        "{}/rest/v2/abstractitems?project=7&itemType=23&startAt=20",
        server.base_url()
    );
    server.mock(|when, then| {
        when.method(GET)
            .path("/rest/v2/abstractitems")
            .query_param("startAt", "0");
        then.status(200).json_body(page_json(
            &[attachment_json(31, "image1.png", Some("image1.png"), Some(5), 23)],
            Some(&next),
        ));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/rest/v2/abstractitems")
            .query_param("startAt", "20");
        then.status(200).json_body(page_json(
            &[attachment_json(32, "image2.png", Some("image2.png"), Some(5), 23)],
            None,
        ));
    });
    for id in [31, 32] {
        server.mock(move |when, then| {
            when.method(GET)
                .path(format!("/rest/v2/attachments/{id}/file"));
            then.status(200).body(b"bytes");
        });
        server.mock(move |when, then| {
            when.method(PUT)
                .path(format!("/rest/v2/attachments/{id}/file"));
            then.status(200);
        });
    }

    let staging = temp_staging();
    let opts = options(WriteStrategy::InPlace, &staging);
    let migrator = Migrator::new(session, EventBus::new());

    let report = migrator.run(&opts).await.expect("run");
    assert_eq!(report.records_seen, 2);
    assert_eq!(report.uploaded, 2);
}
