//! End-to-end dispatch against an in-memory repository and a recording
//! publisher.

use std::sync::Arc;

use assert_json_diff::assert_json_eq;
use derivq_auth::{AuthConfig, DispatchClaims, JwtAuthProvider, SigningAlgorithm, SigningConfig};
use derivq_broker::RecordingPublisher;
use derivq_config::{DerivativeTaskConfig, TaskConfigForm};
use derivq_core::events::{MutationBus, MutationEvent, TriggerSource};
use derivq_core::{
    Entity, EntityRef, FieldDescriptor, FileArtifact, MemoryRepository, Principal, SiteUrls,
    StaticPrincipal, TERM_ENTITY_TYPE, Term,
};
use derivq_dispatch::{
    Collaborators, DerivativeHook, DispatchError, DispatchState, Dispatcher, ResolutionError,
    TaskBinding, TemplateError,
};
use serde_json::{Value, json};
use time::OffsetDateTime;

const U1: &str = "http://pcdm.org/use#OriginalFile";
const U2: &str = "http://pcdm.org/use#ServiceFile";

struct Harness {
    repo: Arc<MemoryRepository>,
    publisher: Arc<RecordingPublisher>,
    auth: Arc<JwtAuthProvider>,
    dispatcher: Arc<Dispatcher>,
}

fn admin() -> Principal {
    Principal {
        id: "1".to_string(),
        name: "admin".to_string(),
        uri: "http://localhost:8000/user/1".to_string(),
        roles: vec!["administrator".to_string()],
    }
}

async fn seed(repo: &MemoryRepository) {
    repo.insert_term(Term {
        id: "1".into(),
        name: "Original File".into(),
        uri: U1.into(),
    })
    .await;
    repo.insert_term(Term {
        id: "2".into(),
        name: "Service File".into(),
        uri: U2.into(),
    })
    .await;
    repo.define_reference_field("media", FieldDescriptor::new("field_media_of", "node"))
        .await;
    repo.define_reference_field(
        "media",
        FieldDescriptor::new("field_media_use", TERM_ENTITY_TYPE),
    )
    .await;
    repo.define_reference_field("node", FieldDescriptor::new("field_media", "media"))
        .await;

    let items = [
        ("1", "10", "5", "test_file.txt"),
        ("2", "11", "6", "other_file.txt"),
    ];
    for (node, media, file, name) in items {
        repo.insert_file(FileArtifact {
            id: file.into(),
            uri: format!("public://{name}"),
            url: format!("http://localhost:8000/sites/default/files/{name}"),
        })
        .await;
        repo.insert_entity(
            Entity::new("media", media, "file")
                .with_reference("field_media_of", EntityRef::new("node", node))
                .with_reference("field_media_use", EntityRef::new(TERM_ENTITY_TYPE, "1"))
                .with_reference("field_media_file", EntityRef::new("file", file)),
        )
        .await;
        repo.insert_entity(
            Entity::new("node", node, "repository_item")
                .with_reference("field_media", EntityRef::new("media", media)),
        )
        .await;
    }
}

async fn harness_with(principal: Principal, publisher: RecordingPublisher) -> Harness {
    let repo = Arc::new(MemoryRepository::new());
    seed(&repo).await;

    let auth = Arc::new(
        JwtAuthProvider::from_config(&AuthConfig {
            signing: SigningConfig {
                algorithm: SigningAlgorithm::ES384,
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap(),
    );
    let publisher = Arc::new(publisher);
    let dispatcher = Dispatcher::new(
        Collaborators {
            entities: repo.clone(),
            terms: repo.clone(),
            media: repo.clone(),
            principals: Arc::new(StaticPrincipal(principal)),
            auth: auth.clone(),
            publisher: publisher.clone(),
        },
        SiteUrls::new("http://localhost:8000").unwrap(),
    );

    Harness {
        repo,
        publisher,
        auth,
        dispatcher: Arc::new(dispatcher),
    }
}

async fn harness() -> Harness {
    harness_with(admin(), RecordingPublisher::new()).await
}

fn semantic_config() -> DerivativeTaskConfig {
    TaskConfigForm {
        source_term_uri: U1.into(),
        derivative_term_uri: U2.into(),
        mimetype: "image/jpeg".into(),
        args: "-thumbnail 20x20".into(),
        scheme: "public".into(),
        path: "[date:custom:Y]-[date:custom:m]/[node:nid].jpg".into(),
        ..Default::default()
    }
    .validate(&["public".to_string()])
    .unwrap()
    .config
}

fn field_config() -> DerivativeTaskConfig {
    TaskConfigForm {
        strategy: "field_mapping".into(),
        source_field: "field_media".into(),
        destination_field: "field_media".into(),
        bundle: "tn".into(),
        mimetype: "image/jpeg".into(),
        args: "-thumbnail 20x20".into(),
        ..Default::default()
    }
    .validate(&[])
    .unwrap()
    .config
}

async fn node(h: &Harness, id: &str) -> Entity {
    use derivq_core::EntityIndex;
    h.repo.lookup_entity("node", id).await.unwrap().unwrap()
}

fn year_month(at: OffsetDateTime) -> String {
    format!("{}-{:02}", at.year(), u8::from(at.month()))
}

#[tokio::test]
async fn scenario_a_semantic_tag() {
    let h = harness().await;
    let entity = node(&h, "1").await;

    let before = OffsetDateTime::now_utc();
    let report = h.dispatcher.dispatch(&entity, &semantic_config()).await.unwrap();
    let after = OffsetDateTime::now_utc();

    assert_eq!(report.final_state(), &DispatchState::Done);
    assert_eq!(
        report.states,
        vec![
            DispatchState::Idle,
            DispatchState::Resolving,
            DispatchState::Building,
            DispatchState::Authenticating,
            DispatchState::Publishing,
            DispatchState::Done,
        ]
    );

    let messages = h.publisher.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].queue, "islandora-connector-houdini");

    let body: Value = serde_json::from_str(&messages[0].body).unwrap();
    assert_eq!(body["type"], "Activity");
    assert_eq!(body["summary"], "Generate Derivative");
    assert_eq!(body["actor"], "http://localhost:8000/user/1");
    assert_eq!(body["object"], "http://localhost:8000/node/1");
    assert_eq!(body["attachment"]["type"], "Object");
    assert_eq!(body["attachment"]["mediaType"], "application/json");

    let content = &body["attachment"]["content"];
    assert!(content["source_uri"].as_str().unwrap().contains("test_file.txt"));
    assert!(
        content["destination_uri"]
            .as_str()
            .unwrap()
            .contains("node/1/media/image/2")
    );
    let upload = content["file_upload_uri"].as_str().unwrap();
    let expected: Vec<String> = [before, after]
        .into_iter()
        .map(|at| format!("public://{}/1.jpg", year_month(at)))
        .collect();
    assert!(expected.iter().any(|e| e == upload), "{upload}");
    assert_eq!(content["mimetype"], "image/jpeg");
    assert_eq!(content["args"], "-thumbnail 20x20");

    let keys: Vec<&str> = content
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys.len(), 5, "unexpected content keys: {keys:?}");
    let config_only = [
        "scheme",
        "path",
        "source_term_uri",
        "derivative_term_uri",
        "queue",
        "event",
    ];
    for forbidden in config_only {
        assert!(content.get(forbidden).is_none(), "{forbidden} leaked");
    }
}

#[tokio::test]
async fn scenario_b_field_mapping() {
    let h = harness().await;
    let entity = node(&h, "1").await;

    h.dispatcher.dispatch(&entity, &field_config()).await.unwrap();

    let messages = h.publisher.messages().await;
    let body: Value = serde_json::from_str(&messages[0].body).unwrap();
    assert_json_eq!(
        body["attachment"]["content"].clone(),
        json!({
            "source": "field_media",
            "destination": "field_media",
            "bundle": "tn",
            "mimetype": "image/jpeg",
            "args": "-thumbnail 20x20"
        })
    );
}

#[tokio::test]
async fn scenario_c_untagged_media_never_publishes() {
    let h = harness().await;
    h.repo
        .insert_entity(
            Entity::new("media", "10", "file")
                .with_reference("field_media_of", EntityRef::new("node", "1"))
                .with_reference("field_media_use", EntityRef::new(TERM_ENTITY_TYPE, "2"))
                .with_reference("field_media_file", EntityRef::new("file", "5")),
        )
        .await;
    let entity = node(&h, "1").await;

    let err = h
        .dispatcher
        .dispatch(&entity, &semantic_config())
        .await
        .unwrap_err();
    assert!(matches!(
        err.error,
        DispatchError::Resolution(ResolutionError::NoMatchingMedia { .. })
    ));
    assert_eq!(err.stage(), DispatchState::Resolving);
    assert!(err.event.is_none());
    assert_eq!(h.publisher.count().await, 0);
}

#[tokio::test]
async fn scenario_d_concurrent_dispatches_do_not_leak() {
    let h = harness().await;
    let first = node(&h, "1").await;
    let second = node(&h, "2").await;
    let config = semantic_config();

    let (a, b) = tokio::join!(
        h.dispatcher.dispatch(&first, &config),
        h.dispatcher.dispatch(&second, &config)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    for (report, file, id) in [(a, "test_file.txt", "1"), (b, "other_file.txt", "2")] {
        let content = serde_json::to_value(report.event.content()).unwrap();
        assert!(content["source_uri"].as_str().unwrap().ends_with(file));
        assert!(
            content["destination_uri"]
                .as_str()
                .unwrap()
                .contains(&format!("node/{id}/media/image/2"))
        );
        assert!(
            content["file_upload_uri"]
                .as_str()
                .unwrap()
                .ends_with(&format!("/{id}.jpg"))
        );
        assert_eq!(report.event.object, format!("http://localhost:8000/node/{id}"));
    }
    assert_eq!(h.publisher.count().await, 2);
}

#[tokio::test]
async fn template_failure_never_publishes() {
    let h = harness().await;
    let entity = node(&h, "1").await;
    let config = TaskConfigForm {
        source_term_uri: U1.into(),
        derivative_term_uri: U2.into(),
        path: "[user:name]/[node:nid].jpg".into(),
        ..Default::default()
    }
    .validate(&[])
    .unwrap()
    .config;

    let err = h.dispatcher.dispatch(&entity, &config).await.unwrap_err();
    assert!(matches!(
        err.error,
        DispatchError::Template(TemplateError::UnknownNamespace(_))
    ));
    assert_eq!(err.stage(), DispatchState::Building);
    assert_eq!(h.publisher.count().await, 0);
}

#[tokio::test]
async fn auth_failure_never_publishes() {
    let nameless = Principal {
        name: String::new(),
        ..admin()
    };
    let h = harness_with(nameless, RecordingPublisher::new()).await;
    let entity = node(&h, "1").await;

    let err = h
        .dispatcher
        .dispatch(&entity, &semantic_config())
        .await
        .unwrap_err();
    assert!(matches!(err.error, DispatchError::Auth(_)));
    assert_eq!(err.stage(), DispatchState::Authenticating);
    assert!(err.event.is_some());
    assert_eq!(h.publisher.count().await, 0);
}

#[tokio::test]
async fn malformed_config_is_rejected_before_resolution() {
    let h = harness().await;
    let entity = node(&h, "1").await;
    let mut config = semantic_config();
    config.queue = String::new();

    let err = h.dispatcher.dispatch(&entity, &config).await.unwrap_err();
    assert!(matches!(err.error, DispatchError::Config(_)));
    assert_eq!(h.publisher.count().await, 0);
}

#[tokio::test]
async fn publish_failure_happens_after_event_is_built() {
    let h = harness_with(admin(), RecordingPublisher::failing("broker down")).await;
    let entity = node(&h, "1").await;

    let err = h
        .dispatcher
        .dispatch(&entity, &semantic_config())
        .await
        .unwrap_err();
    assert!(err.reached_broker());
    assert_eq!(err.stage(), DispatchState::Publishing);

    assert_eq!(err.task, semantic_config().name);
    assert_eq!(err.entity, EntityRef::new("node", "1"));
    assert_eq!(
        &err.states[..5],
        &[
            DispatchState::Idle,
            DispatchState::Resolving,
            DispatchState::Building,
            DispatchState::Authenticating,
            DispatchState::Publishing,
        ]
    );
    assert!(matches!(err.final_state(), DispatchState::Aborted(reason) if reason.contains("broker down")));

    // The event that would have been sent survives the abort
    let event = err.event.expect("event was built before publishing");
    assert_eq!(event.object, "http://localhost:8000/node/1");
    let content = serde_json::to_value(event.content()).unwrap();
    assert!(content["source_uri"].as_str().unwrap().ends_with("test_file.txt"));
}

#[tokio::test]
async fn message_carries_bearer_token_for_principal() {
    let h = harness().await;
    let entity = node(&h, "1").await;
    h.dispatcher.dispatch(&entity, &field_config()).await.unwrap();

    let messages = h.publisher.messages().await;
    let header = &messages[0].headers["Authorization"];
    let token = header.strip_prefix("Bearer ").unwrap();
    let claims = h.auth.jwt().decode::<DispatchClaims>(token).unwrap().claims;
    assert_eq!(claims.sub, "admin");
    assert_eq!(claims.webid, "1");
}

#[tokio::test]
async fn hook_dispatches_on_save_and_swallows_failures() {
    let h = harness().await;
    let bus = MutationBus::new();
    let semantic = TaskConfigForm {
        name: "service-file".into(),
        source_term_uri: U1.into(),
        derivative_term_uri: U2.into(),
        ..Default::default()
    }
    .validate(&[])
    .unwrap();
    let broken = TaskConfigForm {
        name: "broken".into(),
        source_term_uri: U1.into(),
        derivative_term_uri: "http://example.org/missing".into(),
        ..Default::default()
    }
    .validate(&[])
    .unwrap();

    let hook = Arc::new(DerivativeHook::new(
        h.dispatcher.clone(),
        vec![TaskBinding::from(semantic), TaskBinding::from(broken)],
    ));
    bus.subscribe(hook.clone()).await;

    let entity = node(&h, "1").await;
    let summary = bus.emit(&MutationEvent::updated(entity.clone())).await;
    assert_eq!(summary.matched, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(hook.stats().dispatched(), 1);
    assert_eq!(hook.stats().aborted(), 1);
    assert_eq!(h.publisher.count().await, 1);

    // Deletions never fire.
    bus.emit(&MutationEvent::deleted(entity)).await;
    assert_eq!(h.publisher.count().await, 1);
}
