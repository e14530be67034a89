mod common;

use std::collections::HashSet;

use flagplane_api::services::{CreatePushRequest, UpdatePushRequest};
use flagplane_api::{Conflict, ListOptions, ServiceError};
use flagplane_auth::Role;
use flagplane_core::{AggregateId, AggregateRoot, TenantId, Violation};
use flagplane_events::execute;
use flagplane_infra::storage::{Database, Repository};
use flagplane_push::{AddPushTags, CreatePush, DeletePushTags, Push, PushCommand, RenamePush};

use common::{Harness, admin, ctx, ns, strings};

fn create(name: &str, key: &str, tags: &[&str]) -> CreatePushRequest {
    CreatePushRequest {
        command: Some(CreatePush {
            name: name.into(),
            delivery_key: key.into(),
            tags: strings(tags),
        }),
    }
}

fn page(size: usize, cursor: &str) -> ListOptions {
    ListOptions {
        page_size: size,
        cursor: cursor.into(),
        ..ListOptions::default()
    }
}

async fn seeded() -> Harness {
    let h = Harness::new().await;
    h.seed_project("p1", false, false).await;
    h.seed_environment("ns1", "p1").await;
    h.seed_environment("ns2", "p1").await;
    h
}

#[tokio::test]
async fn duplicate_key_and_tag_scenario() {
    let h = seeded().await;
    let ctx = admin();
    let ns1 = ns("ns1");

    let first = h.pushes.create_push(&ctx, &ns1, create("n1", "k1", &["t1"])).await.unwrap();
    assert_eq!(first.tags(), ["t1".to_string()]);

    let err = h.pushes.create_push(&ctx, &ns1, create("n2", "k1", &["t2"])).await.unwrap_err();
    assert_eq!(err, ServiceError::AlreadyExists(Conflict::DeliveryKey));

    let err = h.pushes.create_push(&ctx, &ns1, create("n3", "k2", &["t1"])).await.unwrap_err();
    assert_eq!(err, ServiceError::AlreadyExists(Conflict::Tag));

    let listed = h.pushes.list_pushes(&ctx, &ns1, &page(500, "")).await.unwrap();
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.total_count, 1);
}

#[tokio::test]
async fn create_publishes_one_event_after_commit() {
    let h = seeded().await;
    let events = h.subscribe();

    let push = h
        .pushes
        .create_push(&admin(), &ns("ns1"), create("n1", "k1", &["t1"]))
        .await
        .unwrap();

    let published = events.drain();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].aggregate_id(), push.id());
    assert_eq!(published[0].tenant(), &ns("ns1"));
    assert!(published[0].editor().is_admin);
}

#[tokio::test]
async fn create_request_validation() {
    let h = seeded().await;
    let ns1 = ns("ns1");

    let err = h
        .pushes
        .create_push(&admin(), &ns1, CreatePushRequest { command: None })
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::Validation(Violation::NoCommand));

    let err = h.pushes.create_push(&admin(), &ns1, create("", "k1", &["t1"])).await.unwrap_err();
    assert_eq!(err, ServiceError::Validation(Violation::NameRequired));

    let err = h.pushes.create_push(&admin(), &ns1, create("n1", "", &["t1"])).await.unwrap_err();
    assert_eq!(err, ServiceError::Validation(Violation::DeliveryKeyRequired));

    let err = h
        .pushes
        .create_push(&admin(), &ns1, create("n1", "k1", &["t1", "t1"]))
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::Validation(Violation::TagDuplicated));

    assert_eq!(h.db.row_count("pushes").unwrap(), 0);
}

#[tokio::test]
async fn soft_deleted_push_is_invisible() {
    let h = seeded().await;
    let ctx = admin();
    let ns1 = ns("ns1");
    let push = h.pushes.create_push(&ctx, &ns1, create("n1", "k1", &["t1"])).await.unwrap();
    let id = push.id().as_str().to_string();

    h.pushes.delete_push(&ctx, &ns1, &id).await.unwrap();

    assert_eq!(h.pushes.get_push(&ctx, &ns1, &id).await.unwrap_err(), ServiceError::NotFound);
    let listed = h.pushes.list_pushes(&ctx, &ns1, &page(0, "")).await.unwrap();
    assert!(listed.items.is_empty());
    assert_eq!(listed.total_count, 0);

    assert_eq!(h.pushes.delete_push(&ctx, &ns1, &id).await.unwrap_err(), ServiceError::NotFound);
    let rename = UpdatePushRequest {
        id: id.clone(),
        commands: vec![PushCommand::Rename(RenamePush { name: "again".into() })],
    };
    assert_eq!(
        h.pushes.update_push(&ctx, &ns1, rename).await.unwrap_err(),
        ServiceError::NotFound
    );

    // The row is kept, flagged deleted; its key and tags are free again.
    assert_eq!(h.db.row_count("pushes").unwrap(), 1);
    h.pushes.create_push(&ctx, &ns1, create("n2", "k1", &["t1"])).await.unwrap();
}

#[tokio::test]
async fn failed_command_leaves_no_trace() {
    let h = seeded().await;
    let ctx = admin();
    let ns1 = ns("ns1");
    let push = h.pushes.create_push(&ctx, &ns1, create("n1", "k1", &["t1"])).await.unwrap();
    let id = push.id().as_str().to_string();
    let events = h.subscribe();

    let request = UpdatePushRequest {
        id: id.clone(),
        commands: vec![
            PushCommand::Rename(RenamePush { name: "renamed".into() }),
            PushCommand::AddTags(AddPushTags { tags: strings(&["t2"]) }),
            PushCommand::DeleteTags(DeletePushTags { tags: strings(&["missing"]) }),
        ],
    };
    let err = h.pushes.update_push(&ctx, &ns1, request).await.unwrap_err();
    assert!(matches!(err, ServiceError::FailedPrecondition(_)));

    let stored = h.pushes.get_push(&ctx, &ns1, &id).await.unwrap();
    assert_eq!(stored, push);
    assert!(events.drain().is_empty());
}

#[tokio::test]
async fn ordered_commands_apply_in_sequence() {
    let h = seeded().await;
    let ctx = admin();
    let ns1 = ns("ns1");
    let push = h.pushes.create_push(&ctx, &ns1, create("n1", "k1", &["t1"])).await.unwrap();
    let events = h.subscribe();

    let request = UpdatePushRequest {
        id: push.id().as_str().into(),
        commands: vec![
            PushCommand::AddTags(AddPushTags { tags: strings(&["t2", "t3"]) }),
            PushCommand::DeleteTags(DeletePushTags { tags: strings(&["t1"]) }),
            PushCommand::Rename(RenamePush { name: "n1b".into() }),
        ],
    };
    let updated = h.pushes.update_push(&ctx, &ns1, request).await.unwrap();

    assert_eq!(updated.name(), "n1b");
    assert_eq!(updated.tags(), strings(&["t2", "t3"]).as_slice());
    assert_eq!(updated.version(), push.version() + 3);
    let types: Vec<String> = events.drain().iter().map(|e| e.event_type().to_string()).collect();
    assert_eq!(types.len(), 3);
}

#[tokio::test]
async fn update_request_shape_is_checked() {
    let h = seeded().await;
    let ns1 = ns("ns1");

    let err = h
        .pushes
        .update_push(&admin(), &ns1, UpdatePushRequest { id: String::new(), commands: vec![] })
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::Validation(Violation::IdRequired));

    let err = h
        .pushes
        .update_push(&admin(), &ns1, UpdatePushRequest { id: "x".into(), commands: vec![] })
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::Validation(Violation::NoCommand));

    let err = h
        .pushes
        .update_push(
            &admin(),
            &ns1,
            UpdatePushRequest {
                id: "x".into(),
                commands: vec![PushCommand::Delete],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::Validation(Violation::UnsupportedCommand));
}

#[tokio::test]
async fn tags_and_keys_are_unique_per_tenant() {
    let h = seeded().await;
    let ctx = admin();
    let ns1 = ns("ns1");
    let ns2 = ns("ns2");

    h.pushes.create_push(&ctx, &ns1, create("a", "k1", &["x"])).await.unwrap();
    let other = h.pushes.create_push(&ctx, &ns1, create("b", "k2", &["y"])).await.unwrap();

    let add_x = UpdatePushRequest {
        id: other.id().as_str().into(),
        commands: vec![PushCommand::AddTags(AddPushTags { tags: strings(&["x"]) })],
    };
    assert_eq!(
        h.pushes.update_push(&ctx, &ns1, add_x).await.unwrap_err(),
        ServiceError::AlreadyExists(Conflict::Tag)
    );

    // Same key and tag in another tenant do not collide.
    h.pushes.create_push(&ctx, &ns2, create("a", "k1", &["x"])).await.unwrap();

    let all: Vec<Push> = h.pushes.list_pushes(&ctx, &ns1, &page(0, "")).await.unwrap().items;
    let mut seen = HashSet::new();
    for tag in all.iter().flat_map(|p| p.tags()) {
        assert!(seen.insert(tag.clone()), "tag {tag} appears twice");
    }
}

#[tokio::test]
async fn cursor_walks_every_push_once() {
    let h = seeded().await;
    let ctx = admin();
    let ns1 = ns("ns1");
    let mut created = HashSet::new();
    for i in 0..7 {
        let push = h
            .pushes
            .create_push(&ctx, &ns1, create(&format!("n{i}"), &format!("k{i}"), &[&format!("t{i}")]))
            .await
            .unwrap();
        created.insert(push.id().as_str().to_string());
    }

    let mut seen = HashSet::new();
    let mut cursor = String::new();
    let mut pages = 0;
    loop {
        let listed = h.pushes.list_pushes(&ctx, &ns1, &page(3, &cursor)).await.unwrap();
        assert_eq!(listed.total_count, 7);
        if listed.items.is_empty() {
            break;
        }
        for push in listed.items {
            assert!(seen.insert(push.id().as_str().to_string()));
        }
        cursor = listed.next_cursor;
        pages += 1;
    }

    assert_eq!(pages, 3);
    assert_eq!(cursor, "7");
    assert_eq!(seen, created);
}

#[tokio::test]
async fn list_orders_and_searches_by_name() {
    let h = seeded().await;
    let ctx = admin();
    let ns1 = ns("ns1");
    for (name, key) in [("beta", "k1"), ("alpha", "k2"), ("gamma ray", "k3")] {
        h.pushes.create_push(&ctx, &ns1, create(name, key, &[key])).await.unwrap();
    }

    let mut options = page(0, "");
    options.order_by = "name".into();
    options.direction = flagplane_infra::storage::Direction::Desc;
    let names: Vec<String> = h
        .pushes
        .list_pushes(&ctx, &ns1, &options)
        .await
        .unwrap()
        .items
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    assert_eq!(names, ["gamma ray", "beta", "alpha"]);

    let mut search = page(0, "");
    search.search_keyword = "RAY".into();
    let found = h.pushes.list_pushes(&ctx, &ns1, &search).await.unwrap();
    assert_eq!(found.total_count, 1);
    assert_eq!(found.items[0].name(), "gamma ray");

    let mut bad_order = page(0, "");
    bad_order.order_by = "delivery_key".into();
    assert_eq!(
        h.pushes.list_pushes(&ctx, &ns1, &bad_order).await.unwrap_err(),
        ServiceError::InvalidOrderBy
    );
    assert_eq!(
        h.pushes.list_pushes(&ctx, &ns1, &page(0, "nope")).await.unwrap_err(),
        ServiceError::InvalidCursor
    );
}

#[tokio::test]
async fn tenant_roles_gate_push_operations() {
    let h = seeded().await;
    h.seed_account("ns1", "viewer@example.com", Role::Viewer).await;
    h.seed_account("ns1", "editor@example.com", Role::Editor).await;
    let ns1 = ns("ns1");

    let err = h
        .pushes
        .create_push(&ctx("viewer@example.com"), &ns1, create("n1", "k1", &["t1"]))
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::PermissionDenied);

    let push = h
        .pushes
        .create_push(&ctx("editor@example.com"), &ns1, create("n1", "k1", &["t1"]))
        .await
        .unwrap();
    let id = push.id().as_str().to_string();
    h.pushes.get_push(&ctx("viewer@example.com"), &ns1, &id).await.unwrap();

    // No account in ns2.
    let err = h
        .pushes
        .get_push(&ctx("editor@example.com"), &ns("ns2"), &id)
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::PermissionDenied);

    let anonymous = flagplane_api::RequestContext::default();
    assert_eq!(
        h.pushes.get_push(&anonymous, &ns1, &id).await.unwrap_err(),
        ServiceError::Unauthenticated
    );
}

#[tokio::test]
async fn stored_duplicate_key_fails_create_as_internal() {
    let h = seeded().await;
    let ns1 = ns("ns1");
    // Written straight to storage, past the uniqueness check.
    let mut conn = h.db.connection().await.unwrap();
    for (id, tag) in [("a", "t1"), ("b", "t2")] {
        let mut push = Push::empty(AggregateId::new(id));
        execute(
            &mut push,
            &PushCommand::Create(CreatePush {
                name: id.into(),
                delivery_key: "shared".into(),
                tags: strings(&[tag]),
            }),
        )
        .unwrap();
        conn.create(&ns1, &push).await.unwrap();
    }

    let err = h
        .pushes
        .create_push(&admin(), &ns1, create("n1", "fresh", &["t3"]))
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::Internal);
    assert_eq!(h.db.row_count("pushes").unwrap(), 2);

    // Tag-only updates never look at delivery keys.
    let updated = h
        .pushes
        .update_push(
            &admin(),
            &ns1,
            UpdatePushRequest {
                id: "a".into(),
                commands: vec![PushCommand::AddTags(AddPushTags { tags: strings(&["t3"]) })],
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.tags(), strings(&["t1", "t3"]));
}

#[tokio::test]
async fn global_scope_holds_no_pushes() {
    let h = seeded().await;
    h.seed_account("ns1", "editor@example.com", Role::Editor).await;
    let global = TenantId::global();

    let err = h
        .pushes
        .create_push(&admin(), &global, create("n1", "k1", &["t1"]))
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::Validation(Violation::EnvironmentRequired));

    let err = h.pushes.delete_push(&admin(), &global, "p1").await.unwrap_err();
    assert_eq!(err, ServiceError::Validation(Violation::EnvironmentRequired));

    let err = h
        .pushes
        .create_push(&ctx("editor@example.com"), &global, create("n1", "k1", &["t1"]))
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::PermissionDenied);
    assert_eq!(h.db.row_count("pushes").unwrap(), 0);
}
