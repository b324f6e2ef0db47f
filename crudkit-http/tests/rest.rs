use crudkit_data::prelude::*;
use crudkit_data::{record, ResourceMap};
use crudkit_http::{Auth, HttpConfig, RestConfig, RestProvider, UpdateMethod};
use crudkit_test::{MockBackend, MockResponse};
use serde_json::json;

async fn backend() -> MockBackend {
    MockBackend::start().await.unwrap()
}

fn provider(backend: &MockBackend) -> RestProvider {
    RestProvider::new(RestConfig::new(backend.url())).unwrap()
}

#[tokio::test]
async fn test_list_sends_query_and_reads_total_header() {
    let backend = backend().await;
    backend.respond(
        "GET",
        "/posts",
        MockResponse::json(json!([{ "id": 11, "title": "a" }, { "id": 12, "title": "b" }]))
            .with_header("X-Total-Count", 42),
    );

    let page = provider(&backend)
        .get_list(
            ListParams::new("posts")
                .paginate(2, 10)
                .sort_by("title", SortOrder::Asc)
                .filter(Filter::new().eq("userId", 1).op("views", FilterOperator::Gt, 100)),
        )
        .await
        .unwrap();

    assert_eq!(page.total, 42);
    assert!(!page.total_estimated);
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.data[0].id(), Some(RecordId::Int(11)));

    let request = backend.last_request().unwrap();
    assert_eq!(request.query_param("_page").as_deref(), Some("2"));
    assert_eq!(request.query_param("_limit").as_deref(), Some("10"));
    assert_eq!(request.query_param("_sort").as_deref(), Some("title"));
    assert_eq!(request.query_param("_order").as_deref(), Some("asc"));
    assert_eq!(request.query_param("userId").as_deref(), Some("1"));
    assert_eq!(request.query_param("views_gt").as_deref(), Some("100"));
}

#[tokio::test]
async fn test_total_without_header_is_estimated_from_the_page() {
    let backend = backend().await;
    backend
        .respond("GET", "/posts", MockResponse::json(json!([{ "id": 5 }, { "id": 6 }])))
        .respond("GET", "/posts", MockResponse::json(json!([{ "id": 7 }])));

    let rest = provider(&backend);
    // A full page leaves room for at least another one.
    let full = rest.get_list(ListParams::new("posts").paginate(3, 2)).await.unwrap();
    assert_eq!((full.total, full.total_estimated), (8, true));
    assert!(full.total > 3 * 2, "a full page must not look like the last one");

    let short = rest.get_list(ListParams::new("posts").paginate(4, 2)).await.unwrap();
    assert_eq!((short.total, short.total_estimated), (7, true));

    let whole = rest.get_list(ListParams::new("posts")).await.unwrap();
    assert_eq!((whole.total, whole.total_estimated), (1, false));
}

#[tokio::test]
async fn test_enveloped_body_total() {
    let backend = backend().await;
    backend.respond(
        "GET",
        "/posts",
        MockResponse::json(json!({ "data": [{ "id": 1 }], "total": 7 })),
    );
    let page = provider(&backend)
        .get_list(ListParams::new("posts").paginate(1, 1))
        .await
        .unwrap();
    assert_eq!(page.total, 7);
    assert_eq!(page.data.len(), 1);
}

#[tokio::test]
async fn test_empty_in_list_skips_the_request() {
    let backend = backend().await;
    let page = provider(&backend)
        .get_list(ListParams::new("posts").filter(Filter::new().op("id", FilterOperator::In, json!([]))))
        .await
        .unwrap();
    assert!(page.data.is_empty());
    assert_eq!(page.total, 0);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_get_one_missing_is_not_found() {
    let backend = backend().await;
    let err = provider(&backend)
        .get_one(GetOneParams::new("posts", 99))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_server_error_is_retryable_backend_error() {
    let backend = backend().await;
    backend.respond(
        "GET",
        "/posts",
        MockResponse::json(json!({ "error": { "message": "database unavailable" } })).with_status(503),
    );
    let err = provider(&backend).get_list(ListParams::new("posts")).await.unwrap_err();
    assert!(err.is_retryable());
    match err {
        DataError::Backend(backend) => {
            assert_eq!(backend.provider, "rest");
            assert_eq!(backend.status, Some(503));
            assert_eq!(backend.message, "database unavailable");
        }
        other => panic!("expected a backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_error_is_not_retryable() {
    let backend = backend().await;
    backend.respond(
        "POST",
        "/posts",
        MockResponse::json(json!({ "message": "title is required" })).with_status(422),
    );
    let err = provider(&backend)
        .create(CreateParams::new("posts", record! { "body": "x" }))
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
    assert!(matches!(err, DataError::Backend(ref e) if e.status == Some(422)));
}

#[tokio::test]
async fn test_auth_and_static_headers_are_sent() {
    let backend = backend().await;
    backend.respond("GET", "/posts/1", MockResponse::json(json!({ "id": 1 })));
    let http = HttpConfig::new(backend.url())
        .with_auth(Auth::bearer("s3cret"))
        .with_header("X-Tenant", "acme");
    let rest = RestProvider::new(RestConfig::new(backend.url()).with_http(http)).unwrap();

    rest.get_one(GetOneParams::new("posts", 1)).await.unwrap();

    let request = backend.last_request().unwrap();
    assert_eq!(request.header("authorization"), Some("Bearer s3cret"));
    assert_eq!(request.header("x-tenant"), Some("acme"));
}

#[tokio::test]
async fn test_create_posts_the_record() {
    let backend = backend().await;
    backend.respond(
        "POST",
        "/posts",
        MockResponse::json(json!({ "id": 101, "title": "hello" })).with_status(201),
    );
    let created = provider(&backend)
        .create(CreateParams::new("posts", record! { "title": "hello" }))
        .await
        .unwrap();
    assert_eq!(created.data.id(), Some(RecordId::Int(101)));
    assert_eq!(backend.last_request().unwrap().body, Some(json!({ "title": "hello" })));
}

#[tokio::test]
async fn test_records_without_id_are_rejected() {
    let backend = backend().await;
    backend
        .respond("POST", "/posts", MockResponse::json(json!({ "title": "hello" })).with_status(201))
        .respond("GET", "/posts", MockResponse::json(json!([{ "id": 1 }, { "title": "orphan" }])));
    let rest = provider(&backend);

    let err = rest
        .create(CreateParams::new("posts", record! { "title": "hello" }))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Backend(_)), "{err:?}");
    assert!(err.to_string().contains("response has no id"), "{err}");

    let err = rest.get_list(ListParams::new("posts")).await.unwrap_err();
    assert!(matches!(err, DataError::Backend(_)), "{err:?}");
}

#[tokio::test]
async fn test_create_keeps_the_caller_id_when_the_response_omits_it() {
    let backend = backend().await;
    backend.respond("POST", "/posts", MockResponse::json(json!({ "title": "hello" })).with_status(201));
    let created = provider(&backend)
        .create(CreateParams::new("posts", record! { "id": "p-1", "title": "hello" }))
        .await
        .unwrap();
    assert_eq!(created.data.id(), Some(RecordId::from("p-1")));
}

#[tokio::test]
async fn test_put_update_sends_the_merged_snapshot() {
    let backend = backend().await;
    backend.respond(
        "PUT",
        "/posts/5",
        MockResponse::json(json!({ "id": 5, "title": "new", "body": "kept" })),
    );
    let rest = RestProvider::new(RestConfig::new(backend.url()).with_update_method(UpdateMethod::Put)).unwrap();

    let updated = rest
        .update(
            UpdateParams::new("posts", 5, record! { "title": "new" })
                .previous(record! { "id": 5, "title": "old", "body": "kept" }),
        )
        .await
        .unwrap();

    assert_eq!(updated.data.get("title"), Some(&json!("new")));
    assert_eq!(
        backend.last_request().unwrap().body,
        Some(json!({ "id": 5, "title": "new", "body": "kept" }))
    );
}

#[tokio::test]
async fn test_delete_reads_then_deletes() {
    let backend = backend().await;
    backend
        .respond("GET", "/posts/3", MockResponse::json(json!({ "id": 3, "title": "bye" })))
        .respond("DELETE", "/posts/3", MockResponse::json(json!({})));

    let deleted = provider(&backend)
        .delete_one(DeleteParams::new("posts", 3))
        .await
        .unwrap();

    assert_eq!(deleted.data.get("title"), Some(&json!("bye")));
    let methods: Vec<String> = backend.requests().iter().map(|r| r.method.to_string()).collect();
    assert_eq!(methods, vec!["GET", "DELETE"]);
}

#[tokio::test]
async fn test_delete_of_missing_record_never_deletes() {
    let backend = backend().await;
    let err = provider(&backend)
        .delete_one(DeleteParams::new("posts", 3))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn test_resource_mapping_changes_the_path() {
    let backend = backend().await;
    backend.respond("GET", "/crm/contacts/7", MockResponse::json(json!({ "id": 7 })));
    let http = HttpConfig::new(backend.url()).with_resources(ResourceMap::new().map("customers", "crm/contacts"));
    let rest = RestProvider::new(RestConfig::new(backend.url()).with_http(http)).unwrap();

    let found = rest.get_one(GetOneParams::new("customers", 7)).await.unwrap();
    assert_eq!(found.data.id(), Some(RecordId::Int(7)));
}
