use crudkit_data::prelude::*;
use crudkit_data::record;
use crudkit_http::{Auth, HttpConfig, StrapiConfig, StrapiProvider};
use crudkit_test::{MockBackend, MockResponse};
use serde_json::json;

async fn setup() -> (MockBackend, StrapiProvider) {
    let backend = MockBackend::start().await.unwrap();
    let http = HttpConfig::new(backend.url()).with_auth(Auth::api_key("Authorization", "Bearer cms-token"));
    let provider = StrapiProvider::new(StrapiConfig::new(backend.url()).with_http(http)).unwrap();
    (backend, provider)
}

#[tokio::test]
async fn test_list_flattens_entries_and_reads_meta_total() {
    let (backend, strapi) = setup().await;
    backend.respond(
        "GET",
        "/api/articles",
        MockResponse::json(json!({
            "data": [
                { "id": 1, "attributes": { "title": "Hello", "views": 10 } },
                { "id": 2, "attributes": { "title": "World", "views": 20 } }
            ],
            "meta": { "pagination": { "page": 1, "pageSize": 2, "pageCount": 3, "total": 5 } }
        })),
    );

    let page = strapi
        .get_list(
            ListParams::new("articles")
                .paginate(1, 2)
                .sort_by("views", SortOrder::Desc)
                .filter(Filter::new().op("title", FilterOperator::Contains, "o")),
        )
        .await
        .unwrap();

    assert_eq!(page.total, 5);
    assert_eq!(page.data[0], record! { "id": 1, "title": "Hello", "views": 10 });

    let request = backend.last_request().unwrap();
    assert_eq!(request.header("authorization"), Some("Bearer cms-token"));
    assert_eq!(request.query_param("pagination[page]").as_deref(), Some("1"));
    assert_eq!(request.query_param("pagination[pageSize]").as_deref(), Some("2"));
    assert_eq!(request.query_param("sort[0]").as_deref(), Some("views:desc"));
    assert_eq!(request.query_param("filters[title][$containsi]").as_deref(), Some("o"));
}

#[tokio::test]
async fn test_unpaginated_list_uses_default_page_size() {
    let (backend, strapi) = setup().await;
    backend.respond("GET", "/api/articles", MockResponse::json(json!({ "data": [] })));

    let page = strapi.get_list(ListParams::new("articles")).await.unwrap();

    assert!(page.data.is_empty());
    assert!(page.total_estimated);
    let request = backend.last_request().unwrap();
    assert_eq!(request.query_param("pagination[pageSize]").as_deref(), Some("25"));
}

#[tokio::test]
async fn test_flat_v5_entries_pass_through() {
    let (backend, strapi) = setup().await;
    backend.respond(
        "GET",
        "/api/articles/abc",
        MockResponse::json(json!({ "data": { "id": 4, "documentId": "abc", "title": "Flat" } })),
    );
    let found = strapi.get_one(GetOneParams::new("articles", "abc")).await.unwrap();
    assert_eq!(found.data.get("title"), Some(&json!("Flat")));
}

#[tokio::test]
async fn test_null_data_is_not_found() {
    let (backend, strapi) = setup().await;
    backend.respond("GET", "/api/articles/9", MockResponse::json(json!({ "data": null })));
    let err = strapi.get_one(GetOneParams::new("articles", 9)).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_create_wraps_the_body() {
    let (backend, strapi) = setup().await;
    backend.respond(
        "POST",
        "/api/articles",
        MockResponse::json(json!({ "data": { "id": 7, "attributes": { "title": "New" } } })),
    );

    let created = strapi
        .create(CreateParams::new("articles", record! { "id": 99, "title": "New" }))
        .await
        .unwrap();

    assert_eq!(created.data, record! { "id": 7, "title": "New" });
    assert_eq!(
        backend.last_request().unwrap().body,
        Some(json!({ "data": { "title": "New" } }))
    );
}

#[tokio::test]
async fn test_update_uses_put() {
    let (backend, strapi) = setup().await;
    backend.respond(
        "PUT",
        "/api/articles/7",
        MockResponse::json(json!({ "data": { "id": 7, "attributes": { "title": "Edited" } } })),
    );
    let updated = strapi
        .update(UpdateParams::new("articles", 7, record! { "title": "Edited" }))
        .await
        .unwrap();
    assert_eq!(updated.data.get("title"), Some(&json!("Edited")));
}

#[tokio::test]
async fn test_delete_returns_prior_entry() {
    let (backend, strapi) = setup().await;
    backend
        .respond(
            "GET",
            "/api/articles/7",
            MockResponse::json(json!({ "data": { "id": 7, "attributes": { "title": "Gone" } } })),
        )
        .respond("DELETE", "/api/articles/7", MockResponse::json(json!({ "data": null })));

    let deleted = strapi.delete_one(DeleteParams::new("articles", 7)).await.unwrap();

    assert_eq!(deleted.data, record! { "id": 7, "title": "Gone" });
    assert_eq!(backend.requests().len(), 2);
}

#[tokio::test]
async fn test_forbidden_maps_to_backend_error() {
    let (backend, strapi) = setup().await;
    backend.respond(
        "GET",
        "/api/articles",
        MockResponse::json(json!({ "data": null, "error": { "status": 403, "message": "Forbidden" } }))
            .with_status(403),
    );
    let err = strapi.get_list(ListParams::new("articles")).await.unwrap_err();
    match err {
        DataError::Backend(e) => {
            assert_eq!(e.status, Some(403));
            assert_eq!(e.message, "Forbidden");
        }
        other => panic!("expected a backend error, got {other:?}"),
    }
}
