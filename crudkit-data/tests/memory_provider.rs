use crudkit_data::prelude::*;
use crudkit_data::{record, MemoryProvider, Pagination};
use serde_json::json;

fn orders() -> MemoryProvider {
    let provider = MemoryProvider::new();
    provider.seed(
        "orders",
        vec![
            record! { "status": "open", "total": 120.5, "customer": "Ada" },
            record! { "status": "closed", "total": 80, "customer": "Grace" },
            record! { "status": "open", "total": 15, "customer": "Linus" },
            record! { "status": "open", "customer": "Barbara" },
            record! { "status": "cancelled", "total": 42, "customer": "Ken" },
        ],
    );
    provider
}

#[tokio::test]
async fn test_equality_filter_returns_only_matches() {
    let result = orders()
        .get_list(ListParams::new("orders").filter(Filter::new().eq("status", "open")))
        .await
        .unwrap();
    assert_eq!(result.total, 3);
    assert!(result
        .data
        .iter()
        .all(|r| r.get("status") == Some(&json!("open"))));
}

#[tokio::test]
async fn test_no_match_is_empty_page() {
    let result = orders()
        .get_list(ListParams::new("orders").filter(Filter::new().eq("status", "archived")))
        .await
        .unwrap();
    assert_eq!(result, ListResult::exact(vec![], 0));
}

#[tokio::test]
async fn test_filters_combine_with_and() {
    let filter = Filter::new()
        .eq("status", "open")
        .op("total", FilterOperator::Gte, 20);
    let result = orders()
        .get_list(ListParams::new("orders").filter(filter))
        .await
        .unwrap();
    let customers: Vec<_> = result.data.iter().map(|r| r["customer"].clone()).collect();
    assert_eq!(customers, vec![json!("Ada")]);
}

#[tokio::test]
async fn test_pages_cover_total_without_gaps() {
    let provider = orders();
    let per_page = 2;
    let first = provider
        .get_list(ListParams::new("orders").paginate(1, per_page))
        .await
        .unwrap();
    let pages = Pagination::new(1, per_page).total_pages(first.total);
    assert_eq!(pages, 3);

    let mut seen = Vec::new();
    for page in 1..=pages {
        let result = provider
            .get_list(
                ListParams::new("orders")
                    .sort_by("customer", SortOrder::Asc)
                    .paginate(page, per_page),
            )
            .await
            .unwrap();
        seen.extend(result.data.into_iter().filter_map(|r| r.id()));
    }
    seen.sort_by_key(|id| id.as_i64());
    seen.dedup();
    assert_eq!(seen.len() as u64, first.total);
}

#[tokio::test]
async fn test_page_past_the_end_is_empty_with_total() {
    let result = orders()
        .get_list(ListParams::new("orders").paginate(9, 10))
        .await
        .unwrap();
    assert!(result.data.is_empty());
    assert_eq!(result.total, 5);
}

#[tokio::test]
async fn test_huge_page_number_is_empty_not_a_panic() {
    for (page, per_page) in [(u64::MAX, 2), (u64::MAX / 2, u64::MAX), (2, u64::MAX)] {
        let result = orders()
            .get_list(ListParams::new("orders").paginate(page, per_page))
            .await
            .unwrap();
        assert!(result.data.is_empty(), "page {page} of {per_page}");
        assert_eq!(result.total, 5);
    }
}

#[tokio::test]
async fn test_page_zero_is_invalid() {
    let err = orders()
        .get_list(ListParams::new("orders").paginate(0, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::InvalidParams(_)));
}

#[tokio::test]
async fn test_delete_returns_prior_state() {
    let provider = orders();
    let before = provider.get_one(GetOneParams::new("orders", 2)).await.unwrap();
    let deleted = provider
        .delete_one(DeleteParams::new("orders", 2))
        .await
        .unwrap();
    assert_eq!(deleted.data, before.data);
    let err = provider
        .get_one(GetOneParams::new("orders", 2))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_caller_supplied_string_ids() {
    let provider = MemoryProvider::new();
    let created = provider
        .create(CreateParams::new("tags", record! { "id": "rust", "label": "Rust" }))
        .await
        .unwrap();
    assert_eq!(created.data.id(), Some(RecordId::from("rust")));
    let updated = provider
        .update(UpdateParams::new("tags", "rust", record! { "label": "Rust lang" }))
        .await
        .unwrap();
    assert_eq!(updated.data["label"], json!("Rust lang"));
}
