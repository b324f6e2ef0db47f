//! Behavioural checks every `CrudProvider` must pass.
//!
//! The checks assume the provider starts with an empty `resource` and that no
//! one else writes to it while they run. They panic with a descriptive
//! message on the first violation, so they read like ordinary assertions
//! inside a `#[tokio::test]`.

use std::collections::HashSet;

use crudkit_data::{
    CreateParams, CrudProvider, DeleteParams, GetOneParams, ListParams, Record, RecordId,
};

/// Run every check against `provider` using `samples` as input records.
///
/// `samples` must hold at least three records without `id` whose fields the
/// backend stores as given.
pub async fn run_contract_suite(provider: &dyn CrudProvider, resource: &str, samples: &[Record]) {
    assert!(samples.len() >= 3, "the contract suite needs at least three samples");
    let ids = check_round_trip(provider, resource, samples).await;
    check_pagination(provider, resource, 2).await;
    check_delete_returns_prior(provider, resource, &ids[0]).await;
    check_empty_filter_result(provider, resource).await;
}

/// `create` then `get_one` yields a superset of the input fields.
pub async fn check_round_trip(
    provider: &dyn CrudProvider,
    resource: &str,
    samples: &[Record],
) -> Vec<RecordId> {
    let mut ids = Vec::with_capacity(samples.len());
    for sample in samples {
        let created = provider
            .create(CreateParams::new(resource, sample.clone()))
            .await
            .unwrap_or_else(|e| panic!("[{}] create failed: {e}", provider.name()));
        let id = created
            .data
            .id()
            .unwrap_or_else(|| panic!("[{}] created record has no id: {:?}", provider.name(), created.data));

        let fetched = provider
            .get_one(GetOneParams::new(resource, id.clone()))
            .await
            .unwrap_or_else(|e| panic!("[{}] get_one({id}) after create failed: {e}", provider.name()));
        assert!(
            fetched.data.contains_all(sample),
            "[{}] round trip lost fields: sent {sample:?}, got {:?}",
            provider.name(),
            fetched.data
        );
        assert_eq!(fetched.data.id().as_ref(), Some(&id), "[{}] id changed", provider.name());
        ids.push(id);
    }
    ids
}

/// Consecutive pages of `per_page` cover exactly `total` distinct records.
pub async fn check_pagination(provider: &dyn CrudProvider, resource: &str, per_page: u64) {
    let first = provider
        .get_list(ListParams::new(resource).paginate(1, per_page))
        .await
        .unwrap_or_else(|e| panic!("[{}] get_list failed: {e}", provider.name()));
    let total = first.total;
    assert!(
        total >= first.data.len() as u64,
        "[{}] total {total} below page length {}",
        provider.name(),
        first.data.len()
    );

    let pages = total.div_ceil(per_page);
    let mut seen = HashSet::new();
    let mut count = 0u64;
    for page in 1..=pages {
        let result = provider
            .get_list(ListParams::new(resource).paginate(page, per_page))
            .await
            .unwrap_or_else(|e| panic!("[{}] get_list page {page} failed: {e}", provider.name()));
        assert!(
            result.data.len() as u64 <= per_page,
            "[{}] page {page} holds more than {per_page} rows",
            provider.name()
        );
        for record in result.data {
            let id = record
                .id()
                .unwrap_or_else(|| panic!("[{}] listed record has no id", provider.name()));
            assert!(seen.insert(id.clone()), "[{}] record {id} listed twice", provider.name());
            count += 1;
        }
    }
    assert_eq!(count, total, "[{}] pages do not add up to total", provider.name());
}

/// `delete_one` returns the prior state, and the record is gone afterwards.
pub async fn check_delete_returns_prior(provider: &dyn CrudProvider, resource: &str, id: &RecordId) {
    let before = provider
        .get_one(GetOneParams::new(resource, id.clone()))
        .await
        .unwrap_or_else(|e| panic!("[{}] get_one({id}) failed: {e}", provider.name()));
    let deleted = provider
        .delete_one(DeleteParams::new(resource, id.clone()))
        .await
        .unwrap_or_else(|e| panic!("[{}] delete_one({id}) failed: {e}", provider.name()));
    assert_eq!(deleted.data, before.data, "[{}] delete did not return the prior state", provider.name());

    let err = provider
        .get_one(GetOneParams::new(resource, id.clone()))
        .await
        .expect_err("deleted record is still readable");
    assert!(
        err.is_not_found(),
        "[{}] expected NotFound after delete, got {err}",
        provider.name()
    );
}

/// A filter matching nothing is an empty page, not an error.
pub async fn check_empty_filter_result(provider: &dyn CrudProvider, resource: &str) {
    let filter = crudkit_data::Filter::new().eq("id", "no-such-record-id");
    let result = provider
        .get_list(ListParams::new(resource).filter(filter))
        .await
        .unwrap_or_else(|e| panic!("[{}] filtered get_list failed: {e}", provider.name()));
    assert!(result.data.is_empty(), "[{}] unexpected match", provider.name());
    assert_eq!(result.total, 0);
}
