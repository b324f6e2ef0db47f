//! Per-operation hook stages and their sequential composition.
//!
//! A [`Hooks`] value holds, for each operation, an optional `before` stage
//! rewriting the params and an optional `after` stage rewriting the result.
//! The engine folds the stages of every plugin in registration order: each
//! `before` sees the previous plugin's output params, each `after` sees the
//! previous plugin's output result together with the caller's original params.

use std::sync::Arc;

use crudkit_data::{
    CreateParams, DataError, DeleteParams, GetOneParams, ListParams, ListResult, RecordResult,
    UpdateParams,
};

pub type BeforeFn<P> = Arc<dyn Fn(P) -> Result<P, DataError> + Send + Sync>;
pub type AfterFn<R, P> = Arc<dyn Fn(R, &P) -> Result<R, DataError> + Send + Sync>;

/// The optional `before`/`after` pair for one operation.
pub struct OperationHooks<P, R> {
    pub(crate) before: Option<BeforeFn<P>>,
    pub(crate) after: Option<AfterFn<R, P>>,
}

impl<P, R> Default for OperationHooks<P, R> {
    fn default() -> Self {
        Self {
            before: None,
            after: None,
        }
    }
}

impl<P, R> Clone for OperationHooks<P, R> {
    fn clone(&self) -> Self {
        Self {
            before: self.before.clone(),
            after: self.after.clone(),
        }
    }
}

impl<P, R> OperationHooks<P, R> {
    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }
}

macro_rules! hook_setters {
    ($field:ident, $before:ident, $after:ident, $params:ty, $result:ty) => {
        pub fn $before<F>(mut self, f: F) -> Self
        where
            F: Fn($params) -> Result<$params, DataError> + Send + Sync + 'static,
        {
            self.$field.before = Some(Arc::new(f));
            self
        }

        pub fn $after<F>(mut self, f: F) -> Self
        where
            F: Fn($result, &$params) -> Result<$result, DataError> + Send + Sync + 'static,
        {
            self.$field.after = Some(Arc::new(f));
            self
        }
    };
}

/// Hook stages contributed by one plugin.
///
/// ```
/// use crudkit_engine::Hooks;
///
/// let hooks = Hooks::new()
///     .before_create(|mut params| {
///         params.data.insert("source".into(), "api".into());
///         Ok(params)
///     })
///     .after_get_list(|mut result, _params| {
///         result.data.retain(|r| r.get("hidden").is_none());
///         Ok(result)
///     });
/// assert!(!hooks.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct Hooks {
    pub(crate) get_list: OperationHooks<ListParams, ListResult>,
    pub(crate) get_one: OperationHooks<GetOneParams, RecordResult>,
    pub(crate) create: OperationHooks<CreateParams, RecordResult>,
    pub(crate) update: OperationHooks<UpdateParams, RecordResult>,
    pub(crate) delete: OperationHooks<DeleteParams, RecordResult>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    hook_setters!(get_list, before_get_list, after_get_list, ListParams, ListResult);
    hook_setters!(get_one, before_get_one, after_get_one, GetOneParams, RecordResult);
    hook_setters!(create, before_create, after_create, CreateParams, RecordResult);
    hook_setters!(update, before_update, after_update, UpdateParams, RecordResult);
    hook_setters!(delete, before_delete, after_delete, DeleteParams, RecordResult);

    pub fn is_empty(&self) -> bool {
        self.get_list.is_empty()
            && self.get_one.is_empty()
            && self.create.is_empty()
            && self.update.is_empty()
            && self.delete.is_empty()
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let present = |h: bool| if h { "set" } else { "-" };
        f.debug_struct("Hooks")
            .field("before_get_list", &present(self.get_list.before.is_some()))
            .field("after_get_list", &present(self.get_list.after.is_some()))
            .field("before_get_one", &present(self.get_one.before.is_some()))
            .field("after_get_one", &present(self.get_one.after.is_some()))
            .field("before_create", &present(self.create.before.is_some()))
            .field("after_create", &present(self.create.after.is_some()))
            .field("before_update", &present(self.update.before.is_some()))
            .field("after_update", &present(self.update.after.is_some()))
            .field("before_delete", &present(self.delete.before.is_some()))
            .field("after_delete", &present(self.delete.after.is_some()))
            .finish()
    }
}

/// One plugin's stages for one operation.
pub(crate) struct Stage<P, R> {
    plugin: Arc<str>,
    hooks: OperationHooks<P, R>,
}

/// The ordered stages of every plugin for one operation.
pub(crate) struct Pipeline<P, R> {
    stages: Vec<Stage<P, R>>,
}

impl<P, R> Default for Pipeline<P, R> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<P, R> Pipeline<P, R> {
    pub(crate) fn push(&mut self, plugin: Arc<str>, hooks: OperationHooks<P, R>) {
        if !hooks.is_empty() {
            self.stages.push(Stage { plugin, hooks });
        }
    }

    pub(crate) fn run_before(&self, params: P) -> Result<P, DataError> {
        self.stages.iter().try_fold(params, |params, stage| match &stage.hooks.before {
            Some(before) => {
                tracing::trace!(plugin = %stage.plugin, "before hook");
                before(params)
            }
            None => Ok(params),
        })
    }

    pub(crate) fn run_after(&self, result: R, params: &P) -> Result<R, DataError> {
        self.stages.iter().try_fold(result, |result, stage| match &stage.hooks.after {
            Some(after) => {
                tracing::trace!(plugin = %stage.plugin, "after hook");
                after(result, params)
            }
            None => Ok(result),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.stages.len()
    }
}

/// The five pipelines of an engine.
#[derive(Default)]
pub(crate) struct Pipelines {
    pub(crate) get_list: Pipeline<ListParams, ListResult>,
    pub(crate) get_one: Pipeline<GetOneParams, RecordResult>,
    pub(crate) create: Pipeline<CreateParams, RecordResult>,
    pub(crate) update: Pipeline<UpdateParams, RecordResult>,
    pub(crate) delete: Pipeline<DeleteParams, RecordResult>,
}

impl Pipelines {
    pub(crate) fn register(&mut self, plugin: &str, hooks: Hooks) {
        let plugin: Arc<str> = Arc::from(plugin);
        self.get_list.push(plugin.clone(), hooks.get_list);
        self.get_one.push(plugin.clone(), hooks.get_one);
        self.create.push(plugin.clone(), hooks.create);
        self.update.push(plugin.clone(), hooks.update);
        self.delete.push(plugin, hooks.delete);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crudkit_data::{Record, RecordId};
    use serde_json::json;

    fn tagging(tag: &'static str) -> Hooks {
        Hooks::new()
            .before_get_one(move |mut p| {
                let trail = p.meta.entry("trail").or_insert_with(|| json!([]));
                if let Some(items) = trail.as_array_mut() {
                    items.push(json!(tag));
                }
                Ok(p)
            })
            .after_get_one(move |mut r, _| {
                let name = r.data.get("name").and_then(|v| v.as_str()).unwrap_or("");
                let name = format!("{name}{tag}");
                r.data.insert("name".into(), name.into());
                Ok(r)
            })
    }

    #[test]
    fn stages_chain_in_registration_order() {
        let mut pipelines = Pipelines::default();
        pipelines.register("p1", tagging("1"));
        pipelines.register("p2", tagging("2"));

        let params = pipelines
            .get_one
            .run_before(GetOneParams::new("items", 1))
            .unwrap();
        assert_eq!(params.meta.get("trail"), Some(&json!(["1", "2"])));

        let result = pipelines
            .get_one
            .run_after(RecordResult::new(Record::new().with("name", "x")), &params)
            .unwrap();
        assert_eq!(result.data.get("name"), Some(&json!("x12")));
    }

    #[test]
    fn failing_stage_stops_the_fold() {
        let mut pipelines = Pipelines::default();
        pipelines.register(
            "deny",
            Hooks::new().before_delete(|_| Err(DataError::InvalidParams("nope".into()))),
        );
        pipelines.register(
            "unreachable",
            Hooks::new().before_delete(|_| panic!("must not run")),
        );
        let err = pipelines
            .delete
            .run_before(DeleteParams::new("items", RecordId::Int(1)))
            .unwrap_err();
        assert!(matches!(err, DataError::InvalidParams(_)));
    }

    #[test]
    fn empty_hooks_add_no_stage() {
        let mut pipelines = Pipelines::default();
        pipelines.register("noop", Hooks::new());
        pipelines.register("list-only", Hooks::new().after_get_list(|r, _| Ok(r)));
        assert_eq!(pipelines.get_list.len(), 1);
        assert_eq!(pipelines.create.len(), 0);
    }
}
