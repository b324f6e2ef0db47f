use std::sync::{Arc, Mutex};

use crudkit_data::{
    CreateParams, DataError, DeleteParams, GetOneParams, ListParams, ListResult, Operation,
    OperationParams, RecordResult, UpdateParams,
};
use crudkit_engine::{Hooks, Plugin};

/// One observed hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookCall {
    pub plugin: String,
    pub operation: Operation,
    /// `"before"` or `"after"`.
    pub stage: &'static str,
}

impl HookCall {
    /// Compact `plugin:stage:operation` label, handy in assertions.
    pub fn label(&self) -> String {
        format!("{}:{}:{}", self.plugin, self.stage, self.operation)
    }
}

/// Plugin recording every hook invocation into a shared journal.
///
/// Several recorders can share one journal to observe relative ordering:
///
/// ```
/// use crudkit_test::RecordingPlugin;
///
/// let first = RecordingPlugin::new("p1");
/// let second = RecordingPlugin::sharing("p2", &first);
/// assert!(first.calls().is_empty() && second.calls().is_empty());
/// ```
#[derive(Clone)]
pub struct RecordingPlugin {
    name: String,
    journal: Arc<Mutex<Vec<HookCall>>>,
}

impl RecordingPlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            journal: Arc::default(),
        }
    }

    /// A recorder writing to the same journal as `other`.
    pub fn sharing(name: impl Into<String>, other: &RecordingPlugin) -> Self {
        Self {
            name: name.into(),
            journal: other.journal.clone(),
        }
    }

    pub fn calls(&self) -> Vec<HookCall> {
        self.journal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls().iter().map(HookCall::label).collect()
    }

    fn recorder(&self, stage: &'static str) -> impl Fn(Operation) + Send + Sync + Clone + 'static {
        let plugin = self.name.clone();
        let journal = self.journal.clone();
        move |operation| {
            journal
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(HookCall {
                    plugin: plugin.clone(),
                    operation,
                    stage,
                });
        }
    }
}

fn before<P: OperationParams + 'static>(
    record: impl Fn(Operation) + Send + Sync + 'static,
) -> impl Fn(P) -> Result<P, DataError> + Send + Sync + 'static {
    move |params: P| {
        record(P::OPERATION);
        Ok(params)
    }
}

fn after<P: OperationParams + 'static, R: 'static>(
    record: impl Fn(Operation) + Send + Sync + 'static,
) -> impl Fn(R, &P) -> Result<R, DataError> + Send + Sync + 'static {
    move |result: R, _params: &P| {
        record(P::OPERATION);
        Ok(result)
    }
}

impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn hooks(&self) -> Hooks {
        let b = self.recorder("before");
        let a = self.recorder("after");
        Hooks::new()
            .before_get_list(before::<ListParams>(b.clone()))
            .after_get_list(after::<ListParams, ListResult>(a.clone()))
            .before_get_one(before::<GetOneParams>(b.clone()))
            .after_get_one(after::<GetOneParams, RecordResult>(a.clone()))
            .before_create(before::<CreateParams>(b.clone()))
            .after_create(after::<CreateParams, RecordResult>(a.clone()))
            .before_update(before::<UpdateParams>(b.clone()))
            .after_update(after::<UpdateParams, RecordResult>(a.clone()))
            .before_delete(before::<DeleteParams>(b))
            .after_delete(after::<DeleteParams, RecordResult>(a))
    }
}
