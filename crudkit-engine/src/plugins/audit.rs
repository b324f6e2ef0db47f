//! Audit trail of successful operations.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

use crudkit_data::{Meta, Operation, Record, RecordId};

use crate::hooks::Hooks;
use crate::plugin::Plugin;

pub const AUDIT_PLUGIN: &str = "audit";

/// Log level used for audit entries emitted through `tracing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// One audited operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub operation: Operation,
    pub resource: String,
    pub id: Option<RecordId>,
    /// `meta.user` of the call, when present.
    pub actor: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Created fields, changed fields (`{field: {from, to}}` when the previous
    /// state is known) or the deleted record.
    pub changes: Option<Value>,
}

/// Destination of audit entries.
pub trait AuditSink: Send + Sync + 'static {
    fn record(&self, entry: &AuditEntry);
}

/// Sink that only emits through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, _entry: &AuditEntry) {}
}

/// Sink keeping entries in memory for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: &AuditEntry) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry.clone());
    }
}

/// Records every successful mutation, and optionally reads.
pub struct AuditPlugin {
    sink: Arc<dyn AuditSink>,
    level: LogLevel,
    include_reads: bool,
}

impl AuditPlugin {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            level: LogLevel::Info,
            include_reads: false,
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn include_reads(mut self, include: bool) -> Self {
        self.include_reads = include;
        self
    }
}

impl Default for AuditPlugin {
    fn default() -> Self {
        Self::new(Arc::new(TracingAuditSink))
    }
}

#[derive(Clone)]
struct Emitter {
    sink: Arc<dyn AuditSink>,
    level: LogLevel,
}

impl Emitter {
    fn emit(
        &self,
        operation: Operation,
        resource: &str,
        id: Option<RecordId>,
        meta: &Meta,
        changes: Option<Value>,
    ) {
        let entry = AuditEntry {
            operation,
            resource: resource.to_string(),
            id,
            actor: meta.get("user").and_then(|v| v.as_str()).map(str::to_string),
            timestamp: Utc::now(),
            changes,
        };
        log_entry(self.level, &entry);
        self.sink.record(&entry);
    }
}

fn log_entry(level: LogLevel, entry: &AuditEntry) {
    let id = entry.id.as_ref().map(ToString::to_string).unwrap_or_default();
    let actor = entry.actor.as_deref().unwrap_or("-");
    let operation = entry.operation.as_str();
    let resource = entry.resource.as_str();
    match level {
        LogLevel::Trace => tracing::trace!(target: "crudkit::audit", operation, resource, %id, actor, "audit"),
        LogLevel::Debug => tracing::debug!(target: "crudkit::audit", operation, resource, %id, actor, "audit"),
        LogLevel::Info => tracing::info!(target: "crudkit::audit", operation, resource, %id, actor, "audit"),
        LogLevel::Warn => tracing::warn!(target: "crudkit::audit", operation, resource, %id, actor, "audit"),
        LogLevel::Error => tracing::error!(target: "crudkit::audit", operation, resource, %id, actor, "audit"),
    }
}

/// Field-level diff of `after` against `before`, restricted to `touched` keys.
fn diff(before: &Record, after: &Record, touched: &Record) -> Value {
    let mut changes = Map::new();
    for key in touched.keys() {
        let old = before.get(key).cloned().unwrap_or(Value::Null);
        let new = after.get(key).cloned().unwrap_or(Value::Null);
        if old != new {
            changes.insert(key.clone(), serde_json::json!({ "from": old, "to": new }));
        }
    }
    Value::Object(changes)
}

impl Plugin for AuditPlugin {
    fn name(&self) -> &str {
        AUDIT_PLUGIN
    }

    fn hooks(&self) -> Hooks {
        let emitter = Emitter {
            sink: self.sink.clone(),
            level: self.level,
        };
        let (on_create, on_update, on_delete) = (emitter.clone(), emitter.clone(), emitter.clone());

        let mut hooks = Hooks::new()
            .after_create(move |result, params| {
                on_create.emit(
                    Operation::Create,
                    &params.resource,
                    result.data.id(),
                    &params.meta,
                    Some(result.data.clone().into_value()),
                );
                Ok(result)
            })
            .after_update(move |result, params| {
                let changes = match &params.previous_data {
                    Some(previous) => diff(previous, &result.data, &params.data),
                    None => params.data.clone().into_value(),
                };
                on_update.emit(
                    Operation::Update,
                    &params.resource,
                    Some(params.id.clone()),
                    &params.meta,
                    Some(changes),
                );
                Ok(result)
            })
            .after_delete(move |result, params| {
                on_delete.emit(
                    Operation::Delete,
                    &params.resource,
                    Some(params.id.clone()),
                    &params.meta,
                    Some(result.data.clone().into_value()),
                );
                Ok(result)
            });

        if self.include_reads {
            let (on_list, on_one) = (emitter.clone(), emitter);
            hooks = hooks
                .after_get_list(move |result, params| {
                    on_list.emit(Operation::GetList, &params.resource, None, &params.meta, None);
                    Ok(result)
                })
                .after_get_one(move |result, params| {
                    on_one.emit(
                        Operation::GetOne,
                        &params.resource,
                        Some(params.id.clone()),
                        &params.meta,
                        None,
                    );
                    Ok(result)
                });
        }
        hooks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crudkit_data::record;
    use serde_json::json;

    #[test]
    fn diff_reports_only_changed_touched_fields() {
        let before = record! { "id": 1, "status": "open", "qty": 2 };
        let after = record! { "id": 1, "status": "closed", "qty": 2 };
        let touched = record! { "status": "closed", "qty": 2 };
        assert_eq!(
            diff(&before, &after, &touched),
            json!({ "status": { "from": "open", "to": "closed" } })
        );
    }

    #[test]
    fn memory_sink_collects_entries() {
        let sink = MemoryAuditSink::new();
        let emitter = Emitter {
            sink: Arc::new(sink.clone()),
            level: LogLevel::Debug,
        };
        let mut meta = Meta::new();
        meta.insert("user".into(), json!("alice"));
        emitter.emit(Operation::Delete, "orders", Some(RecordId::Int(3)), &meta, None);

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor.as_deref(), Some("alice"));
        assert_eq!(entries[0].id, Some(RecordId::Int(3)));
    }
}
