//! Per-model request handling shared by the HTML pages and the JSON API.
//!
//! Every operation follows the same pipeline: take the table lock, ensure the
//! store exists, ask the gate, and only then touch the records. The lock is
//! held until the write completes, so the gate's ownership answer and the
//! read-modify-write form one serialized step per table.

use crate::access::{AccessGate, Decision, Requester};
use crate::model::{ModelDefinition, Operation};
use crate::record::{Input, Record};
use crate::store::{RecordStore, TableLock};
use crate::AppError;
use std::sync::Arc;

pub mod api;
pub mod html;

/// State of one materialized model router.
#[derive(Clone)]
pub struct ModelContext {
    pub model: Arc<ModelDefinition>,
    pub store: Arc<dyn RecordStore>,
}

impl ModelContext {
    pub fn new(model: Arc<ModelDefinition>, store: Arc<dyn RecordStore>) -> Self {
        Self { model, store }
    }

    fn table(&self) -> &str {
        &self.model.table_name
    }

    async fn admit(&self, op: Operation, requester: &Requester, target: Option<&str>) -> Result<TableLock, AppError> {
        let lock = self.store.lock(self.table()).await;
        self.store.ensure(self.table()).await?;
        match AccessGate::new(self.store.as_ref()).authorize(&self.model, op, requester, target).await? {
            Decision::Allow => Ok(lock),
            Decision::Deny(reason) => {
                tracing::debug!(model = %self.model.name, %op, role = %requester.role, reason = reason.code(), "access denied");
                Err(AppError::denied(reason))
            }
        }
    }

    /// Checks the role layer only; used by pages that render a blank form.
    pub async fn permit(&self, op: Operation, requester: &Requester) -> Result<(), AppError> {
        self.admit(op, requester, None).await.map(drop)
    }

    pub async fn list(&self, requester: &Requester) -> Result<Vec<Record>, AppError> {
        let _lock = self.admit(Operation::Read, requester, None).await?;
        Ok(self.store.read_all(self.table()).await?)
    }

    /// Loads one record after authorizing `op` against it.
    pub async fn find(&self, op: Operation, requester: &Requester, id: &str) -> Result<Record, AppError> {
        let _lock = self.admit(op, requester, Some(id)).await?;
        self.store
            .read_all(self.table())
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound("Record not found".to_string()))
    }

    pub async fn create(&self, requester: &Requester, input: &Input) -> Result<Record, AppError> {
        let _lock = self.admit(Operation::Create, requester, None).await?;
        let record = Record::create(&self.model, input, requester)?;
        let mut records = self.store.read_all(self.table()).await?;
        records.push(record.clone());
        self.store.write_all(self.table(), &records).await?;
        Ok(record)
    }

    pub async fn update(&self, requester: &Requester, id: &str, input: &Input) -> Result<Record, AppError> {
        let _lock = self.admit(Operation::Update, requester, Some(id)).await?;
        let mut records = self.store.read_all(self.table()).await?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound("Record not found".to_string()))?;
        record.update(&self.model, input)?;
        let updated = record.clone();
        self.store.write_all(self.table(), &records).await?;
        Ok(updated)
    }

    /// Returns whether a record was removed; a missing id is still a success.
    pub async fn delete(&self, requester: &Requester, id: &str) -> Result<bool, AppError> {
        let _lock = self.admit(Operation::Delete, requester, Some(id)).await?;
        let mut records = self.store.read_all(self.table()).await?;
        let before = records.len();
        records.retain(|r| r.id != id);
        self.store.write_all(self.table(), &records).await?;
        Ok(records.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::DenyReason;
    use crate::field::{FieldDescriptor, FieldKind};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn context() -> ModelContext {
        let model = ModelDefinition::new(
            "Note",
            vec![FieldDescriptor::new("body", FieldKind::String), FieldDescriptor::new("pinned", FieldKind::Boolean).with_default(json!(false))],
        )
        .with_owner_field("ownerId");
        ModelContext::new(Arc::new(model), Arc::new(MemoryStore::default()))
    }

    fn input(value: serde_json::Value) -> Input {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_then_find_round_trips() {
        let ctx = context();
        let mike = Requester::new("u2", "Manager");
        let created = ctx.create(&mike, &input(json!({"body": "hi", "pinned": "on"}))).await.unwrap();
        let found = ctx.find(Operation::Read, &mike, &created.id).await.unwrap();
        assert_eq!(found, created);
        assert_eq!(found.get("pinned"), Some(&json!(true)));
        assert_eq!(found.get("ownerId"), Some(&json!("u2")));
    }

    #[tokio::test]
    async fn delete_of_missing_id_leaves_store_unchanged() {
        let ctx = context();
        let alice = Requester::new("u1", "Admin");
        ctx.create(&alice, &input(json!({"body": "keep"}))).await.unwrap();
        assert!(!ctx.delete(&alice, "missing").await.unwrap());
        assert_eq!(ctx.list(&alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn denied_mutations_have_no_side_effect() {
        let ctx = context();
        let alice = Requester::new("u1", "Admin");
        let mike = Requester::new("u2", "Manager");
        let victor = Requester::new("u3", "Viewer");
        let note = ctx.create(&alice, &input(json!({"body": "mine"}))).await.unwrap();

        let err = ctx.update(&mike, &note.id, &input(json!({"body": "stolen"}))).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(DenyReason::NotOwner)));
        let err = ctx.create(&victor, &Input::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(DenyReason::RbacDenied)));

        let records = ctx.list(&victor).await.unwrap();
        assert_eq!(records, vec![note]);
    }

    #[tokio::test]
    async fn update_of_missing_id_is_not_found() {
        let ctx = context();
        let alice = Requester::new("u1", "Admin");
        let err = ctx.update(&alice, "ghost", &Input::new()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_creates_are_not_lost() {
        let ctx = context();
        let alice = Requester::new("u1", "Admin");
        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let ctx = ctx.clone();
                let alice = alice.clone();
                tokio::spawn(async move { ctx.create(&alice, &input(json!({"body": format!("n{}", i)}))).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(ctx.list(&alice).await.unwrap().len(), 16);
    }
}
