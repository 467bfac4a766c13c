//! The single authorization decision point for every model operation.
//!
//! Decisions are two-layered: the role's permission set is consulted first,
//! and only when it allows a mutating single-record operation on a model with
//! an owner field is the target record loaded and its owner compared.

use crate::model::{ModelDefinition, Operation, ADMIN_ROLE};
use crate::record::Record;
use crate::store::{RecordStore, StoreResult};
use std::fmt;

/// An already-resolved actor; how it was authenticated is not this module's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: String,
    pub role: String,
}

impl Requester {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self { id: id.into(), role: role.into() }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    RbacDenied,
    NotFound,
    NotOwner,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::RbacDenied => "rbac_denied",
            DenyReason::NotFound => "not_found",
            DenyReason::NotOwner => "not_owner",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::RbacDenied => write!(f, "RBAC denies this operation"),
            DenyReason::NotFound => write!(f, "record not found"),
            DenyReason::NotOwner => write!(f, "not owner"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

/// Role layer: the role's permissions contain the operation or `all`.
pub fn rbac_allows(model: &ModelDefinition, op: Operation, role: &str) -> bool {
    model
        .permissions_of(role)
        .is_some_and(|perms| perms.iter().any(|p| p.grants(op)))
}

/// Ownership layer, evaluated against an already loaded target.
pub fn check_ownership(model: &ModelDefinition, requester: &Requester, target: Option<&Record>) -> Decision {
    let Some(owner_field) = &model.owner_field else {
        return Decision::Allow;
    };
    if requester.is_admin() {
        return Decision::Allow;
    }
    match target {
        None => Decision::Deny(DenyReason::NotFound),
        Some(record) if record.is_owned_by(owner_field, &requester.id) => Decision::Allow,
        Some(_) => Decision::Deny(DenyReason::NotOwner),
    }
}

pub struct AccessGate<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> AccessGate<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// Callers mutating the table must already hold its lock so the
    /// ownership answer stays valid until the write.
    pub async fn authorize(
        &self,
        model: &ModelDefinition,
        op: Operation,
        requester: &Requester,
        target_id: Option<&str>,
    ) -> StoreResult<Decision> {
        if !rbac_allows(model, op, &requester.role) {
            return Ok(Decision::Deny(DenyReason::RbacDenied));
        }
        if !op.is_mutating_single() || model.owner_field.is_none() || requester.is_admin() {
            return Ok(Decision::Allow);
        }
        let Some(target_id) = target_id else {
            return Ok(Decision::Deny(DenyReason::NotFound));
        };
        let records = self.store.read_all(&model.table_name).await?;
        let target = records.iter().find(|r| r.id == target_id);
        Ok(check_ownership(model, requester, target))
    }
}
