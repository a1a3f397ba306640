//! Seam to the external authorization policy.

use serde::{Deserialize, Serialize};

use crate::{
    error::{CoreError, CoreResult},
    model::Person,
    types::Status,
};

/// Guarded action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Create, rename, delete, fill or clear courts and move players.
    EditCourt,
    /// Edit one's own person record.
    EditSelf,
    /// Edit someone else's person record.
    EditOthers,
}

/// Grants or denies actions by the actor's status.
pub trait Authorizer: Send {
    /// Returns true when `status` may perform `action`.
    fn allows(&self, status: Status, action: Action) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(Status, Action) -> bool + Send,
{
    fn allows(&self, status: Status, action: Action) -> bool {
        self(status, action)
    }
}

/// Grants everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn allows(&self, _status: Status, _action: Action) -> bool {
        true
    }
}

/// Fails with `Forbidden` unless `authorizer` grants `action` to `actor`.
pub fn require(authorizer: &dyn Authorizer, actor: &Person, action: Action) -> CoreResult<()> {
    if authorizer.allows(actor.status, action) {
        return Ok(());
    }
    Err(CoreError::Forbidden(format!(
        "person [{}] with status {} may not {action:?}",
        actor.id, actor.status
    )))
}
