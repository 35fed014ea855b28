//! The user entity.

use serde::{Deserialize, Serialize};
use txscope_core::{TxContext, TxSlot};
use txscope_store::{Entity, EntityId, MemoryTransaction};

/// Name given to users created by [`crate::UserDao::create_user`].
pub const DEFAULT_USER_NAME: &str = "user5";

/// Call-chain context for user operations.
pub type UserContext = TxContext<MemoryTransaction>;

/// Resource argument slot of a user DAO body.
pub type UserSlot = TxSlot<MemoryTransaction>;

/// A stored user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Assigned on first save.
    #[serde(skip)]
    pub id: Option<EntityId>,
    /// Display name.
    pub name: String,
}

impl User {
    /// Creates an unsaved user.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

impl Entity for User {
    const KIND: &'static str = "user";

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }
}
