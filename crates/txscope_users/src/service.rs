//! User service composing DAO calls into single transactions.

use crate::dao::UserDao;
use crate::error::{UserError, UserResult};
use crate::user::{User, UserContext};
use std::sync::Arc;
use tracing::info;
use txscope_core::{Transactional, TxResult};
use txscope_store::MemoryDatabase;

/// Business operations over users.
///
/// Every method owns the transaction when called with an empty context; the
/// DAO calls inside it join.
#[derive(Debug, Clone)]
pub struct UserService {
    dao: UserDao,
    tx: Transactional<MemoryDatabase>,
}

impl UserService {
    /// Creates a service and its DAO over `db`.
    ///
    /// # Errors
    ///
    /// Propagates wrapper construction failures.
    pub fn new(db: Arc<MemoryDatabase>) -> TxResult<Self> {
        let dao = UserDao::new(Arc::clone(&db))?;
        let tx = Transactional::builder()
            .factory(db)
            .label("user_service")
            .build()?;
        Ok(Self { dao, tx })
    }

    /// Returns the DAO used by this service.
    #[must_use]
    pub fn dao(&self) -> &UserDao {
        &self.dao
    }

    /// Returns all users.
    ///
    /// # Errors
    ///
    /// Returns resource and decoding failures.
    pub async fn get_users(&self, cx: &UserContext) -> UserResult<Vec<User>> {
        let dao = &self.dao;
        self.tx
            .run(cx, |_, cx| async move { dao.get_users(&cx).await })
            .await
    }

    /// Creates a user, appends `!` to its name and saves it again, all in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns resource and encoding failures; nothing is committed then.
    pub async fn create_and_update_user(&self, cx: &UserContext) -> UserResult<User> {
        let dao = &self.dao;
        let user = self
            .tx
            .run(cx, |_, cx| async move {
                let mut user = dao.create_user(&cx).await?;
                user.name.push('!');
                dao.update_user(&cx, user).await
            })
            .await?;
        info!(user = ?user.id, name = %user.name, "created and updated user");
        Ok(user)
    }

    /// Creates a user and then fails, so the insert is rolled back.
    ///
    /// # Errors
    ///
    /// Always returns [`UserError::Unknown`] unless the insert itself fails.
    pub async fn create_user_and_throw(&self, cx: &UserContext) -> UserResult<()> {
        let dao = &self.dao;
        self.tx
            .run(cx, |_, cx| async move {
                dao.create_user(&cx).await?;
                Err(UserError::unknown("Unknown Error"))
            })
            .await
    }
}
