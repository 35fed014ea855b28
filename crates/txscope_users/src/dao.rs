//! User data-access object.

use crate::error::UserResult;
use crate::user::{User, UserContext, UserSlot, DEFAULT_USER_NAME};
use std::sync::Arc;
use tracing::debug;
use txscope_core::{Args, MethodId, ParameterMarks, Transactional, TxResult};
use txscope_store::{Criteria, Entity, MemoryDatabase, Record};

/// [`UserDao::get_users`]; resource at position 0.
pub const GET_USERS: MethodId = MethodId::new("UserDao::get_users");
/// [`UserDao::create_user`]; resource at position 0.
pub const CREATE_USER: MethodId = MethodId::new("UserDao::create_user");
/// [`UserDao::update_user`]; resource at position 1, after the user.
pub const UPDATE_USER: MethodId = MethodId::new("UserDao::update_user");

/// Transactional user queries.
///
/// Each public method joins the caller's transaction if there is one and
/// otherwise runs in its own. The method bodies (`load_users`,
/// `insert_user`, `store_user`) take the resource as an explicit slot and fail
/// with [`txscope_core::TxError::PlaceholderResource`] when called directly
/// with the placeholder.
#[derive(Debug, Clone)]
pub struct UserDao {
    tx: Transactional<MemoryDatabase>,
}

impl UserDao {
    /// Creates a DAO over `db`, registering its parameter marks.
    ///
    /// # Errors
    ///
    /// Propagates wrapper construction failures.
    pub fn new(db: Arc<MemoryDatabase>) -> TxResult<Self> {
        let marks = ParameterMarks::new()
            .with_mark(GET_USERS, 0)
            .with_mark(CREATE_USER, 0)
            .with_mark(UPDATE_USER, 1);
        let tx = Transactional::builder()
            .factory(db)
            .marks(Arc::new(marks))
            .label("user_dao")
            .build()?;
        Ok(Self { tx })
    }

    /// Returns all users in insertion order.
    ///
    /// # Errors
    ///
    /// Returns resource and decoding failures.
    pub async fn get_users(&self, cx: &UserContext) -> UserResult<Vec<User>> {
        let args = Args::new().placeholder();
        self.tx
            .invoke(cx, GET_USERS, args, |args, _| async move {
                Self::load_users(args.slot(0)?.clone()).await
            })
            .await
    }

    /// Inserts a user named [`DEFAULT_USER_NAME`] and returns it with its ID.
    ///
    /// # Errors
    ///
    /// Returns resource and encoding failures.
    pub async fn create_user(&self, cx: &UserContext) -> UserResult<User> {
        let args = Args::new().placeholder();
        self.tx
            .invoke(cx, CREATE_USER, args, |args, _| async move {
                Self::insert_user(args.slot(0)?.clone()).await
            })
            .await
    }

    /// Saves `user` over its stored version.
    ///
    /// # Errors
    ///
    /// Returns resource and encoding failures.
    pub async fn update_user(&self, cx: &UserContext, user: User) -> UserResult<User> {
        let args = Args::new().value(user).placeholder();
        self.tx
            .invoke(cx, UPDATE_USER, args, |mut args, _| async move {
                let user: User = args.take(0)?;
                Self::store_user(user, args.slot(1)?.clone()).await
            })
            .await
    }

    /// Body of [`UserDao::get_users`].
    ///
    /// # Errors
    ///
    /// Fails with `PlaceholderResource` if `slot` holds no resource.
    pub async fn load_users(slot: UserSlot) -> UserResult<Vec<User>> {
        let handle = slot.into_handle()?;
        let records = handle.load(User::KIND, &Criteria::All).await?;
        debug!(transaction = %handle.id(), count = records.len(), "loaded users");
        let users = records
            .iter()
            .map(Record::decode)
            .collect::<Result<Vec<User>, _>>()?;
        Ok(users)
    }

    /// Body of [`UserDao::create_user`].
    ///
    /// # Errors
    ///
    /// Fails with `PlaceholderResource` if `slot` holds no resource.
    pub async fn insert_user(slot: UserSlot) -> UserResult<User> {
        Self::store_user(User::new(DEFAULT_USER_NAME), slot).await
    }

    /// Body of [`UserDao::update_user`].
    ///
    /// # Errors
    ///
    /// Fails with `PlaceholderResource` if `slot` holds no resource.
    pub async fn store_user(user: User, slot: UserSlot) -> UserResult<User> {
        let handle = slot.into_handle()?;
        let saved = handle.save(Record::from_entity(&user)?).await?;
        debug!(transaction = %handle.id(), user = ?saved.id(), "saved user");
        Ok(saved.decode()?)
    }
}
