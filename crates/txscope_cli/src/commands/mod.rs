//! CLI command implementations.

pub mod create_and_throw;
pub mod create_and_update;
pub mod list;

use serde::Serialize;
use std::sync::Arc;
use txscope_store::{MemoryDatabase, StatsSnapshot, StoreConfig};
use txscope_users::{User, UserContext, UserService};

/// Boxed error returned by every command.
pub type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

/// A store and the service over it, alive for one CLI invocation.
pub struct Session {
    /// The store.
    pub db: MemoryDatabase,
    /// The user service.
    pub service: UserService,
}

impl Session {
    /// Opens a fresh, empty store.
    pub fn open(slow_io: bool) -> CommandResult<Self> {
        let db = MemoryDatabase::with_config(StoreConfig::new().yield_on_io(slow_io));
        let service = UserService::new(Arc::new(db.clone()))?;
        Ok(Self { db, service })
    }

    /// Lists users in a transaction of their own and builds the report.
    pub async fn report(&self, error: Option<String>) -> CommandResult<Report> {
        let users = self.service.get_users(&UserContext::new()).await?;
        Ok(Report {
            users: users.iter().map(UserView::from).collect(),
            error,
            stats: self.db.stats(),
        })
    }
}

/// A user as printed.
#[derive(Debug, Serialize)]
pub struct UserView {
    /// Entity ID, if assigned.
    pub id: Option<String>,
    /// Name.
    pub name: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.map(|id| id.to_string()),
            name: user.name.clone(),
        }
    }
}

/// Command output.
#[derive(Debug, Serialize)]
pub struct Report {
    /// Users visible after the command.
    pub users: Vec<UserView>,
    /// Error reported by the flow, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Lifecycle counters, including the final listing.
    pub stats: StatsSnapshot,
}

impl Report {
    /// Prints the report as text.
    pub fn print_text(&self) {
        if let Some(error) = &self.error {
            println!("Flow failed: {}", error);
        }

        println!("Users ({}):", self.users.len());
        for user in &self.users {
            println!(
                "  {}  {}",
                user.id.as_deref().unwrap_or("<unsaved>"),
                user.name
            );
        }

        let stats = &self.stats;
        println!("Transactions:");
        println!("  Resources created: {}", stats.resources_created);
        println!("  Commits: {}", stats.commits);
        println!("  Rollbacks: {}", stats.rollbacks);
        println!("  Releases: {}", stats.releases);
        println!("  Saves: {}", stats.saves);
        println!("  Loads: {}", stats.loads);
    }
}
