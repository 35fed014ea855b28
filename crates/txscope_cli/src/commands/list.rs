//! List command implementation.

use super::{CommandResult, Report, Session};
use tracing::info;
use txscope_users::UserContext;

/// Creates `seed` users, each in its own transaction, then lists all users.
pub async fn run(session: &Session, seed: usize) -> CommandResult<Report> {
    for _ in 0..seed {
        session.service.dao().create_user(&UserContext::new()).await?;
    }
    if seed > 0 {
        info!(seed, "seeded users");
    }
    session.report(None).await
}
