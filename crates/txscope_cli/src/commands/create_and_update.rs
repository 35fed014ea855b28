//! Create-and-update command implementation.

use super::{CommandResult, Report, Session};
use txscope_users::UserContext;

/// Runs the create-and-update flow `times` times, then lists all users.
pub async fn run(session: &Session, times: usize) -> CommandResult<Report> {
    for _ in 0..times {
        session
            .service
            .create_and_update_user(&UserContext::new())
            .await?;
    }
    session.report(None).await
}
