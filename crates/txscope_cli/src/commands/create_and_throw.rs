//! Create-and-throw command implementation.

use super::{CommandResult, Report, Session};
use tracing::warn;
use txscope_users::{UserContext, UserError};

/// Runs the failing flow and lists users afterwards.
///
/// The flow's own failure is part of the report, not a command error.
pub async fn run(session: &Session) -> CommandResult<Report> {
    let error = match session
        .service
        .create_user_and_throw(&UserContext::new())
        .await
    {
        Ok(()) => None,
        Err(err @ UserError::Unknown(_)) => {
            warn!(error = %err, "flow failed; transaction rolled back");
            Some(err.to_string())
        }
        Err(err) => return Err(err.into()),
    };
    session.report(error).await
}
