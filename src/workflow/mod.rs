//! Moderation workflows: records that wait for a decision by a higher-privileged
//! role and then either become authoritative or are discarded.
//!
//! Every state transition runs inside one `Repository::transaction`, so a
//! multi-collection move (pending user to user, submission to post, user deletion
//! plus its request) is committed as a unit.

pub mod accounts;
pub mod deletion;
pub mod registration;
pub mod submission;

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{PendingUser, User},
    repository::Transaction,
};

/// Emails are compared case-insensitively, usernames exactly.
pub(crate) fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

pub(crate) fn require(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Fails with `Conflict` if `username` or `email` belongs to a user other than
/// `except`.
pub(crate) fn ensure_user_identity_free(
    tx: &Transaction,
    username: &str,
    email: &str,
    except: Option<Uuid>,
) -> AppResult<()> {
    let clash = tx
        .list::<User>()?
        .into_iter()
        .filter(|user| Some(user.id) != except)
        .any(|user| user.username == username || same_email(&user.email, email));

    if clash {
        return Err(AppError::Conflict("User already exists".to_string()));
    }
    Ok(())
}

/// Same check against registrations awaiting approval.
pub(crate) fn ensure_pending_identity_free(
    tx: &Transaction,
    username: &str,
    email: &str,
    except: Option<Uuid>,
) -> AppResult<()> {
    let clash = tx
        .list::<PendingUser>()?
        .into_iter()
        .filter(|pending| Some(pending.id) != except)
        .any(|pending| pending.username == username || same_email(&pending.email, email));

    if clash {
        return Err(AppError::Conflict("A registration with this username or email is pending".to_string()));
    }
    Ok(())
}
