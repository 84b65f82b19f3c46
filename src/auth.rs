use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::identity::{canonical_identifier, IdentityIndex};
use crate::models::{Role, Session};

pub fn authenticate<S: AsRef<str>>(
    config: &AuthConfig,
    index: &IdentityIndex,
    titles: &[S],
    account: &str,
    password: &str,
) -> Result<Session, AuthError> {
    let account = account.trim();
    if account.is_empty() || password.is_empty() {
        return Err(AuthError::EmptyFields);
    }

    if password != config.shared_password {
        warn!(account, "login rejected: bad password");
        return Err(AuthError::InvalidCredentials);
    }

    if account == config.admin_account {
        info!(account, "admin logged in");
        return Ok(new_session(account, "admin", Role::Admin));
    }

    let Some(local) = account.strip_suffix(config.account_domain.as_str()) else {
        return Err(AuthError::MalformedAccount {
            domain: config.account_domain.clone(),
        });
    };

    let local = local.trim().to_lowercase();
    let identifier = canonical_identifier(&local, titles);
    if identifier.is_empty() || !index.contains(&identifier) {
        warn!(account, identifier = %local, "login rejected: unknown teacher");
        return Err(AuthError::UnknownTeacher(local));
    }

    info!(account, identifier = %identifier, "teacher logged in");
    Ok(new_session(account, &identifier, Role::Teacher))
}

fn new_session(account: &str, identifier: &str, role: Role) -> Session {
    Session {
        id: Uuid::new_v4(),
        logged_in: true,
        account: account.to_string(),
        identifier: identifier.to_string(),
        role,
    }
}
