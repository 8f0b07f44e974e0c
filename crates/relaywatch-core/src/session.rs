//! The authenticated session and role-based affordances.
//!
//! Front ends use a [`Session`] to decide which controls to offer. The
//! monitoring engine itself never consults it.

use tracing::info;

use relaywatch_types::{Role, User};

use crate::error::Result;
use crate::traits::TelemetryApi;

/// The account a front end is acting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: User,
}

impl Session {
    /// Fetch the current account. Fails with
    /// [`Error::Unauthenticated`](crate::Error::Unauthenticated) if there is none.
    pub async fn establish<A: TelemetryApi + ?Sized>(api: &A) -> Result<Self> {
        let user = api.current_user().await?;
        info!("Signed in as {} ({})", user.email, user.role);
        Ok(Self { user })
    }

    pub fn from_user(user: User) -> Self {
        Self { user }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    /// Full name, falling back to the email address.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.user.first_name, self.user.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.user.email.clone()
        } else {
            name.to_string()
        }
    }

    /// Whether data from every company is visible.
    pub fn can_view_all_companies(&self) -> bool {
        self.user.role == Role::Superuser
    }

    /// Whether user administration is offered.
    pub fn can_manage_users(&self) -> bool {
        matches!(self.user.role, Role::Superuser | Role::Manager)
    }

    /// Whether relay and mode commands are offered.
    pub fn can_issue_commands(&self) -> bool {
        true
    }
}
