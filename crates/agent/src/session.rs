use chrono::{DateTime, Utc};
use roomwise_core::domain::user::UserId;

/// Caller identity as handed over by the upstream auth layer. `user` is `None`
/// for guests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionContext {
    pub user: Option<UserId>,
    pub correlation_id: String,
    pub now: DateTime<Utc>,
}

impl SessionContext {
    pub fn guest(correlation_id: impl Into<String>) -> Self {
        Self { user: None, correlation_id: correlation_id.into(), now: Utc::now() }
    }

    pub fn for_user(user: UserId, correlation_id: impl Into<String>) -> Self {
        Self { user: Some(user), correlation_id: correlation_id.into(), now: Utc::now() }
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn is_guest(&self) -> bool {
        self.user.is_none()
    }

    pub fn user_label(&self) -> &str {
        self.user.as_ref().map(|user| user.0.as_str()).unwrap_or("guest")
    }
}
