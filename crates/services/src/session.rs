use crate::{BoxFuture, ServiceError};

/// Resolves the signed-in user.
pub trait SessionProvider: Send + Sync {
    /// The current user id, `None` when nobody is signed in.
    fn current_user_id(&self) -> BoxFuture<'_, Result<Option<String>, ServiceError>>;
}

/// A session fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    user_id: Option<String>,
}

impl StaticSession {
    pub fn signed_in(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl SessionProvider for StaticSession {
    fn current_user_id(&self) -> BoxFuture<'_, Result<Option<String>, ServiceError>> {
        Box::pin(async move { Ok(self.user_id.clone()) })
    }
}
