//! The authenticated identity handed to downstream handlers.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Identity resolved from a verified access token or a usable refresh token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Principal {
    pub user_id: Uuid,
}

impl Principal {
    #[must_use]
    pub const fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}
