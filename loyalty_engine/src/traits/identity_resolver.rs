use log::*;
use thiserror::Error;

use crate::db_types::CustomerId;

/// Looks up whether a registered customer owns a phone number.
///
/// Implementations typically call out to an external identity provider, so calls may be slow and can fail. A failure
/// is never interpreted as "not registered".
#[allow(async_fn_in_trait)]
pub trait IdentityResolver {
    /// Returns the customer id of the registered owner of `phone`, or `None` if nobody has registered it.
    async fn user_exists_by_phone(&self, phone: &str) -> Result<Option<CustomerId>, IdentityResolverError>;
}

#[derive(Debug, Clone, Error)]
pub enum IdentityResolverError {
    #[error("The identity provider could not be reached. {0}")]
    Unavailable(String),
    #[error("The identity provider returned an unexpected response. {0}")]
    UnexpectedResponse(String),
    #[error("The identity provider returned an invalid customer id: {0}")]
    InvalidCustomerId(String),
}

/// An identity resolver that knows no customers. Every purchase takes the shadow path.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnregisteredIdentityResolver;

impl IdentityResolver for UnregisteredIdentityResolver {
    async fn user_exists_by_phone(&self, _phone: &str) -> Result<Option<CustomerId>, IdentityResolverError> {
        trace!("🪪️ Identity lookups are disabled. Treating customer as unregistered.");
        Ok(None)
    }
}
