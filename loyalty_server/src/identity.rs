//! Identity resolvers used by the server.
//!
//! [`HttpIdentityResolver`] asks the auth provider's admin API whether a phone number belongs to a registered user.
//! [`ServerIdentity`] picks between it and the engine's [`UnregisteredIdentityResolver`] based on configuration.
use std::time::Duration;

use log::*;
use loyalty_engine::{db_types::CustomerId, IdentityResolver, IdentityResolverError, UnregisteredIdentityResolver};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    StatusCode,
};
use serde::Deserialize;

use crate::{config::IdentityConfig, errors::ServerError};

#[derive(Clone)]
pub struct HttpIdentityResolver {
    base_url: String,
    client: Client,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl HttpIdentityResolver {
    pub fn new(config: &IdentityConfig, timeout: Duration) -> Result<Self, ServerError> {
        let key = config.service_key.reveal();
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(key)
            .map_err(|e| ServerError::ConfigurationError(format!("Invalid identity service key. {e}")))?;
        api_key.set_sensitive(true);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| ServerError::ConfigurationError(format!("Invalid identity service key. {e}")))?;
        bearer.set_sensitive(true);
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::InitializeError(format!("Could not create the identity client. {e}")))?;
        let base_url = config.url.trim_end_matches('/').to_string();
        Ok(Self { base_url, client })
    }

    pub fn users_url(&self) -> String {
        format!("{}/auth/v1/admin/users", self.base_url)
    }
}

impl IdentityResolver for HttpIdentityResolver {
    async fn user_exists_by_phone(&self, phone: &str) -> Result<Option<CustomerId>, IdentityResolverError> {
        let filter = format!("eq.{phone}");
        trace!("🪪️ Looking up customer registration with the identity provider");
        let response = self
            .client
            .get(self.users_url())
            .query(&[("phone", filter.as_str())])
            .send()
            .await
            // The request url contains the phone number
            .map_err(|e| IdentityResolverError::Unavailable(e.without_url().to_string()))?;
        let status = response.status();
        if status != StatusCode::OK {
            warn!("🪪️ Identity provider responded with status {status}");
            return Err(if status.is_server_error() {
                IdentityResolverError::Unavailable(format!("The identity provider responded with {status}"))
            } else {
                IdentityResolverError::UnexpectedResponse(format!("The identity provider responded with {status}"))
            });
        }
        let users = response
            .json::<Vec<IdentityUser>>()
            .await
            .map_err(|e| IdentityResolverError::UnexpectedResponse(e.without_url().to_string()))?;
        customer_from_users(users)
    }
}

/// The first matching user owns the phone number. An empty list means nobody has registered it.
pub fn customer_from_users(users: Vec<IdentityUser>) -> Result<Option<CustomerId>, IdentityResolverError> {
    match users.into_iter().next() {
        None => {
            debug!("🪪️ No registered customer owns this phone number");
            Ok(None)
        },
        Some(user) if user.id.trim().is_empty() => {
            Err(IdentityResolverError::InvalidCustomerId("the user record has no id".to_string()))
        },
        Some(user) => {
            debug!("🪪️ Phone number belongs to registered customer {}", user.id);
            Ok(Some(CustomerId::from(user.id)))
        },
    }
}

/// The identity resolver the server runs with, chosen once at startup.
#[derive(Clone)]
pub enum ServerIdentity {
    Http(HttpIdentityResolver),
    Unregistered(UnregisteredIdentityResolver),
}

impl ServerIdentity {
    pub fn from_config(config: &IdentityConfig, timeout: Duration) -> Result<Self, ServerError> {
        if config.use_mock {
            info!("🪪️ Identity lookups are disabled. All purchases will earn into shadow balances.");
            return Ok(Self::Unregistered(UnregisteredIdentityResolver));
        }
        let resolver = HttpIdentityResolver::new(config, timeout)?;
        info!("🪪️ Resolving customer identities against {}", resolver.base_url);
        Ok(Self::Http(resolver))
    }
}

impl IdentityResolver for ServerIdentity {
    async fn user_exists_by_phone(&self, phone: &str) -> Result<Option<CustomerId>, IdentityResolverError> {
        match self {
            Self::Http(resolver) => resolver.user_exists_by_phone(phone).await,
            Self::Unregistered(resolver) => resolver.user_exists_by_phone(phone).await,
        }
    }
}
