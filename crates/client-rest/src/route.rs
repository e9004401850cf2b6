//! Route and bucket-key resolution
//!
//! A route pairs the concrete request path with the bucket key its rate
//! limit is tracked under. The key is the route template plus the major
//! parameter (guild or channel id): two requests to the same template on
//! different channels limit independently, while routes without a major
//! parameter collapse into one shared bucket.

use client_core::Snowflake;
use reqwest::Method;

/// A REST route with its rate-limit bucket key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    method: Method,
    path: String,
    bucket_key: String,
}

impl Route {
    fn new(method: Method, template: &str, major: Option<Snowflake>, path: String) -> Self {
        let bucket_key = match major {
            Some(id) => format!("{method} {template} {id}"),
            None => format!("{method} {template}"),
        };
        Self {
            method,
            path,
            bucket_key,
        }
    }

    /// HTTP method of this route
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Concrete request path, relative to the API base URL
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Rate-limit bucket key this route maps to
    #[must_use]
    pub fn bucket_key(&self) -> &str {
        &self.bucket_key
    }

    // === Route catalog ===

    /// `GET /gateway` - gateway URL discovery
    #[must_use]
    pub fn get_gateway() -> Self {
        Self::new(Method::GET, "/gateway", None, "/gateway".to_string())
    }

    /// `GET /gateway/bot` - recommended shard topology for this token
    #[must_use]
    pub fn get_gateway_bot() -> Self {
        Self::new(Method::GET, "/gateway/bot", None, "/gateway/bot".to_string())
    }

    /// `GET /channels/{id}`
    #[must_use]
    pub fn get_channel(channel_id: Snowflake) -> Self {
        Self::new(
            Method::GET,
            "/channels/{id}",
            Some(channel_id),
            format!("/channels/{channel_id}"),
        )
    }

    /// `POST /channels/{id}/messages`
    #[must_use]
    pub fn create_message(channel_id: Snowflake) -> Self {
        Self::new(
            Method::POST,
            "/channels/{id}/messages",
            Some(channel_id),
            format!("/channels/{channel_id}/messages"),
        )
    }

    /// `POST /channels/{id}/typing`
    #[must_use]
    pub fn trigger_typing(channel_id: Snowflake) -> Self {
        Self::new(
            Method::POST,
            "/channels/{id}/typing",
            Some(channel_id),
            format!("/channels/{channel_id}/typing"),
        )
    }

    /// `GET /guilds/{id}`
    #[must_use]
    pub fn get_guild(guild_id: Snowflake) -> Self {
        Self::new(
            Method::GET,
            "/guilds/{id}",
            Some(guild_id),
            format!("/guilds/{guild_id}"),
        )
    }

    /// `GET /users/{id}`
    ///
    /// User ids are not a major parameter; every user fetch shares one
    /// bucket.
    #[must_use]
    pub fn get_user(user_id: Snowflake) -> Self {
        Self::new(
            Method::GET,
            "/users/{id}",
            None,
            format!("/users/{user_id}"),
        )
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}
