//! Authentication headers for the store API

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Authentication methods supported by the store
#[derive(Debug, Clone, Default)]
pub enum AuthMethod {
    /// Project API key (`apikey: <key>` plus `Authorization: Bearer <key>`)
    ApiKey(String),
    /// API key plus a user JWT that replaces the bearer token
    KeyAndBearer { api_key: String, jwt: String },
    /// No authentication
    #[default]
    None,
}

impl AuthMethod {
    /// Apply authentication headers to a request
    pub fn apply_to_headers(
        &self,
        headers: &mut HeaderMap,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (api_key, bearer) = match self {
            AuthMethod::ApiKey(key) => (key, key),
            AuthMethod::KeyAndBearer { api_key, jwt } => (api_key, jwt),
            AuthMethod::None => return Ok(()),
        };

        headers.insert(HeaderName::from_static("apikey"), HeaderValue::from_str(api_key)?);
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&format!("Bearer {}", bearer))?,
        );
        Ok(())
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey(key.into())
    }
}

/// Authentication configuration for the client
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Database schema to address, when not the default one
    pub schema: Option<String>,
}

impl AuthConfig {
    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            method: AuthMethod::api_key(key),
            schema: None,
        }
    }

    /// Send `jwt` as the bearer token instead of the API key
    pub fn with_bearer(mut self, jwt: impl Into<String>) -> Self {
        let jwt = jwt.into();
        self.method = match self.method {
            AuthMethod::ApiKey(api_key) | AuthMethod::KeyAndBearer { api_key, .. } => {
                AuthMethod::KeyAndBearer { api_key, jwt }
            }
            AuthMethod::None => AuthMethod::None,
        };
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Get headers for this authentication configuration
    pub fn headers(&self) -> Result<HeaderMap, Box<dyn std::error::Error + Send + Sync>> {
        let mut headers = HeaderMap::new();
        self.method.apply_to_headers(&mut headers)?;

        if let Some(schema) = &self.schema {
            let value = HeaderValue::from_str(schema)?;
            headers.insert(HeaderName::from_static("accept-profile"), value.clone());
            headers.insert(HeaderName::from_static("content-profile"), value);
        }

        Ok(headers)
    }

    /// Header pairs for clients that do not take a `HeaderMap`
    pub fn header_pairs(&self) -> Result<Vec<(String, String)>, Box<dyn std::error::Error + Send + Sync>> {
        let headers = self.headers()?;
        let mut pairs = Vec::with_capacity(headers.len());
        for (name, value) in headers.iter() {
            pairs.push((name.as_str().to_string(), value.to_str()?.to_string()));
        }
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_headers() {
        let headers = AuthConfig::with_api_key("anon-key").headers().unwrap();

        assert_eq!(headers.get("apikey").unwrap(), "anon-key");
        assert_eq!(headers.get("authorization").unwrap(), "Bearer anon-key");
    }

    #[test]
    fn test_bearer_overrides_authorization_only() {
        let headers = AuthConfig::with_api_key("anon-key").with_bearer("jwt-token").headers().unwrap();

        assert_eq!(headers.get("apikey").unwrap(), "anon-key");
        assert_eq!(headers.get("authorization").unwrap(), "Bearer jwt-token");
    }

    #[test]
    fn test_schema_profile_headers() {
        let config = AuthConfig::with_api_key("anon-key").with_schema("park_ops");
        let headers = config.headers().unwrap();

        assert_eq!(headers.get("accept-profile").unwrap(), "park_ops");
        assert_eq!(headers.get("content-profile").unwrap(), "park_ops");
    }

    #[test]
    fn test_no_auth_headers() {
        assert!(AuthConfig::default().headers().unwrap().is_empty());
    }
}
