//! Launch environment supplied with the initial page request.

use url::Url;

/// User agent reported when the launcher does not supply one.
pub const DEFAULT_USER_AGENT: &str = concat!("kiosk/", env!("CARGO_PKG_VERSION"));

/// What the device knows about itself before talking to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchEnv {
    /// Durable hostname baked into the device image, if any
    pub hostname: Option<String>,
    pub user_agent: String,
}

impl Default for LaunchEnv {
    fn default() -> Self {
        Self {
            hostname: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl LaunchEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hostname. Blank values count as absent.
    pub fn with_hostname(mut self, hostname: Option<String>) -> Self {
        self.hostname = hostname
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Read the `hostname` query parameter of the URL the device was launched with.
    pub fn from_launch_url(launch_url: &str) -> crate::Result<Self> {
        let url = Url::parse(launch_url)?;
        let hostname = url
            .query_pairs()
            .find(|(key, _)| key == "hostname")
            .map(|(_, value)| value.into_owned());
        Ok(Self::new().with_hostname(hostname))
    }
}
