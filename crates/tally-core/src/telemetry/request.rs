//! Request context consumed from the HTTP layer

/// Sentinel recorded when a client identity or user agent is not supplied
pub const UNKNOWN: &str = "unknown";

/// Number of user-agent characters kept in tallies
pub const USER_AGENT_PREFIX_LEN: usize = 50;

/// What the transport layer knows about one inbound request
///
/// The engine never looks at headers itself; the HTTP layer fills this in
/// and passes it to the record operations.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// HTTP method token
    pub method: String,
    /// Logical endpoint name
    pub endpoint: String,
    /// Forwarded-for style header value, if present
    pub forwarded_for: Option<String>,
    /// Transport-level peer address, if known
    pub peer_addr: Option<String>,
    /// Raw user agent header, if present
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Create a context for a method/endpoint pair
    pub fn new(method: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the forwarded-for header value
    pub fn with_forwarded_for(mut self, value: impl Into<String>) -> Self {
        self.forwarded_for = Some(value.into());
        self
    }

    /// Set the peer address
    pub fn with_peer_addr(mut self, addr: impl Into<String>) -> Self {
        self.peer_addr = Some(addr.into());
        self
    }

    /// Set the user agent header value
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Client identity this request is attributed to
    ///
    /// Prefers the first forwarded-for entry, falls back to the peer
    /// address, and degrades to the `"unknown"` sentinel so tallies never
    /// need existence checks.
    pub fn client_identity(&self) -> String {
        if let Some(forwarded) = &self.forwarded_for {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
        match &self.peer_addr {
            Some(addr) if !addr.is_empty() => addr.clone(),
            _ => UNKNOWN.to_string(),
        }
    }

    /// User agent truncated to its first 50 characters
    pub fn user_agent_prefix(&self) -> String {
        match &self.user_agent {
            Some(agent) if !agent.is_empty() => {
                agent.chars().take(USER_AGENT_PREFIX_LEN).collect()
            }
            _ => UNKNOWN.to_string(),
        }
    }
}
