//! Connection URI parsing.
//!
//! `stomp://[user[:pass]@]host[:port][/virtualhost]` is turned into
//! [`ConnectionParameters`]: the validated, immutable input of the CONNECT
//! handshake. Every rejection happens here, before any network I/O.

use crate::error::ConnectionError;
use crate::frame::{names, Headers};
use percent_encoding::percent_decode_str;
use std::time::Duration;
use url::Url;

/// URI scheme accepted by the connector
pub const SCHEME: &str = "stomp";

/// Port used when the URI does not name one
pub const DEFAULT_PORT: u16 = 61613;

/// Protocol versions offered in the CONNECT frame
pub const ACCEPTED_VERSIONS: &str = "1.1,1.2";

/// Heart-beat interval offered for both directions
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// A parsed connection URI
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionUri {
    host: String,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    virtual_host: Option<String>,
}

impl ConnectionUri {
    /// Parse and validate a connection URI
    ///
    /// Checks run in a fixed order: empty input, syntax, scheme, and finally
    /// credential completeness.
    pub fn parse(uri: &str) -> Result<Self, ConnectionError> {
        if uri.is_empty() {
            return Err(ConnectionError::MissingUri);
        }

        let url = Url::parse(uri).map_err(|e| ConnectionError::UriParse(e.to_string()))?;

        if url.scheme() != SCHEME {
            return Err(ConnectionError::InvalidScheme(url.scheme().to_string()));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConnectionError::UriParse("missing host".to_string()))?
            .to_string();

        let username = Some(decode(url.username())).filter(|u| !u.is_empty());
        let password = url
            .password()
            .map(decode)
            .or_else(|| has_password_separator(uri).then(String::new));
        if username.is_some() && password.is_none() {
            return Err(ConnectionError::CredentialsIncomplete);
        }

        let virtual_host = url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map(decode)
            .filter(|segment| !segment.is_empty());

        Ok(Self {
            host,
            port: url.port(),
            username,
            password,
            virtual_host,
        })
    }

    /// Host name or address
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port, with the default applied
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Whether the URI named a port explicitly
    pub fn has_explicit_port(&self) -> bool {
        self.port.is_some()
    }

    /// First path segment, if any
    pub fn virtual_host(&self) -> Option<&str> {
        self.virtual_host.as_deref()
    }

    /// Login and passcode, when credentials were supplied
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            (None, Some(pass)) => Some(("", pass.as_str())),
            _ => None,
        }
    }

    /// Display form with the password masked, safe for logs
    pub fn redacted(&self) -> String {
        let auth = match &self.username {
            Some(user) => format!("{user}:***@"),
            None if self.password.is_some() => ":***@".to_string(),
            None => String::new(),
        };
        let vhost = self
            .virtual_host
            .as_deref()
            .map(|v| format!("/{v}"))
            .unwrap_or_default();
        format!("{SCHEME}://{auth}{}:{}{vhost}", self.host, self.port())
    }
}

impl std::fmt::Debug for ConnectionUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ConnectionUri").field(&self.redacted()).finish()
    }
}

/// Whether the raw userinfo contains `:`
///
/// `url` reports `user:@host` as having no password; an empty one still
/// counts as supplied.
fn has_password_separator(uri: &str) -> bool {
    let Some((_, rest)) = uri.split_once("://") else {
        return false;
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    authority
        .rsplit_once('@')
        .is_some_and(|(userinfo, _)| userinfo.contains(':'))
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Validated input of the CONNECT handshake
///
/// Built once from a [`ConnectionUri`] and never modified.
#[derive(Clone)]
pub struct ConnectionParameters {
    host: String,
    port: u16,
    virtual_host: String,
    login: Option<String>,
    passcode: Option<String>,
    accept_versions: &'static str,
    heartbeat: (Duration, Duration),
}

impl ConnectionParameters {
    /// Derive parameters from a parsed URI
    pub fn from_uri(uri: &ConnectionUri) -> Self {
        let (login, passcode) = match uri.credentials() {
            Some((user, pass)) => (Some(user.to_string()), Some(pass.to_string())),
            None => (None, None),
        };

        Self {
            host: uri.host().to_string(),
            port: uri.port(),
            virtual_host: uri.virtual_host().unwrap_or_default().to_string(),
            login,
            passcode,
            accept_versions: ACCEPTED_VERSIONS,
            heartbeat: (HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL),
        }
    }

    /// Parse a URI string straight into parameters
    pub fn parse(uri: &str) -> Result<Self, ConnectionError> {
        ConnectionUri::parse(uri).map(|u| Self::from_uri(&u))
    }

    /// `host:port` to open the TCP stream to
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Virtual host sent in the `host` header, empty when none was given
    pub fn virtual_host(&self) -> &str {
        &self.virtual_host
    }

    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }

    pub fn passcode(&self) -> Option<&str> {
        self.passcode.as_deref()
    }

    pub fn accept_versions(&self) -> &str {
        self.accept_versions
    }

    /// Outgoing and incoming heart-beat intervals offered to the broker
    pub fn heartbeat(&self) -> (Duration, Duration) {
        self.heartbeat
    }

    /// Headers shared by every connection
    pub fn default_connect_headers(&self) -> Headers {
        let (send, receive) = self.heartbeat;
        Headers::new()
            .with(
                names::HEART_BEAT,
                format!("{},{}", send.as_millis(), receive.as_millis()),
            )
            .with(names::ACCEPT_VERSION, self.accept_versions)
    }

    /// Full CONNECT header set
    ///
    /// Connection-specific headers come first; defaults only fill keys that
    /// are still missing, so identity headers are never overridden.
    pub fn connect_headers(&self) -> Headers {
        let mut headers = Headers::new().with(names::HOST, self.virtual_host.as_str());
        if let (Some(login), Some(passcode)) = (&self.login, &self.passcode) {
            headers.add(names::LOGIN, login.as_str());
            headers.add(names::PASSCODE, passcode.as_str());
        }
        headers.merge_defaults(&self.default_connect_headers());
        headers
    }
}

impl std::fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("address", &self.address())
            .field("virtual_host", &self.virtual_host)
            .field("login", &self.login)
            .field("passcode", &self.passcode.as_ref().map(|_| "***"))
            .field("accept_versions", &self.accept_versions)
            .field("heartbeat", &self.heartbeat)
            .finish()
    }
}
