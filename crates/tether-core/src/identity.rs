//! Network identity
//!
//! The station credentials and messaging-endpoint bundle written by
//! provisioning. Durable storage is the only copy: every connection attempt
//! re-reads it, nothing is cached across restarts.

use crate::errors::IdentityError;
use crate::storage::CredentialStore;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Namespace holding the identity
pub const IDENTITY_NAMESPACE: &str = "wifi_creds";

pub const KEY_SSID: &str = "ssid";
pub const KEY_PASSWORD: &str = "password";
pub const KEY_MQTT_HOST: &str = "mqtt_host";
pub const KEY_MQTT_PORT: &str = "mqtt_port";
pub const KEY_MQTT_USER: &str = "mqtt_user";
pub const KEY_MQTT_PASS: &str = "mqtt_pass";
pub const KEY_DEVICE_TOKEN: &str = "device_token";

/// Longest SSID a station can join
pub const MAX_SSID_LEN: usize = 32;
/// Longest WPA passphrase
pub const MAX_PASSPHRASE_LEN: usize = 64;
/// Submitted form bodies must be shorter than this
pub const MAX_FORM_BODY: usize = 256;

/// Broker port that selects the unencrypted transport
pub const PLAINTEXT_PORT: u16 = 1883;

// ----------------------------------------------------------------------------
// Identity Types
// ----------------------------------------------------------------------------

/// Messaging-endpoint credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrokerAuth {
    Anonymous,
    UserPassword { username: String, password: String },
    DeviceToken(String),
}

impl fmt::Debug for BrokerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerAuth::Anonymous => f.write_str("Anonymous"),
            BrokerAuth::UserPassword { username, .. } => f
                .debug_struct("UserPassword")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            BrokerAuth::DeviceToken(_) => f.write_str("DeviceToken(<redacted>)"),
        }
    }
}

/// Where and how to reach the messaging endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub auth: BrokerAuth,
}

impl BrokerEndpoint {
    /// Every port except 1883 requires an encrypted transport and a trust anchor
    pub fn is_encrypted(&self) -> bool {
        self.port != PLAINTEXT_PORT
    }

    pub fn scheme(&self) -> &'static str {
        if self.is_encrypted() {
            "mqtts"
        } else {
            "mqtt"
        }
    }

    /// Endpoint URI, e.g. `mqtts://broker.local:8883`
    pub fn uri(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.host, self.port)
    }
}

/// Everything provisioning collects
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIdentity {
    pub ssid: String,
    pub passphrase: String,
    pub broker: BrokerEndpoint,
}

impl fmt::Debug for NetworkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkIdentity")
            .field("ssid", &self.ssid)
            .field("passphrase", &"<redacted>")
            .field("broker", &self.broker)
            .finish()
    }
}

impl NetworkIdentity {
    /// Build and validate an identity from individual fields
    pub fn new(
        ssid: impl Into<String>,
        passphrase: impl Into<String>,
        host: impl Into<String>,
        port: &str,
        auth: BrokerAuth,
    ) -> Result<Self, IdentityError> {
        let identity = Self {
            ssid: ssid.into(),
            passphrase: passphrase.into(),
            broker: BrokerEndpoint {
                host: host.into(),
                port: parse_port(port)?,
                auth,
            },
        };
        identity.validate()?;
        Ok(identity)
    }

    /// Parse a URL-encoded submission from the configuration surface
    ///
    /// Required: `ssid`, `password` (may be empty), `mqtt_host`, `mqtt_port`.
    /// Optional: `mqtt_user` with `mqtt_pass`, or `device_token`, not both.
    pub fn from_form(body: &str) -> Result<Self, IdentityError> {
        if body.len() >= MAX_FORM_BODY {
            return Err(IdentityError::RequestTooLong {
                length: body.len(),
                max: MAX_FORM_BODY - 1,
            });
        }

        let mut ssid = None;
        let mut password = None;
        let mut host = None;
        let mut port = None;
        let mut user = None;
        let mut pass = None;
        let mut token = None;

        for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
            let slot = match &*key {
                KEY_SSID => &mut ssid,
                KEY_PASSWORD => &mut password,
                KEY_MQTT_HOST => &mut host,
                KEY_MQTT_PORT => &mut port,
                KEY_MQTT_USER => &mut user,
                KEY_MQTT_PASS => &mut pass,
                KEY_DEVICE_TOKEN => &mut token,
                _ => continue,
            };
            *slot = Some(value.into_owned());
        }

        let ssid = ssid.ok_or(IdentityError::MissingField { field: KEY_SSID })?;
        let password = password.ok_or(IdentityError::MissingField {
            field: KEY_PASSWORD,
        })?;
        let host = host.ok_or(IdentityError::MissingField {
            field: KEY_MQTT_HOST,
        })?;
        let port = port.ok_or(IdentityError::MissingField {
            field: KEY_MQTT_PORT,
        })?;
        let auth = auth_from_fields(user, pass, token)?;

        Self::new(ssid, password, host, &port, auth)
    }

    /// Check field bounds
    pub fn validate(&self) -> Result<(), IdentityError> {
        if self.ssid.is_empty() || self.ssid.len() > MAX_SSID_LEN {
            return Err(IdentityError::invalid_field(
                KEY_SSID,
                format!("must be 1..={} bytes", MAX_SSID_LEN),
            ));
        }
        if self.passphrase.len() > MAX_PASSPHRASE_LEN {
            return Err(IdentityError::invalid_field(
                KEY_PASSWORD,
                format!("must be at most {} bytes", MAX_PASSPHRASE_LEN),
            ));
        }
        if self.broker.host.trim().is_empty() {
            return Err(IdentityError::invalid_field(KEY_MQTT_HOST, "must not be empty"));
        }
        if self.broker.port == 0 {
            return Err(IdentityError::invalid_field(KEY_MQTT_PORT, "must be 1..=65535"));
        }
        match &self.broker.auth {
            BrokerAuth::UserPassword { username, .. } if username.is_empty() => Err(
                IdentityError::invalid_field(KEY_MQTT_USER, "must not be empty"),
            ),
            BrokerAuth::DeviceToken(token) if token.is_empty() => Err(
                IdentityError::invalid_field(KEY_DEVICE_TOKEN, "must not be empty"),
            ),
            _ => Ok(()),
        }
    }
}

fn parse_port(port: &str) -> Result<u16, IdentityError> {
    match port.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(IdentityError::invalid_field(
            KEY_MQTT_PORT,
            format!("{:?} is not a port in 1..=65535", port),
        )),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn auth_from_fields(
    user: Option<String>,
    pass: Option<String>,
    token: Option<String>,
) -> Result<BrokerAuth, IdentityError> {
    match (non_empty(user), non_empty(token)) {
        (Some(_), Some(_)) => Err(IdentityError::invalid_field(
            KEY_DEVICE_TOKEN,
            "cannot be combined with mqtt_user",
        )),
        (Some(username), None) => Ok(BrokerAuth::UserPassword {
            username,
            password: pass.unwrap_or_default(),
        }),
        (None, Some(token)) => Ok(BrokerAuth::DeviceToken(token)),
        (None, None) => Ok(BrokerAuth::Anonymous),
    }
}

// ----------------------------------------------------------------------------
// Identity Store
// ----------------------------------------------------------------------------

/// Reads and writes the identity in the credential store
#[derive(Clone)]
pub struct IdentityStore {
    storage: Arc<dyn CredentialStore>,
    namespace: String,
}

impl IdentityStore {
    pub fn new(storage: Arc<dyn CredentialStore>) -> Self {
        Self::with_namespace(storage, IDENTITY_NAMESPACE)
    }

    pub fn with_namespace(storage: Arc<dyn CredentialStore>, namespace: impl Into<String>) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Persist an identity as one logical unit
    ///
    /// The SSID is the commit marker: it is erased first and written last, so
    /// an interrupted save leaves no SSID and the next boot provisions again.
    pub fn save(&self, identity: &NetworkIdentity) -> Result<(), IdentityError> {
        identity.validate()?;
        let ns = self.namespace.as_str();

        self.storage.erase_key(ns, KEY_SSID)?;
        self.storage.put_string(ns, KEY_PASSWORD, &identity.passphrase)?;
        self.storage.put_string(ns, KEY_MQTT_HOST, &identity.broker.host)?;
        self.storage
            .put_string(ns, KEY_MQTT_PORT, &identity.broker.port.to_string())?;

        match &identity.broker.auth {
            BrokerAuth::Anonymous => {
                self.storage.erase_key(ns, KEY_MQTT_USER)?;
                self.storage.erase_key(ns, KEY_MQTT_PASS)?;
                self.storage.erase_key(ns, KEY_DEVICE_TOKEN)?;
            }
            BrokerAuth::UserPassword { username, password } => {
                self.storage.put_string(ns, KEY_MQTT_USER, username)?;
                self.storage.put_string(ns, KEY_MQTT_PASS, password)?;
                self.storage.erase_key(ns, KEY_DEVICE_TOKEN)?;
            }
            BrokerAuth::DeviceToken(token) => {
                self.storage.put_string(ns, KEY_DEVICE_TOKEN, token)?;
                self.storage.erase_key(ns, KEY_MQTT_USER)?;
                self.storage.erase_key(ns, KEY_MQTT_PASS)?;
            }
        }

        self.storage.put_string(ns, KEY_SSID, &identity.ssid)?;
        info!("Network identity saved for SSID {:?}", identity.ssid);
        Ok(())
    }

    /// The stored SSID, if provisioning has completed
    pub fn stored_ssid(&self) -> Result<Option<String>, IdentityError> {
        let ssid = self.storage.get_string_opt(&self.namespace, KEY_SSID)?;
        Ok(non_empty(ssid))
    }

    /// Station passphrase; absent reads as empty (open network)
    pub fn passphrase(&self) -> Result<String, IdentityError> {
        Ok(self
            .storage
            .get_string_opt(&self.namespace, KEY_PASSWORD)?
            .unwrap_or_default())
    }

    /// Messaging-endpoint bundle
    pub fn broker_endpoint(&self) -> Result<BrokerEndpoint, IdentityError> {
        let ns = self.namespace.as_str();
        let host = non_empty(self.storage.get_string_opt(ns, KEY_MQTT_HOST)?).ok_or(
            IdentityError::MissingField {
                field: KEY_MQTT_HOST,
            },
        )?;
        let port = self
            .storage
            .get_string_opt(ns, KEY_MQTT_PORT)?
            .ok_or(IdentityError::MissingField {
                field: KEY_MQTT_PORT,
            })?;

        let auth = auth_from_fields(
            self.storage.get_string_opt(ns, KEY_MQTT_USER)?,
            self.storage.get_string_opt(ns, KEY_MQTT_PASS)?,
            self.storage.get_string_opt(ns, KEY_DEVICE_TOKEN)?,
        )?;

        Ok(BrokerEndpoint {
            host,
            port: parse_port(&port)?,
            auth,
        })
    }

    /// Full identity, or `None` when no SSID is stored
    pub fn load(&self) -> Result<Option<NetworkIdentity>, IdentityError> {
        let Some(ssid) = self.stored_ssid()? else {
            debug!("No network identity stored");
            return Ok(None);
        };

        Ok(Some(NetworkIdentity {
            ssid,
            passphrase: self.passphrase()?,
            broker: self.broker_endpoint()?,
        }))
    }

    /// Forget the identity entirely
    pub fn clear(&self) -> Result<(), IdentityError> {
        self.storage.erase_namespace(&self.namespace)?;
        info!("Network identity cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_form_with_empty_password_and_plain_port() {
        let identity =
            NetworkIdentity::from_form("ssid=Home&password=&mqtt_host=h&mqtt_port=1883").unwrap();

        assert_eq!(identity.ssid, "Home");
        assert_eq!(identity.passphrase, "");
        assert_eq!(identity.broker.auth, BrokerAuth::Anonymous);
        assert!(!identity.broker.is_encrypted());
        assert_eq!(identity.broker.uri(), "mqtt://h:1883");
    }

    #[test]
    fn test_form_decodes_and_selects_auth() {
        let identity = NetworkIdentity::from_form(
            "ssid=My+Net&password=p%40ss&mqtt_host=broker.local&mqtt_port=8883&device_token=abc",
        )
        .unwrap();
        assert_eq!(identity.ssid, "My Net");
        assert_eq!(identity.passphrase, "p@ss");
        assert_eq!(identity.broker.auth, BrokerAuth::DeviceToken("abc".into()));
        assert_eq!(identity.broker.uri(), "mqtts://broker.local:8883");

        let identity = NetworkIdentity::from_form(
            "ssid=a&password=b&mqtt_host=h&mqtt_port=1883&mqtt_user=u&mqtt_pass=p",
        )
        .unwrap();
        assert_eq!(
            identity.broker.auth,
            BrokerAuth::UserPassword {
                username: "u".into(),
                password: "p".into()
            }
        );
    }

    #[test]
    fn test_form_rejections() {
        assert!(matches!(
            NetworkIdentity::from_form("password=x&mqtt_host=h&mqtt_port=1883"),
            Err(IdentityError::MissingField { field: "ssid" })
        ));
        assert!(matches!(
            NetworkIdentity::from_form("ssid=a&password=&mqtt_host=h&mqtt_port=0"),
            Err(IdentityError::InvalidField { field: "mqtt_port", .. })
        ));
        assert!(matches!(
            NetworkIdentity::from_form("ssid=a&password=&mqtt_host=h&mqtt_port=70000"),
            Err(IdentityError::InvalidField { field: "mqtt_port", .. })
        ));
        assert!(matches!(
            NetworkIdentity::from_form("ssid=&password=&mqtt_host=h&mqtt_port=1883"),
            Err(IdentityError::InvalidField { field: "ssid", .. })
        ));
        assert!(matches!(
            NetworkIdentity::from_form(
                "ssid=a&password=&mqtt_host=h&mqtt_port=1883&mqtt_user=u&device_token=t"
            ),
            Err(IdentityError::InvalidField { .. })
        ));

        let long = format!("ssid={}", "a".repeat(MAX_FORM_BODY));
        assert!(matches!(
            NetworkIdentity::from_form(&long),
            Err(IdentityError::RequestTooLong { .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let store = Arc::new(MemoryStore::new());
        let identities = IdentityStore::new(store.clone());
        assert_eq!(identities.load().unwrap(), None);

        let identity = NetworkIdentity::new(
            "Home",
            "secret",
            "broker.local",
            "8883",
            BrokerAuth::UserPassword {
                username: "dev".into(),
                password: "pw".into(),
            },
        )
        .unwrap();
        identities.save(&identity).unwrap();
        assert_eq!(identities.load().unwrap(), Some(identity));

        // Switching to a token removes the user/password pair
        let replaced =
            NetworkIdentity::new("Home", "", "h", "1883", BrokerAuth::DeviceToken("t".into()))
                .unwrap();
        identities.save(&replaced).unwrap();
        assert!(!store.contains(IDENTITY_NAMESPACE, KEY_MQTT_USER));
        assert_eq!(identities.load().unwrap(), Some(replaced));
    }

    #[test]
    fn test_interrupted_save_leaves_no_ssid() {
        let store = Arc::new(MemoryStore::new());
        let identities = IdentityStore::new(store.clone());
        let identity =
            NetworkIdentity::new("Home", "pw", "h", "1883", BrokerAuth::Anonymous).unwrap();
        identities.save(&identity).unwrap();

        store.fail_writes_to(IDENTITY_NAMESPACE, KEY_MQTT_HOST);
        assert!(matches!(
            identities.save(&identity),
            Err(IdentityError::Storage(_))
        ));
        assert_eq!(identities.stored_ssid().unwrap(), None);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let identity = NetworkIdentity::new(
            "Home",
            "hunter2",
            "h",
            "1883",
            BrokerAuth::DeviceToken("tok".into()),
        )
        .unwrap();
        let rendered = format!("{:?}", identity);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("tok\""));
    }
}
