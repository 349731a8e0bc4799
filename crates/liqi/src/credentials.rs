//! Login credentials and the login request built from them.
//!
//! The lobby never sees the plain password: the client sends the
//! lowercase hex HMAC-SHA256 of it, keyed with a secret shared by every
//! web client.

use std::fmt;

use hmac::digest::{Key, KeyInit};
use hmac::{Hmac, Mac};
use liqi_protocol::lq;
use sha2::Sha256;

/// HMAC key the web client uses when hashing passwords.
pub const PASSWORD_HMAC_KEY: &[u8] = b"lailai";

/// Currency platform sent at login (2 = mainland China storefront).
const CURRENCY_PLATFORM_CHINA: u32 = 2;

type HmacSha256 = Hmac<Sha256>;

/// [`PASSWORD_HMAC_KEY`] zero-padded to the SHA-256 block size, the
/// form HMAC gives any key shorter than one block.
fn password_key() -> Key<HmacSha256> {
    let mut key = Key::<HmacSha256>::default();
    key[..PASSWORD_HMAC_KEY.len()].copy_from_slice(PASSWORD_HMAC_KEY);
    key
}

/// Hashes a plain password the way the lobby expects it.
pub fn hash_password(password: &str) -> String {
    let mut mac = <HmacSha256 as KeyInit>::new(&password_key());
    mac.update(password.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// An account name with its already-hashed password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    account: String,
    password_hash: String,
}

impl Credentials {
    /// Hashes `password` and pairs it with `account`.
    pub fn new(account: impl Into<String>, password: &str) -> Self {
        Self {
            account: account.into(),
            password_hash: hash_password(password),
        }
    }

    /// The account name (usually an email or phone number).
    pub fn account(&self) -> &str {
        &self.account
    }

    /// The hex HMAC of the password.
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// Client identity presented at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOptions {
    /// Device fingerprint. A stable value avoids "new device" prompts on
    /// the account. `None` generates a fresh UUID v4 per login.
    ///
    /// Default: `None`.
    pub random_key: Option<String>,

    /// Resource version of the web client, e.g. `0.5.162.w`.
    ///
    /// Default: empty.
    pub client_version: String,

    /// Reported device.
    ///
    /// Default: a desktop Safari browser.
    pub device: lq::ClientDeviceInfo,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            random_key: None,
            client_version: String::new(),
            device: lq::ClientDeviceInfo {
                device_type: "pc".to_string(),
                os: String::new(),
                os_version: String::new(),
                browser: "safari".to_string(),
            },
        }
    }
}

impl LoginOptions {
    /// Builds the login request for `credentials`.
    pub fn login_request(&self, credentials: &Credentials) -> lq::ReqLogin {
        let random_key = self
            .random_key
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        lq::ReqLogin {
            account: credentials.account.clone(),
            password: credentials.password_hash.clone(),
            reconnect: false,
            device: Some(self.device.clone()),
            random_key,
            client_version: self.client_version.clone(),
            gen_access_token: true,
            currency_platforms: vec![CURRENCY_PLATFORM_CHINA],
        }
    }
}
