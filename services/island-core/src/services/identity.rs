//! Login-payload and wallet-ownership verification.
//!
//! A login payload is a URL-encoded key/value string carrying a `hash` field
//! and a `user` JSON field. The hash is an HMAC-SHA-256 over the remaining
//! fields (keys sorted, rendered `key=value`, joined by newline) keyed by the
//! SHA-256 of the bot secret. Both checks here fail closed: any parse or
//! crypto problem reads as "not verified", never as an error.

use std::sync::Arc;

use chrono::Utc;
use hmac::{Hmac, Mac};
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use island_chain::{address_eq, ChainClient};
use island_core_types::{PlatformUser, UserKey, UserRecord};
use island_storage::DocumentStore;

use crate::error::{ServiceError, ServiceResult};
use crate::services::USERS;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginVerification {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PlatformUser>,
}

impl LoginVerification {
    fn failed() -> Self {
        LoginVerification {
            verified: false,
            user: None,
        }
    }
}

pub struct IdentityService {
    bot_secret: String,
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn DocumentStore>,
}

impl IdentityService {
    pub fn new(
        bot_secret: String,
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        IdentityService {
            bot_secret,
            chain,
            store,
        }
    }

    /// Validate a signed login payload. Pure; no state is touched.
    pub fn verify_platform_login(&self, raw_payload: &str) -> LoginVerification {
        if raw_payload.is_empty() {
            return LoginVerification::failed();
        }

        let mut provided_hash = None;
        let mut fields: Vec<(String, String)> = Vec::new();
        let mut user_json = None;

        for pair in raw_payload.split('&') {
            let (key, value) = match pair.split_once('=') {
                Some(kv) => kv,
                None => continue,
            };
            let key = percent_decode(key);
            let value = percent_decode(value);
            if key == "hash" {
                provided_hash = Some(value);
            } else {
                if key == "user" {
                    user_json = Some(value.clone());
                }
                fields.push((key, value));
            }
        }

        let provided_hash = match provided_hash {
            Some(h) => h,
            None => return LoginVerification::failed(),
        };
        let provided_bytes = match hex::decode(&provided_hash) {
            Ok(bytes) => bytes,
            Err(_) => return LoginVerification::failed(),
        };

        fields.sort_by(|a, b| a.0.cmp(&b.0));
        let data_check_string = fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("\n");

        let secret = Sha256::digest(self.bot_secret.as_bytes());
        let mut mac = match HmacSha256::new_from_slice(&secret) {
            Ok(mac) => mac,
            Err(_) => return LoginVerification::failed(),
        };
        mac.update(data_check_string.as_bytes());
        // verify_slice is a constant-time comparison
        if mac.verify_slice(&provided_bytes).is_err() {
            return LoginVerification::failed();
        }

        let user = user_json.and_then(|raw| serde_json::from_str::<PlatformUser>(&raw).ok());
        LoginVerification {
            verified: true,
            user,
        }
    }

    /// Resolve an auth payload to its platform user, or `Unauthenticated`.
    pub fn authenticate(&self, raw_payload: &str) -> ServiceResult<PlatformUser> {
        let verification = self.verify_platform_login(raw_payload);
        if !verification.verified {
            return Err(ServiceError::unauthenticated("invalid login payload"));
        }
        verification
            .user
            .ok_or_else(|| ServiceError::unauthenticated("login payload carries no user"))
    }

    /// Recover the signer of `message` and compare against the claimed
    /// address, case-insensitively. Malformed signatures read as `false`.
    pub async fn verify_wallet_ownership(
        &self,
        message: &str,
        signature: &str,
        claimed_address: &str,
    ) -> bool {
        if message.is_empty() || signature.is_empty() || claimed_address.is_empty() {
            return false;
        }
        match self.chain.recover_signer(message, signature).await {
            Ok(recovered) => address_eq(&recovered, claimed_address),
            Err(err) => {
                debug!("signer recovery failed: {}", err);
                false
            }
        }
    }

    /// Create the user record on the first wallet-connect handshake, or
    /// return the existing one. The key derivation never runs twice with
    /// different inputs for the same record.
    pub fn ensure_user(
        &self,
        platform: &PlatformUser,
        wallet_address: &str,
    ) -> ServiceResult<UserRecord> {
        let user_key = UserKey::derive(platform.id, wallet_address);
        let now = Utc::now();
        let platform = platform.clone();
        let wallet = wallet_address.to_string();

        let committed = self
            .store
            .transact(USERS, user_key.as_str(), &mut |current| match current {
                Some(existing) => Ok(Some(existing)),
                None => Ok(Some(serde_json::to_value(UserRecord::new(
                    &platform, &wallet, now,
                ))?)),
            })?;

        match committed {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Err(ServiceError::not_found(format!("user {}", user_key))),
        }
    }

    pub fn get_user(&self, user_key: &UserKey) -> ServiceResult<UserRecord> {
        crate::services::load_user(self.store.as_ref(), user_key)
    }
}

/// Decode a URL-encoded component. `+` is a space; bad escapes pass through
/// verbatim so a malformed payload fails the HMAC check instead of panicking.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let decoded = bytes.get(i + 1..i + 3).and_then(|pair| {
                    let hi = (pair[0] as char).to_digit(16)?;
                    let lo = (pair[1] as char).to_digit(16)?;
                    Some((hi * 16 + lo) as u8)
                });
                match decoded {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
