use anyhow::Result;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Lifetime of a credential issued to a paired extension.
pub const EXTENSION_TOKEN_TTL_HOURS: i64 = 12;

/// Claims carried by the signed extension credential
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionClaims {
    pub sub: String, // user id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Signs and verifies the `x-extension-token` credential (HS256)
#[derive(Clone)]
pub struct ExtensionTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl ExtensionTokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a credential valid for 12 hours
    pub fn sign(&self, user_id: &str, workspace_id: Option<&str>) -> Result<String> {
        self.sign_with_ttl(
            user_id,
            workspace_id,
            chrono::Duration::hours(EXTENSION_TOKEN_TTL_HOURS),
        )
    }

    pub fn sign_with_ttl(
        &self,
        user_id: &str,
        workspace_id: Option<&str>,
        ttl: chrono::Duration,
    ) -> Result<String> {
        let now = chrono::Utc::now();
        let claims = ExtensionClaims {
            sub: user_id.to_string(),
            workspace_id: workspace_id.map(String::from),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(Into::into)
    }

    /// Returns claims if the signature matches and the token has not expired
    pub fn verify(&self, token: &str) -> Result<ExtensionClaims> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<ExtensionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(Into::into)
    }
}
