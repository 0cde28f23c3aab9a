use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::domain::{User, UserId};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub name: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn user_id(&self) -> UserId {
        UserId(self.sub.clone())
    }
}

pub fn mint_session(cfg: &SessionConfig, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::seconds(cfg.ttl_seconds);
    let claims = SessionClaims {
        sub: user.id.0.clone(),
        name: user.name.clone(),
        role: user.role.as_str().to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
}

pub fn verify_session(cfg: &SessionConfig, token: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::UserRole;

    fn cfg(ttl_seconds: i64) -> SessionConfig {
        SessionConfig {
            secret: "test-secret".into(),
            ttl_seconds,
        }
    }

    fn user() -> User {
        User {
            id: UserId::from("user-7"),
            username: "asha".into(),
            name: "Asha".into(),
            role: UserRole::Executive,
            is_active: true,
        }
    }

    #[test]
    fn minted_session_verifies_with_same_secret() {
        let token = mint_session(&cfg(60), &user()).expect("mint");
        let claims = verify_session(&cfg(60), &token).expect("verify");
        assert_eq!(claims.user_id(), UserId::from("user-7"));
        assert_eq!(claims.role, "EXECUTIVE");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn rejects_foreign_secret_and_expired_tokens() {
        let token = mint_session(&cfg(60), &user()).expect("mint");
        let other = SessionConfig {
            secret: "other".into(),
            ttl_seconds: 60,
        };
        assert!(verify_session(&other, &token).is_err());

        // well past the default validation leeway
        let expired = mint_session(&cfg(-600), &user()).expect("mint");
        assert!(verify_session(&cfg(60), &expired).is_err());
    }
}
