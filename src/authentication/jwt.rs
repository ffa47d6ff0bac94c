use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::error::{Error, ErrorKind};
use crate::database::schema::{User, UserRole, Uuid};

use super::permissions::ActionType;

fn session_key() -> Hmac<Sha256> {
    let secret =
        std::env::var("FOODGRAM_JWT_SECRET").unwrap_or_else(|_| String::from("secret"));
    Hmac::new_from_slice(secret.as_bytes()).unwrap()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Uuid, username: String, role: UserRole) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(1)).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

/// Authenticated principal passed explicitly into every service call.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(
                ErrorKind::Forbidden.new("You don't have permission to perform this action")
            );
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            user_id: value.user_id,
            username: value.username,
            is_admin: value.role == UserRole::Admin,
            role: value.role,
        }
    }
}

pub fn generate_jwt_session(user: &User) -> String {
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), user.role.to_owned());

    claims.sign_with_key(&session_key()).unwrap()
}

pub fn verify_jwt_session(token: String) -> Result<JwtSessionData, Error> {
    token
        .verify_with_key(&session_key())
        .map_err(|_| ErrorKind::Unauthorized.new("Invalid session; Invalid token"))
        .map(|session: JwtSessionData| {
            let now = Local::now().timestamp();

            if (session.exp - now).is_negative() {
                return Err(ErrorKind::Unauthorized.new("Invalid session; Token expired"));
            }
            Ok(session)
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 1,
            email: String::from("alice@example.com"),
            username: String::from("alice"),
            first_name: String::from("Alice"),
            last_name: String::from("Cooper"),
            password: String::from("$argon2id$..."),
            role: UserRole::User,
        }
    }

    #[test]
    fn sign_then_verify_round_trip() {
        let token = generate_jwt_session(&user());
        let session = verify_jwt_session(token).unwrap();

        assert_eq!(session.user_id, 1);
        assert_eq!(session.username, "alice");
        assert_eq!(session.role, UserRole::User);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let mut token = generate_jwt_session(&user());
        token.push('x');

        let error = verify_jwt_session(token).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Unauthorized);
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = JwtSessionData {
            user_id: 1,
            username: String::from("alice"),
            role: UserRole::User,
            iat: 0,
            exp: 1,
        };
        let token = claims.sign_with_key(&session_key()).unwrap();

        let error = verify_jwt_session(token).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Unauthorized);
    }

    #[test]
    fn admin_flag_follows_the_role() {
        let mut admin = user();
        admin.role = UserRole::Admin;

        let session: SessionData =
            verify_jwt_session(generate_jwt_session(&admin)).unwrap().into();
        assert!(session.is_admin);

        let session: SessionData =
            verify_jwt_session(generate_jwt_session(&user())).unwrap().into();
        assert!(!session.is_admin);
    }
}
