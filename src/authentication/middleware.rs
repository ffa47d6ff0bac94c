use warp::{reject::Rejection, Filter};

use crate::constants::SESSION_COOKIE;
use crate::database::error::ErrorKind;

use super::jwt::{verify_jwt_session, SessionData};

/// Requires a valid session cookie without extracting anything.
pub fn with_auth() -> impl Filter<Extract = ((),), Error = Rejection> + Copy {
    warp::cookie::<String>(SESSION_COOKIE).and_then(|session: String| async move {
        match verify_jwt_session(session) {
            Ok(_) => Ok(()),
            Err(e) => Err(warp::reject::custom(e)),
        }
    })
}

/// Extracts the authenticated principal, rejecting anonymous requests
/// before any storage is touched.
pub fn with_session() -> impl Filter<Extract = (SessionData,), Error = Rejection> + Copy {
    warp::cookie::<String>(SESSION_COOKIE).and_then(|session: String| async move {
        match verify_jwt_session(session) {
            Ok(data) => Ok(SessionData::from(data)),
            Err(_) => Err(warp::reject::custom(
                ErrorKind::Unauthorized.new("Authentication required"),
            )),
        }
    })
}

/// Extracts the principal when present; anonymous requests pass through
/// with `None` (public reads resolve membership flags as false).
pub fn with_possible_session(
) -> impl Filter<Extract = (Option<SessionData>,), Error = std::convert::Infallible> + Copy {
    warp::cookie::optional::<String>(SESSION_COOKIE).map(|session: Option<String>| {
        session
            .and_then(|token| verify_jwt_session(token).ok())
            .map(SessionData::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::jwt::generate_jwt_session;
    use crate::database::schema::{User, UserRole};

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

    #[tokio::test]
    async fn anonymous_requests_pass_through_without_a_session() {
        let session = warp::test::request()
            .filter(&with_possible_session())
            .await
            .unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn cookie_holders_are_identified() {
        let token = generate_jwt_session(&user());
        let session = warp::test::request()
            .header("cookie", format!("{SESSION_COOKIE}={token}"))
            .filter(&with_possible_session())
            .await
            .unwrap();

        assert_eq!(session.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn garbage_cookie_counts_as_anonymous() {
        let session = warp::test::request()
            .header("cookie", format!("{SESSION_COOKIE}=not-a-token"))
            .filter(&with_possible_session())
            .await
            .unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn anonymous_requests_are_rejected_when_a_session_is_required() {
        let result = warp::test::request().filter(&with_session()).await;
        assert!(result.is_err());
    }
}
