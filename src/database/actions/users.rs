use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
    },
    error::{Error, ErrorKind, QueryError},
    schema::{Profile, User, Uuid},
};

use sqlx::{Pool, Postgres};

pub async fn get_user(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Uuid) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Creates a user; the password is hashed here, never stored as given.
/// Returns false when the email is already taken.
pub async fn register_user(
    email: &str,
    username: &str,
    first_name: &str,
    last_name: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let password = hash_password(password.to_string())
        .map_err(|_e| ErrorKind::Internal.new("Failed to hash password"))?;

    let query = sqlx::query(
        "
        INSERT INTO users (email, username, first_name, last_name, password, role)
        VALUES ($1, $2, $3, $4, $5, 'user')
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(email)
    .bind(username)
    .bind(first_name)
    .bind(last_name)
    .bind(password)
    .execute(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(query.rows_affected() > 0)
}

pub async fn login_user(
    email: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let user = get_user(pool, email).await?;
    let user = match user {
        Some(user) => user,
        None => return Err(ErrorKind::Unauthorized.new("Invalid credentials")),
    };

    let authenticated = verify_password(password, &user.password)
        .map_err(|_e| ErrorKind::Internal.new("Corrupted password hash"))?;
    if !authenticated {
        log::warn!("Rejected login for user {}", user.id);
        return Err(ErrorKind::Unauthorized.new("Invalid credentials"));
    }

    let session = generate_jwt_session(&user);

    Ok(session)
}

pub async fn set_password(
    user_id: Uuid,
    current_password: &str,
    new_password: &str,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    if new_password.len() < 8 {
        return Err(ErrorKind::Validation.new("Password must be at least 8 characters"));
    }

    let user = get_user_by_id(pool, user_id).await?;
    let user = match user {
        Some(user) => user,
        None => return Err(ErrorKind::NotFound.new("No user exists with specified id")),
    };

    let authenticated = verify_password(current_password, &user.password)
        .map_err(|_e| ErrorKind::Internal.new("Corrupted password hash"))?;
    if !authenticated {
        return Err(ErrorKind::Validation.new("Wrong password entered"));
    }

    let password = hash_password(new_password.to_string())
        .map_err(|_e| ErrorKind::Internal.new("Failed to hash password"))?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user_id)
        .execute(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

/// Public profile of a user, with `is_subscribed` resolved for the viewer.
/// Anonymous viewers always see `is_subscribed = false`.
pub async fn get_profile(
    user_id: Uuid,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<Option<Profile>, Error> {
    let row: Option<Profile> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
            EXISTS(
                SELECT 1 FROM subscriptions s
                WHERE s.author_id = u.id AND s.follower_id = $2
            ) AS is_subscribed
        FROM users u
        WHERE u.id = $1
    ",
    )
    .bind(user_id)
    .bind(viewer.unwrap_or(-1))
    .fetch_optional(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}
