use crate::{
    constants::SUBSCRIPTION_COUNT_PER_PAGE,
    error::{Error, ErrorKind, QueryError},
    pagination::PageContext,
    schema::{SubscriptionRow, Uuid},
};

use sqlx::{Pool, Postgres};

use super::users::get_user_by_id;

pub async fn is_subscribed(
    follower_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        "SELECT author_id FROM subscriptions WHERE follower_id = $1 AND author_id = $2",
    )
    .bind(follower_id)
    .bind(author_id)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(row.is_some())
}

pub async fn subscribe(
    follower_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    if follower_id == author_id {
        return Err(ErrorKind::Validation.new("You can't follow yourself"));
    }

    if get_user_by_id(pool, author_id).await?.is_none() {
        return Err(ErrorKind::NotFound.new("No user exists with specified id"));
    }

    let result = sqlx::query(
        "INSERT INTO subscriptions (follower_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(follower_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() <= 0 {
        return Err(ErrorKind::AlreadyExists.new("You are already following this user"));
    }

    Ok(())
}

pub async fn unsubscribe(
    follower_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    if get_user_by_id(pool, author_id).await?.is_none() {
        return Err(ErrorKind::NotFound.new("No user exists with specified id"));
    }

    let result =
        sqlx::query("DELETE FROM subscriptions WHERE follower_id = $1 AND author_id = $2")
            .bind(follower_id)
            .bind(author_id)
            .execute(pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() <= 0 {
        return Err(ErrorKind::NotFound.new("You are not following this user"));
    }

    Ok(())
}

/// Authors the user follows, with their recipe counts.
pub async fn fetch_subscriptions(
    follower_id: Uuid,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<SubscriptionRow>, Error> {
    let rows: Vec<SubscriptionRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
            (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
            COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.follower_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(follower_id)
    .bind(SUBSCRIPTION_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.get(0).map(|p| p.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, SUBSCRIPTION_COUNT_PER_PAGE, offset);

    Ok(page)
}
