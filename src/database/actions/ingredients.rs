use crate::{
    constants::INGREDIENT_SEARCH_LIMIT,
    error::{Error, QueryError},
    schema::{Ingredient, Uuid},
};

use sqlx::{Pool, Postgres};

/// Escapes `LIKE`/`ILIKE` metacharacters so a user-supplied prefix
/// matches literally instead of acting as a pattern.
pub(crate) fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub async fn get_ingredient(
    id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Case-insensitive prefix search on the ingredient name, used by the
/// autocomplete. An empty prefix lists the head of the catalog.
pub async fn search_ingredients(
    prefix: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = sqlx::query_as(
        "SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name LIMIT $2",
    )
    .bind(format!("{}%", escape_like(prefix)))
    .bind(INGREDIENT_SEARCH_LIMIT)
    .fetch_all(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("100% rye"), "100\\% rye");
        assert_eq!(escape_like("egg_white"), "egg\\_white");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn plain_prefixes_pass_unchanged() {
        assert_eq!(escape_like("flour"), "flour");
        assert_eq!(escape_like(""), "");
    }
}
