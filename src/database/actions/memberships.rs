use crate::{
    error::{Error, ErrorKind, QueryError},
    schema::{RecipeShort, Uuid},
};

use sqlx::{Pool, Postgres};

use super::recipes::get_recipe;

/// The two uniqueness-guarded user/recipe relations. Row existence is the
/// single source of truth for membership; there are no mirror flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipRelation {
    Favorite,
    Cart,
}

impl MembershipRelation {
    fn table(&self) -> &'static str {
        match self {
            MembershipRelation::Favorite => "favorites",
            MembershipRelation::Cart => "cart_entries",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            MembershipRelation::Favorite => "favorites",
            MembershipRelation::Cart => "shopping cart",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOp {
    Add,
    Remove,
}

pub async fn is_member(
    relation: MembershipRelation,
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(Uuid,)> = sqlx::query_as(&format!(
        "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = $2",
        relation.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(result.is_some())
}

/// Single atomic insert; two concurrent adds race on the storage uniqueness
/// constraint and the loser gets `AlreadyExists` instead of a raw conflict.
pub async fn add_membership(
    relation: MembershipRelation,
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, Error> {
    let recipe = get_recipe(recipe_id, pool).await?;
    let recipe = match recipe {
        Some(recipe) => recipe,
        None => return Err(ErrorKind::NotFound.new("No recipe exists with specified id")),
    };

    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        relation.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() <= 0 {
        return Err(ErrorKind::AlreadyExists
            .new(&format!("Recipe already added to {}", relation.describe())));
    }

    Ok(RecipeShort::from(recipe))
}

pub async fn remove_membership(
    relation: MembershipRelation,
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    if get_recipe(recipe_id, pool).await?.is_none() {
        return Err(ErrorKind::NotFound.new("No recipe exists with specified id"));
    }

    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        relation.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() <= 0 {
        return Err(ErrorKind::NotFound
            .new(&format!("Recipe was not in {}", relation.describe())));
    }

    Ok(())
}

/// POST resolves to Add, DELETE to Remove; Add returns the short recipe
/// view that the endpoint echoes back.
pub async fn toggle_membership(
    relation: MembershipRelation,
    op: MembershipOp,
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeShort>, Error> {
    match op {
        MembershipOp::Add => {
            let recipe = add_membership(relation, user_id, recipe_id, pool).await?;
            Ok(Some(recipe))
        }
        MembershipOp::Remove => {
            remove_membership(relation, user_id, recipe_id, pool).await?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relations_map_to_their_join_tables() {
        assert_eq!(MembershipRelation::Favorite.table(), "favorites");
        assert_eq!(MembershipRelation::Cart.table(), "cart_entries");
        assert_eq!(MembershipRelation::Cart.describe(), "shopping cart");
    }
}
