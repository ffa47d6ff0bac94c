use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    constants::RECIPE_COUNT_PER_PAGE,
    error::{Error, ErrorKind, QueryError},
    pagination::PageContext,
    schema::{Recipe, RecipeDraft, RecipeIngredient, RecipeRow, RecipeView, Tag, Uuid},
};

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use super::ingredients::escape_like;
use super::memberships::{is_member, MembershipRelation};
use super::tags::filter_existing_tags;
use super::users::get_profile;

/// Optional filters for the recipe list endpoint.
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    pub tag_slug: Option<String>,
    pub favorited_by: Option<Uuid>,
    pub in_cart_of: Option<Uuid>,
    pub search: Option<String>,
}

pub async fn fetch_recipes(
    filter: RecipeFilter,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE true");

    if let Some(author) = filter.author {
        query_builder.push(" AND r.author_id = ").push_bind(author);
    }
    if let Some(slug) = &filter.tag_slug {
        query_builder
            .push(
                " AND r.id IN (SELECT rt.recipe_id FROM recipe_tags rt \
                 INNER JOIN tags t ON t.id = rt.tag_id WHERE t.slug = ",
            )
            .push_bind(slug.to_owned())
            .push(")");
    }
    if let Some(user_id) = filter.favorited_by {
        query_builder
            .push(" AND r.id IN (SELECT f.recipe_id FROM favorites f WHERE f.user_id = ")
            .push_bind(user_id)
            .push(")");
    }
    if let Some(user_id) = filter.in_cart_of {
        query_builder
            .push(" AND r.id IN (SELECT c.recipe_id FROM cart_entries c WHERE c.user_id = ")
            .push_bind(user_id)
            .push(")");
    }
    if let Some(search) = &filter.search {
        query_builder
            .push(" AND r.name ILIKE ")
            .push_bind(format!("{}%", escape_like(search)));
    }

    query_builder
        .push(" ORDER BY r.id DESC LIMIT ")
        .push_bind(RECIPE_COUNT_PER_PAGE)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<RecipeRow> = query_builder
        .build_query_as()
        .fetch_all(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.get(0).map(|p| p.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, RECIPE_COUNT_PER_PAGE, offset);
    Ok(page)
}

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn find_recipe(
    author_id: Uuid,
    name: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<Uuid>, Error> {
    let row: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM recipes WHERE author_id = $1 AND name = $2")
            .bind(author_id)
            .bind(name)
            .fetch_optional(&*pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    Ok(row.map(|r| r.0))
}

/// Resolves a recipe for mutation: the author may edit their own, admins may
/// edit any.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let recipe = get_recipe(id, pool).await?;
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) => match session.authenticate(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(recipe),
            Err(_) => {
                if recipe.author_id != session.user_id {
                    Err(ErrorKind::Forbidden.default())
                } else {
                    Ok(recipe)
                }
            }
        },
        None => Err(ErrorKind::NotFound.new("No recipe exists with specified id")),
    }
}

pub async fn list_recipe_ingredients(
    pool: &Pool<Postgres>,
    recipe_id: Uuid,
) -> Result<Vec<RecipeIngredient>, Error> {
    let rows: Vec<RecipeIngredient> = sqlx::query_as(
        "
        SELECT ri.recipe_id AS recipe_id, i.id AS ingredient_id, i.name AS name,
            i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub async fn list_recipe_tags(
    pool: &Pool<Postgres>,
    recipe_id: Uuid,
) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(list)
}

/// Recipe with resolved ingredients, tags and the viewer's membership flags.
pub async fn get_recipe_view(
    id: Uuid,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeView>, Error> {
    let recipe = match get_recipe(id, pool).await? {
        Some(recipe) => recipe,
        None => return Ok(None),
    };

    let author = get_profile(recipe.author_id, viewer, pool)
        .await?
        .ok_or(ErrorKind::Internal.new("Recipe author is missing"))?;

    let ingredients = list_recipe_ingredients(pool, id).await?;
    let tags = list_recipe_tags(pool, id).await?;

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(user_id) => (
            is_member(MembershipRelation::Favorite, user_id, id, pool).await?,
            is_member(MembershipRelation::Cart, user_id, id, pool).await?,
        ),
        None => (false, false),
    };

    Ok(Some(RecipeView {
        id: recipe.id,
        author,
        name: recipe.name,
        text: recipe.text,
        image: recipe.image,
        cooking_time: recipe.cooking_time,
        ingredients,
        tags,
        is_favorited,
        is_in_shopping_cart,
    }))
}

/// All referential validation happens before the transaction opens, so a
/// rejected draft leaves no partial write behind.
async fn ensure_tags_exist(tags: &[Uuid], pool: &Pool<Postgres>) -> Result<(), Error> {
    let existing = filter_existing_tags(tags, pool).await?;
    if existing.len() < tags.len() {
        return Err(ErrorKind::Validation.new("This tag doesn't exist yet"));
    }
    Ok(())
}

async fn write_children(
    tr: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    draft: &RecipeDraft,
) -> Result<(), Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");

    query_builder.push_values(draft.ingredients.iter().take(65535 / 3), |mut b, part| {
        b.push_bind(recipe_id).push_bind(part.id).push_bind(part.amount);
    });

    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");

    query_builder.push_values(draft.tags.iter().take(65535 / 2), |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });

    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

pub async fn create_recipe(
    session: &SessionData,
    draft: RecipeDraft,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, Error> {
    session.authenticate(ActionType::CreateRecipes)?;
    draft.validate()?;
    ensure_tags_exist(&draft.tags, pool).await?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    // The (author, name) uniqueness check rides on the storage constraint,
    // so two concurrent creates cannot both pass a pre-check.
    let row: Option<(Uuid,)> = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (author_id, name) DO NOTHING
        RETURNING id
    ",
    )
    .bind(session.user_id)
    .bind(&draft.name)
    .bind(&draft.text)
    .bind(&draft.image)
    .bind(draft.cooking_time)
    .fetch_optional(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let recipe_id = match row {
        Some(row) => row.0,
        None => {
            return Err(
                ErrorKind::AlreadyExists.new("Recipe with this name already exists")
            )
        }
    };

    write_children(&mut tr, recipe_id, &draft).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    get_recipe_view(recipe_id, Some(session.user_id), pool)
        .await?
        .ok_or(ErrorKind::Internal.new("Recipe vanished after creation"))
}

/// A concurrent rename can slip past the pre-check and hit the
/// `(author_id, name)` constraint inside the transaction.
fn conflict_on_unique(e: sqlx::Error, info: &str) -> Error {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => ErrorKind::AlreadyExists.new(info),
        _ => QueryError::from(e).into(),
    }
}

/// Wholesale replace: scalars are updated and both child sets are deleted
/// and recreated from the draft, all inside one transaction.
pub async fn update_recipe(
    id: Uuid,
    session: &SessionData,
    draft: RecipeDraft,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, Error> {
    let recipe = get_recipe_mut(id, session, pool).await?;
    draft.validate()?;
    ensure_tags_exist(&draft.tags, pool).await?;

    if let Some(existing) = find_recipe(recipe.author_id, &draft.name, pool).await? {
        if existing != id {
            return Err(
                ErrorKind::AlreadyExists.new("Recipe with this name already exists")
            );
        }
    }

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    sqlx::query(
        "UPDATE recipes SET name = $1, text = $2, image = $3, cooking_time = $4 WHERE id = $5",
    )
    .bind(&draft.name)
    .bind(&draft.text)
    .bind(&draft.image)
    .bind(draft.cooking_time)
    .bind(id)
    .execute(&mut *tr)
    .await
    .map_err(|e| conflict_on_unique(e, "Recipe with this name already exists"))?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    write_children(&mut tr, id, &draft).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    get_recipe_view(id, Some(session.user_id), pool)
        .await?
        .ok_or(ErrorKind::Internal.new("Recipe vanished after update"))
}

pub async fn delete_recipe(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    get_recipe_mut(id, session, pool).await?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    for table in ["recipe_ingredients", "recipe_tags", "favorites", "cart_entries"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE recipe_id = $1"))
            .bind(id)
            .execute(&mut *tr)
            .await
            .map_err(|e| QueryError::from(e).into())?;
    }

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct DuplicateKey;

    impl std::fmt::Display for DuplicateKey {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "duplicate key value violates unique constraint")
        }
    }

    impl std::error::Error for DuplicateKey {}

    impl sqlx::error::DatabaseError for DuplicateKey {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn concurrent_rename_collision_surfaces_as_a_conflict() {
        let error = conflict_on_unique(
            sqlx::Error::Database(Box::new(DuplicateKey)),
            "Recipe with this name already exists",
        );

        assert_eq!(error.kind, ErrorKind::AlreadyExists);
        assert_eq!(error.code, 400);
        assert_eq!(
            error.info.as_deref(),
            Some("Recipe with this name already exists")
        );
    }

    #[test]
    fn other_database_failures_stay_internal() {
        let error = conflict_on_unique(sqlx::Error::RowNotFound, "unused");
        assert_eq!(error.kind, ErrorKind::Internal);
    }
}
