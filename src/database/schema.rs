use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{MIN_COOKING_TIME, MIN_INGREDIENT_AMOUNT};

use super::error::{Error, ErrorKind, TypeError};

pub type Uuid = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: UserRole,
}

/// Public projection of a user, as embedded in recipe and subscription views.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
}

/// Recipe list row with the window-function total for pagination.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,

    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeShort {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<Recipe> for RecipeShort {
    fn from(value: Recipe) -> Self {
        Self {
            id: value.id,
            name: value.name,
            image: value.image,
            cooking_time: value.cooking_time,
        }
    }
}

/// One (ingredient, amount) pair of a recipe, resolved against the catalog.
/// `amount` is nullable in the legacy dataset and counts as 0 when absent.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeIngredient {
    pub recipe_id: Uuid,
    pub ingredient_id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: Option<i32>,
}

/// Fully populated recipe as returned by reads and mutations.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeView {
    pub id: Uuid,
    pub author: Profile,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub ingredients: Vec<RecipeIngredient>,
    pub tags: Vec<Tag>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub recipes_count: i64,

    pub count: i64,
}

/// Raw cart row fed into the shopping-list aggregation.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct ShoppingListRow {
    pub name: String,
    pub measurement_unit: String,
    pub amount: Option<i32>,
}

/// Aggregated (ingredient, unit) total across all cart recipes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientAmount {
    pub id: Uuid,
    pub amount: i32,
}

impl TryFrom<Value> for IngredientAmount {
    type Error = TypeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let id = value
            .get("id")
            .and_then(|v| v.as_i64())
            .ok_or(TypeError::new("Invalid ingredient id"))?;
        let amount = value
            .get("amount")
            .and_then(|v| v.as_i64())
            .ok_or(TypeError::new("Ingredient quantity must be a number"))?;

        Ok(Self {
            id: id as Uuid,
            amount: amount as i32,
        })
    }
}

/// Submitted recipe payload for create and update. The ingredient and tag
/// sets always replace the stored ones wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<Uuid>,
}

impl RecipeDraft {
    /// Checks the payload before anything is written. Referential checks
    /// against the tag table happen separately in the mutation service.
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(ErrorKind::Validation.new("Recipe name must not be empty"));
        }

        if self.cooking_time < MIN_COOKING_TIME {
            return Err(
                ErrorKind::Validation.new("Cooking time must not be less than 1 minute")
            );
        }

        if self.ingredients.is_empty() {
            return Err(ErrorKind::Validation.new("Ingredient must be added"));
        }

        let mut seen: HashSet<Uuid> = HashSet::new();
        for ingredient in self.ingredients.iter() {
            if ingredient.amount < MIN_INGREDIENT_AMOUNT {
                return Err(
                    ErrorKind::Validation.new("Ingredient quantity must be greater than 0")
                );
            }
            if !seen.insert(ingredient.id) {
                return Err(ErrorKind::Validation.new("duplicate ingredient"));
            }
        }

        if self.tags.is_empty() {
            return Err(ErrorKind::Validation.new("Tag must be added"));
        }

        let unique_tags: HashSet<Uuid> = self.tags.iter().copied().collect();
        if unique_tags.len() < self.tags.len() {
            return Err(ErrorKind::Validation.new("Tags should be unique"));
        }

        Ok(())
    }
}
