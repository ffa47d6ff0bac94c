use std::{collections::HashMap, str::FromStr};

use serde_json::Value;

use super::error::{Error, TypeError};
use super::schema::{IngredientAmount, RecipeDraft, Uuid};

pub type FormData = HashMap<String, Value>;

/// Loosely typed request body, decoded field by field by the route layer.
pub struct Form {
    inner: HashMap<String, Value>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_value<T>(&self, key: &str) -> Result<T, Error>
    where
        T: TryFrom<Value>,
    {
        match self.inner.get(key) {
            Some(value) => value
                .to_owned()
                .try_into()
                .map_err(|_e| TypeError::new("Invalid type conversion").into()),
            None => Err(TypeError::new("Invalid key").into()),
        }
    }

    /// Accepts both JSON numbers and numeric strings, since the legacy
    /// clients send either.
    pub fn get_number<T>(&self, key: &str) -> Result<T, Error>
    where
        T: FromStr,
    {
        let value = self
            .inner
            .get(key)
            .ok_or(TypeError::new("Invalid key"))
            .map_err(|e| -> Error { e.into() })?;

        let raw = match value {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.to_owned(),
            _ => return Err(TypeError::new("Failed to parse value as number").into()),
        };

        raw.parse()
            .map_err(|_e| TypeError::new("Invalid type conversion").into())
    }

    pub fn get_str(&self, key: &str) -> Result<String, TypeError> {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => Ok(v.to_string()),
                None => Err(TypeError::new("Invalid key")),
            },
            None => Err(TypeError::new("Invalid key")),
        }
    }

    pub fn get_list<T>(&self, key: &str) -> Result<Vec<T>, Error>
    where
        T: TryFrom<Value, Error = TypeError>,
    {
        match self.inner.get(key).and_then(|v| v.as_array()) {
            Some(values) => values
                .iter()
                .map(|value| T::try_from(value.to_owned()).map_err(|e| e.into()))
                .collect(),
            None => Err(TypeError::new("Invalid key").into()),
        }
    }

    pub fn get_ids(&self, key: &str) -> Result<Vec<Uuid>, Error> {
        match self.inner.get(key).and_then(|v| v.as_array()) {
            Some(values) => values
                .iter()
                .map(|value| {
                    value
                        .as_i64()
                        .map(|id| id as Uuid)
                        .ok_or(TypeError::new("Invalid id").into())
                })
                .collect(),
            None => Err(TypeError::new("Invalid key").into()),
        }
    }
}

impl TryFrom<&Form> for RecipeDraft {
    type Error = Error;

    fn try_from(form: &Form) -> Result<Self, Self::Error> {
        Ok(Self {
            name: form.get_str("name").map_err(|e| -> Error { e.into() })?,
            text: form.get_str("text").map_err(|e| -> Error { e.into() })?,
            image: form.get_str("image").map_err(|e| -> Error { e.into() })?,
            cooking_time: form.get_number("cooking_time")?,
            ingredients: form.get_list::<IngredientAmount>("ingredients")?,
            tags: form.get_ids("tags")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recipe_form() -> Form {
        let data: FormData = [
            (String::from("name"), json!("Soup")),
            (String::from("text"), json!("Boil everything.")),
            (String::from("image"), json!("media/soup.png")),
            (String::from("cooking_time"), json!(30)),
            (
                String::from("ingredients"),
                json!([{ "id": 1, "amount": 5 }, { "id": 2, "amount": 500 }]),
            ),
            (String::from("tags"), json!([1, 2])),
        ]
        .into();

        Form::from_data(data)
    }

    #[test]
    fn recipe_draft_decodes_from_form() {
        let draft = RecipeDraft::try_from(&recipe_form()).unwrap();
        assert_eq!(draft.name, "Soup");
        assert_eq!(draft.cooking_time, 30);
        assert_eq!(draft.ingredients.len(), 2);
        assert_eq!(draft.ingredients[1], IngredientAmount { id: 2, amount: 500 });
        assert_eq!(draft.tags, vec![1, 2]);
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let data: FormData = [(String::from("cooking_time"), json!("45"))].into();
        let form = Form::from_data(data);
        assert_eq!(form.get_number::<i32>("cooking_time").unwrap(), 45);
    }

    #[test]
    fn missing_key_is_an_error() {
        let form = Form::from_data(FormData::new());
        assert!(form.get_str("name").is_err());
        assert!(form.get_ids("tags").is_err());
        assert!(RecipeDraft::try_from(&form).is_err());
    }

    #[test]
    fn malformed_ingredient_is_an_error() {
        let data: FormData = [(String::from("ingredients"), json!([{ "id": 1 }]))].into();
        let form = Form::from_data(data);
        assert!(form.get_list::<IngredientAmount>("ingredients").is_err());
    }
}
