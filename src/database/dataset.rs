use sqlx::{Pool, Postgres, QueryBuilder};

use super::error::{Error, QueryError, TypeError};

/*
Ingredient reference dataset

One `name,measurement_unit` record per line. Names may themselves contain
commas, so the unit is whatever follows the last one:

    абрикосовое варенье,г
    яйца, отварные,шт
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientRecord {
    pub name: String,
    pub measurement_unit: String,
}

impl TryFrom<String> for IngredientRecord {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let line = value.trim();
        let (name, unit) = line
            .rsplit_once(',')
            .ok_or(TypeError::new("Invalid record; missing measurement unit"))?;

        let name = name.trim();
        let unit = unit.trim();
        if name.is_empty() || unit.is_empty() {
            return Err(TypeError::new("Invalid record; empty field"));
        }

        Ok(Self {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
        })
    }
}

/// Parses the whole dataset, returning the records and the count of lines
/// that were skipped as malformed. Blank lines and the optional
/// `name,measurement_unit` header do not count as malformed.
pub fn parse_ingredient_dataset(data: &str) -> (Vec<IngredientRecord>, usize) {
    let mut records = vec![];
    let mut skipped = 0;

    for line in data.lines() {
        if line.trim().is_empty() || line.trim() == "name,measurement_unit" {
            continue;
        }

        match IngredientRecord::try_from(line.to_string()) {
            Ok(record) => records.push(record),
            Err(_) => skipped += 1,
        }
    }

    (records, skipped)
}

/// Bulk-loads the reference dataset into the catalog. Records already
/// present keep their ids; returns how many rows were actually inserted.
pub async fn import_ingredients(data: &str, pool: &Pool<Postgres>) -> Result<u64, Error> {
    let (records, skipped) = parse_ingredient_dataset(data);
    if skipped > 0 {
        log::warn!("Skipped {skipped} malformed ingredient records");
    }
    if records.is_empty() {
        return Ok(0);
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");

    query_builder.push_values(records.iter().take(65535 / 2), |mut b, record| {
        b.push_bind(&record.name).push_bind(&record.measurement_unit);
    });
    query_builder.push(" ON CONFLICT (name, measurement_unit) DO NOTHING");

    let result = query_builder
        .build()
        .execute(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    log::info!("{} ingredients loaded", result.rows_affected());

    Ok(result.rows_affected())
}
