use std::collections::BTreeMap;

use chrono::Local;
use sqlx::{Pool, Postgres};

use crate::{
    constants::{REPORT_CSV_HEADER, REPORT_DATE_FORMAT, REPORT_RULE, REPORT_TITLE},
    error::{Error, QueryError},
    schema::{ShoppingListItem, ShoppingListRow, Uuid},
};

pub async fn fetch_shopping_list_rows(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListRow>, Error> {
    let rows: Vec<ShoppingListRow> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM cart_entries c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub async fn count_cart_recipes(user_id: Uuid, pool: &Pool<Postgres>) -> Result<i64, Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_entries WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row.0)
}

/// Sums amounts per (name, unit) pair. The same ingredient appearing in two
/// cart recipes accumulates; a missing amount counts as 0. Output order is
/// by name ascending, then unit, so repeated reports are identical.
pub fn aggregate(rows: Vec<ShoppingListRow>) -> Vec<ShoppingListItem> {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();

    for row in rows {
        let amount = row.amount.unwrap_or(0) as i64;
        *totals.entry((row.name, row.measurement_unit)).or_insert(0) += amount;
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), amount)| ShoppingListItem {
            name,
            measurement_unit,
            amount,
        })
        .collect()
}

pub fn render_plain(items: &[ShoppingListItem], recipe_count: i64, date: &str) -> String {
    let mut text = format!(
        "{REPORT_TITLE}\nRecipes in cart: {recipe_count}\n{REPORT_RULE}\n{date}\nYour shopping list:\n{REPORT_RULE}"
    );

    for item in items {
        text.push_str(&format!(
            "\n{} ({}) — {}",
            item.name, item.measurement_unit, item.amount
        ));
    }

    text
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn render_csv(items: &[ShoppingListItem]) -> String {
    let mut text = String::from(REPORT_CSV_HEADER);

    for item in items {
        text.push_str(&format!(
            "\n{},{},{}",
            csv_field(&item.name),
            csv_field(&item.measurement_unit),
            item.amount
        ));
    }

    text
}

/// Aggregated report over the caller's cart. An empty cart renders a report
/// with no item lines rather than failing. The caller is always an
/// authenticated user; the session filter rejects anonymous requests before
/// storage is touched.
pub async fn build_shopping_list(user_id: Uuid, pool: &Pool<Postgres>) -> Result<String, Error> {
    let rows = fetch_shopping_list_rows(user_id, pool).await?;
    let recipe_count = count_cart_recipes(user_id, pool).await?;
    let items = aggregate(rows);

    let date = Local::now().format(REPORT_DATE_FORMAT).to_string();
    Ok(render_plain(&items, recipe_count, &date))
}

pub async fn build_shopping_list_csv(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let rows = fetch_shopping_list_rows(user_id, pool).await?;
    let items = aggregate(rows);

    Ok(render_csv(&items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, unit: &str, amount: Option<i32>) -> ShoppingListRow {
        ShoppingListRow {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn duplicate_ingredient_across_recipes_accumulates() {
        let items = aggregate(vec![
            row("flour", "g", Some(200)),
            row("sugar", "g", Some(50)),
            row("flour", "g", Some(300)),
        ]);

        assert_eq!(
            items,
            vec![
                ShoppingListItem {
                    name: String::from("flour"),
                    measurement_unit: String::from("g"),
                    amount: 500,
                },
                ShoppingListItem {
                    name: String::from("sugar"),
                    measurement_unit: String::from("g"),
                    amount: 50,
                },
            ]
        );
    }

    #[test]
    fn same_name_different_unit_stays_separate() {
        let items = aggregate(vec![
            row("milk", "ml", Some(200)),
            row("milk", "g", Some(100)),
        ]);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].measurement_unit, "g");
        assert_eq!(items[1].measurement_unit, "ml");
    }

    #[test]
    fn missing_amount_counts_as_zero() {
        let items = aggregate(vec![row("salt", "g", None), row("salt", "g", Some(5))]);
        assert_eq!(items[0].amount, 5);
    }

    #[test]
    fn empty_cart_aggregates_to_nothing() {
        assert!(aggregate(vec![]).is_empty());
    }

    #[test]
    fn ordering_is_deterministic_and_case_sensitive() {
        let forward = aggregate(vec![
            row("Zucchini", "g", Some(1)),
            row("apple", "g", Some(1)),
            row("Banana", "g", Some(1)),
        ]);
        let reverse = aggregate(vec![
            row("Banana", "g", Some(1)),
            row("apple", "g", Some(1)),
            row("Zucchini", "g", Some(1)),
        ]);

        assert_eq!(forward, reverse);
        // Uppercase sorts before lowercase in byte order.
        let names: Vec<&str> = forward.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Banana", "Zucchini", "apple"]);
    }

    #[test]
    fn plain_report_has_header_and_item_lines() {
        let items = aggregate(vec![
            row("flour", "g", Some(200)),
            row("flour", "g", Some(300)),
        ]);
        let report = render_plain(&items, 2, "01-05-2024");

        assert!(report.starts_with("FoodGram\nRecipes in cart: 2\n"));
        assert!(report.contains("01-05-2024"));
        assert!(report.ends_with("\nflour (g) — 500"));
    }

    #[test]
    fn empty_report_is_just_the_header() {
        let report = render_plain(&[], 0, "01-05-2024");
        assert!(report.starts_with("FoodGram\nRecipes in cart: 0\n"));
        assert!(report.ends_with(REPORT_RULE));
    }

    #[test]
    fn csv_escapes_embedded_commas() {
        let items = vec![ShoppingListItem {
            name: String::from("eggs, boiled"),
            measurement_unit: String::from("pcs"),
            amount: 4,
        }];
        let report = render_csv(&items);

        assert_eq!(
            report,
            "name,measurement_unit,amount\n\"eggs, boiled\",pcs,4"
        );
    }
}
