pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const SUBSCRIPTION_COUNT_PER_PAGE: i64 = 6;
pub const INGREDIENT_SEARCH_LIMIT: i64 = 50;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MIN_INGREDIENT_AMOUNT: i32 = 1;

pub const REPORT_TITLE: &str = "FoodGram";
pub const REPORT_RULE: &str = "-------------------";
pub const REPORT_DATE_FORMAT: &str = "%d-%m-%Y";
pub const REPORT_CSV_HEADER: &str = "name,measurement_unit,amount";

pub const SESSION_COOKIE: &str = "session";
