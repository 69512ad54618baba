mod get_health;
mod post_query;
mod post_sql;

pub use get_health::get_health;
pub use post_query::post_query;
pub use post_sql::post_sql;
