pub mod constants;
pub mod db_connect;
pub mod env;
pub mod errors;
pub mod serving_config;
