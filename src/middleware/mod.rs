pub mod auth;
pub mod normalize;
pub mod rate_limit;
pub mod sanitize;
pub mod validate;
