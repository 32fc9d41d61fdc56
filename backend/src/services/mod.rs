pub mod landscape;
pub mod normalize;
pub mod profiles;
pub mod radar;
pub mod rate_limiter;
