pub mod extract;
pub mod geo;
pub mod jwt;
pub mod password;
pub mod query_features;
pub mod response;
pub mod upload;
