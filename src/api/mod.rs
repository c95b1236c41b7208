pub mod handlers;
pub mod mime;
pub mod models;
pub mod routes;
