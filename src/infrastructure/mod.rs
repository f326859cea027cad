pub mod axum_http;
pub mod gateway;
pub mod postgres;
pub mod storages;
