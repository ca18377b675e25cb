//! API Documentation module
//!
//! OpenAPI specification generation using utoipa.

mod openapi;

pub use openapi::CourierApiDoc;
