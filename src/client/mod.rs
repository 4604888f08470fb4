// HTTP client for REST APIs
//
// Provides RestClient for JSON/form request-response cycles against product
// APIs and OAuth2 token endpoints.

mod rest;

pub use rest::{basic_auth_header, resolve_endpoint, Body, Endpoint, RestClient};
