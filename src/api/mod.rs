pub mod handlers;
pub mod principal;
pub mod routes;

pub use routes::create_api_router;
