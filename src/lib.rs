pub mod api;
pub mod authz;
pub mod blacklist;
pub mod config;
pub mod error;
pub mod links;
pub mod models;
pub mod redirect;
pub mod slug;
pub mod stats;
pub mod storage;
