pub mod link;
pub mod principal;

pub use link::{CreateLinkRequest, GroupRef, Link, LinkChanges, NewLink, UpdateLinkRequest};
pub use principal::{permissions, GroupMembership, Principal};
