//! Application services: listings, authoring, accounts and group administration.

pub mod accounts;
pub mod authoring;
pub mod error;
pub mod feed;
pub mod groups;
pub mod pagination;
pub mod repos;
