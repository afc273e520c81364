//! The library code for the `postmill` blog content pipeline. A build runs in
//! three steps:
//!
//! 1. Loading post files from the content directory ([`crate::load`])
//! 2. Parsing them into [`post::Post`]s ([`crate::parser`]) and indexing the
//!    published ones ([`crate::index`])
//! 3. Deriving artifacts from the index and writing them to disk
//!
//! The third step is composed of several independent builders which only
//! read the index: paginated listing and tag pages ([`crate::page`]), an Atom
//! feed ([`crate::feed`]) and a search index ([`crate::search`]). Pages are
//! serialized as JSON ([`crate::write`]) for a front end to render.
//!
//! [`build::build_site`] ties the steps together.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod feed;
pub mod index;
pub mod load;
pub mod markdown;
pub mod page;
pub mod parser;
pub mod post;
pub mod search;
pub mod tag;
pub mod util;
pub mod write;
