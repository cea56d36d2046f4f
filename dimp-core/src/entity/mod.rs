// SPDX-License-Identifier: MIT OR Apache-2.0

//! Users, groups and the registry caching them.
//!
//! [`User`] and [`Group`] do not store anything besides their ID. Every method takes the data
//! source to ask as an argument, so the same view can be used with different storage backends
//! and never outlives or dangles from one.
mod barrack;
mod data_source;
mod group;
mod user;

pub use barrack::{Barrack, EvictionPolicy};
pub use data_source::{
    Archivist, EntityDataSource, GroupDataSource, UserDataSource, find_founder, verification_keys,
    verified_bulletin, verified_visa,
};
pub use group::Group;
pub use user::User;
