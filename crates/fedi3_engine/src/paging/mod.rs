/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Cursor paging over ordered, comparable keys.
//!
//! A [`Page`] holds an exclusive minimum and maximum [`Boundary`] plus a
//! limit. The boundary that was used to build the page decides the order in
//! which items come back (`since_id` pages descend, `min_id` pages ascend).
//! Pages are immutable: continuing is done by deriving a fresh page with
//! [`Page::next`] or [`Page::prev`].

mod boundary;
mod page;
mod response;

pub use boundary::{
    max_id, max_shortcode_domain, min_id, min_shortcode_domain, Boundary, Order,
};
pub use page::Page;
pub use response::{empty_response, package_response, PageableResponse, ResponseParams};

/// Types usable as page keys. The `Default` value is the "unset" value
/// meaning "no bound on that side".
pub trait PageKey: Clone + PartialEq + Default + std::fmt::Display {}

impl<T> PageKey for T where T: Clone + PartialEq + Default + std::fmt::Display {}

pub(crate) fn zero<T: PageKey>(v: &T) -> bool {
    *v == T::default()
}
