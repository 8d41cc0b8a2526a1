/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use super::{zero, PageKey};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    None,
    Ascending,
    Descending,
}

impl Order {
    pub fn is_none(&self) -> bool {
        *self == Order::None
    }
}

/// One side of a page: a query name, an exclusive bound and the order the
/// name implies.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Boundary<T> {
    pub name: &'static str,
    pub value: T,
    pub order: Order,
}

impl<T: PageKey> Boundary<T> {
    /// Same name and order, new value.
    pub fn new_value(&self, value: T) -> Self {
        Self {
            name: self.name,
            value,
            order: self.order,
        }
    }

    /// Index of the boundary value in `input`, if set and present.
    pub fn find(&self, input: &[T]) -> Option<usize> {
        if zero(&self.value) {
            return None;
        }
        input.iter().position(|v| *v == self.value)
    }

    /// `name=value` query parameter, empty for an unset boundary.
    pub fn query(&self) -> String {
        if zero(&self.value) || self.name.is_empty() {
            return String::new();
        }
        format!(
            "{}={}",
            self.name,
            urlencoding::encode(&self.value.to_string())
        )
    }
}

/// Minimum boundary for ID paging. `since_id` wins over `min_id` and
/// returns items newest first; `min_id` returns them oldest first.
pub fn min_id(min: &str, since: &str) -> Boundary<String> {
    if !since.is_empty() {
        return Boundary {
            name: "since_id",
            value: since.to_string(),
            order: Order::Descending,
        };
    }
    Boundary {
        name: "min_id",
        value: min.to_string(),
        order: Order::Ascending,
    }
}

pub fn max_id(max: &str) -> Boundary<String> {
    Boundary {
        name: "max_id",
        value: max.to_string(),
        order: Order::None,
    }
}

pub fn min_shortcode_domain(min: &str) -> Boundary<String> {
    Boundary {
        name: "min_shortcode_domain",
        value: min.to_string(),
        order: Order::Descending,
    }
}

pub fn max_shortcode_domain(max: &str) -> Boundary<String> {
    Boundary {
        name: "max_shortcode_domain",
        value: max.to_string(),
        order: Order::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_takes_precedence_over_min() {
        let b = min_id("01", "02");
        assert_eq!(b.name, "since_id");
        assert_eq!(b.order, Order::Descending);
        let b = min_id("01", "");
        assert_eq!(b.name, "min_id");
        assert_eq!(b.order, Order::Ascending);
    }

    #[test]
    fn unset_boundary_matches_nothing() {
        let b = max_id("");
        assert_eq!(b.find(&["".to_string(), "a".to_string()]), None);
        assert_eq!(b.query(), "");
        let b = max_id("a b");
        assert_eq!(b.query(), "max_id=a%20b");
    }
}
