/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use super::{zero, Boundary, Order, PageKey};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page<T> {
    pub min: Boundary<T>,
    pub max: Boundary<T>,
    /// At most this many items per page; 0 means unlimited.
    pub limit: usize,
}

impl<T: PageKey> Page<T> {
    pub fn new(min: Boundary<T>, max: Boundary<T>, limit: usize) -> Self {
        Self { min, max, limit }
    }

    pub fn get_min(&self) -> Option<&T> {
        (!zero(&self.min.value)).then_some(&self.min.value)
    }

    pub fn get_max(&self) -> Option<&T> {
        (!zero(&self.max.value)).then_some(&self.max.value)
    }

    pub fn get_limit(&self) -> Option<usize> {
        (self.limit > 0).then_some(self.limit)
    }

    /// The minimum boundary decides order when it has one, since that is
    /// where `since_id` / `min_id` live.
    pub fn order(&self) -> Order {
        if !self.min.order.is_none() {
            return self.min.order;
        }
        self.max.order
    }

    /// Pages `input`, which MUST be sorted ascending (oldest first).
    pub fn page_asc(&self, input: &[T]) -> Vec<T> {
        let mut items = input;
        if let Some(i) = self.min.find(items) {
            items = &items[i + 1..];
        }
        if let Some(i) = self.max.find(items) {
            items = &items[..i];
        }

        let mut out = items.to_vec();
        if self.order() == Order::Descending {
            out.reverse();
        }
        self.truncate(out)
    }

    /// Pages `input`, which MUST be sorted descending (newest first).
    pub fn page_desc(&self, input: &[T]) -> Vec<T> {
        let mut items = input;
        if let Some(i) = self.max.find(items) {
            items = &items[i + 1..];
        }
        if let Some(i) = self.min.find(items) {
            items = &items[..i];
        }

        let mut out = items.to_vec();
        if self.order() == Order::Ascending {
            out.reverse();
        }
        self.truncate(out)
    }

    fn truncate(&self, mut out: Vec<T>) -> Vec<T> {
        if self.limit > 0 && self.limit < out.len() {
            out.truncate(self.limit);
        }
        out
    }

    /// Page following this one, continuing from the last returned item.
    ///
    /// Ascending pages move their minimum boundary forward; every other page
    /// moves its maximum boundary back. Boundary names and the limit carry
    /// over. `None` when `last` is the unset value.
    pub fn next(&self, last: T) -> Option<Self> {
        if zero(&last) {
            return None;
        }
        if self.order() == Order::Ascending {
            return Some(Self {
                min: self.min.new_value(last),
                max: self.max.new_value(T::default()),
                limit: self.limit,
            });
        }
        Some(Self {
            min: self.min.new_value(T::default()),
            max: self.max.new_value(last),
            limit: self.limit,
        })
    }

    /// Page preceding this one, starting from the first returned item.
    pub fn prev(&self, first: T) -> Option<Self> {
        if zero(&first) {
            return None;
        }
        if self.order() == Order::Ascending {
            return Some(Self {
                min: self.min.new_value(T::default()),
                max: self.max.new_value(first),
                limit: self.limit,
            });
        }
        Some(Self {
            min: self.min.new_value(first),
            max: self.max.new_value(T::default()),
            limit: self.limit,
        })
    }

    /// URL for this page at `proto://host/path`, with extra query
    /// parameters in `key=value` form. Empty when the page has no bounds.
    pub fn to_link(&self, proto: &str, host: &str, path: &str, query: &[String]) -> String {
        let mut params: Vec<String> = query.to_vec();
        let before = params.len();
        let min = self.min.query();
        if !min.is_empty() {
            params.push(min);
        }
        let max = self.max.query();
        if !max.is_empty() {
            params.push(max);
        }
        if params.len() == before {
            return String::new();
        }
        if self.limit > 0 {
            params.push(format!("limit={}", self.limit));
        }
        format!(
            "{proto}://{host}/{}?{}",
            path.trim_start_matches('/'),
            params.join("&")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::{max_id, min_id};

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{i:04}")).collect()
    }

    #[test]
    fn bounds_are_exclusive() {
        let input = ids(10);
        let page = Page::new(min_id("0003", ""), max_id("0007"), 0);
        assert_eq!(page.page_asc(&input), vec!["0004", "0005", "0006"]);
    }

    #[test]
    fn since_id_returns_newest_first() {
        let input = ids(10);
        let page = Page::new(min_id("", "0003"), max_id(""), 2);
        assert_eq!(page.page_asc(&input), vec!["0010", "0009"]);

        let mut desc = input.clone();
        desc.reverse();
        assert_eq!(page.page_desc(&desc), vec!["0010", "0009"]);
    }

    #[test]
    fn min_id_on_descending_input_reverses() {
        let mut desc = ids(6);
        desc.reverse();
        let page = Page::new(min_id("0002", ""), max_id(""), 2);
        assert_eq!(page.page_desc(&desc), vec!["0003", "0004"]);
    }

    #[test]
    fn next_of_zero_is_none() {
        let page: Page<String> = Page::new(min_id("", ""), max_id(""), 5);
        assert!(page.next(String::new()).is_none());
        assert!(page.prev(String::new()).is_none());
    }

    #[test]
    fn ascending_enumeration_visits_everything_once() {
        for n in [0usize, 1, 7, 20] {
            for limit in 1..=8 {
                let input = ids(n);
                let mut page = Page::new(min_id("", ""), max_id(""), limit);
                let mut seen = Vec::new();
                loop {
                    let items = page.page_asc(&input);
                    let Some(last) = items.last().cloned() else { break };
                    seen.extend(items);
                    match page.next(last) {
                        Some(p) => page = p,
                        None => break,
                    }
                }
                assert_eq!(seen, input, "n={n} limit={limit}");
            }
        }
    }

    #[test]
    fn descending_enumeration_visits_everything_once() {
        let mut desc = ids(13);
        desc.reverse();
        let mut page = Page::new(min_id("", "0000"), max_id(""), 4);
        let mut seen = Vec::new();
        loop {
            let items = page.page_desc(&desc);
            let Some(last) = items.last().cloned() else { break };
            seen.extend(items);
            page = page.next(last).expect("non-zero");
        }
        assert_eq!(seen, desc);
    }

    #[test]
    fn next_preserves_names_and_limit() {
        let page = Page::new(min_id("", "0001"), max_id(""), 3);
        let next = page.next("0005".to_string()).unwrap();
        assert_eq!(next.max.name, "max_id");
        assert_eq!(next.get_max().map(String::as_str), Some("0005"));
        assert_eq!(next.order(), Order::Descending);
        assert_eq!(next.limit, 3);

        let prev = page.prev("0009".to_string()).unwrap();
        assert_eq!(prev.min.name, "since_id");
        assert_eq!(prev.get_min().map(String::as_str), Some("0009"));
    }

    #[test]
    fn link_contains_bounds_and_limit() {
        let page = Page::new(min_id("", ""), max_id("0042"), 20);
        let link = page.to_link(
            "https",
            "example.org",
            "/api/v1/timelines/home",
            &["local=true".to_string()],
        );
        assert_eq!(
            link,
            "https://example.org/api/v1/timelines/home?local=true&max_id=0042&limit=20"
        );
        let unbounded: Page<String> = Page::new(min_id("", ""), max_id(""), 20);
        assert_eq!(unbounded.to_link("https", "h", "/p", &[]), "");
    }
}
