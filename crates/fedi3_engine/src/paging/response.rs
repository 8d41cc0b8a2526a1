/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::Serialize;

use super::{Page, PageKey};

/// A page of items plus the links a client follows for the neighbouring
/// pages.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageableResponse<I> {
    pub items: Vec<I>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_link: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prev_link: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub link_header: String,
}

pub struct ResponseParams<'a, I, T> {
    /// Already sorted.
    pub items: Vec<I>,
    pub proto: &'a str,
    pub host: &'a str,
    pub path: &'a str,
    pub next: Option<Page<T>>,
    pub prev: Option<Page<T>>,
    /// Extra `key=value` query parameters repeated in both links.
    pub query: Vec<String>,
}

pub fn package_response<I, T: PageKey>(params: ResponseParams<'_, I, T>) -> PageableResponse<I> {
    if params.items.is_empty() {
        return empty_response();
    }

    let link = |p: &Option<Page<T>>| {
        p.as_ref()
            .map(|p| p.to_link(params.proto, params.host, params.path, &params.query))
            .unwrap_or_default()
    };
    let next_link = link(&params.next);
    let prev_link = link(&params.prev);

    let mut parts = Vec::with_capacity(2);
    if !next_link.is_empty() {
        parts.push(format!("<{next_link}>; rel=\"next\""));
    }
    if !prev_link.is_empty() {
        parts.push(format!("<{prev_link}>; rel=\"prev\""));
    }

    PageableResponse {
        items: params.items,
        next_link,
        prev_link,
        link_header: parts.join(", "),
    }
}

pub fn empty_response<I>() -> PageableResponse<I> {
    PageableResponse {
        items: Vec::new(),
        next_link: String::new(),
        prev_link: String::new(),
        link_header: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::{max_id, min_id};

    #[test]
    fn empty_items_have_no_links() {
        let page = Page::new(min_id("", ""), max_id("01"), 10);
        let resp: PageableResponse<u8> = package_response(ResponseParams {
            items: vec![],
            proto: "https",
            host: "example.org",
            path: "/api/v1/notifications",
            next: Some(page.clone()),
            prev: Some(page),
            query: vec![],
        });
        assert_eq!(resp, empty_response());
    }

    #[test]
    fn link_header_lists_next_then_prev() {
        let page = Page::new(min_id("", "0"), max_id(""), 2);
        let resp = package_response(ResponseParams {
            items: vec!["b", "a"],
            proto: "https",
            host: "example.org",
            path: "/api/v1/notifications",
            next: page.next("a".to_string()),
            prev: page.prev("b".to_string()),
            query: vec![],
        });
        assert_eq!(
            resp.link_header,
            "<https://example.org/api/v1/notifications?max_id=a&limit=2>; rel=\"next\", \
             <https://example.org/api/v1/notifications?since_id=b&limit=2>; rel=\"prev\""
        );
    }
}
