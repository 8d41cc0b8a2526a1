/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Paged reads for local accounts.

use anyhow::{Context, Result};

use super::Processor;
use crate::error::{optional, Error};
use crate::model::{Account, Notification, Status};
use crate::paging::{package_response, Page, PageableResponse, ResponseParams};

impl Processor {
    fn respond<I>(
        &self,
        page: &Page<String>,
        path: &str,
        items: Vec<I>,
        first: Option<String>,
        last: Option<String>,
    ) -> PageableResponse<I> {
        package_response(ResponseParams {
            items,
            proto: &self.protocol,
            host: &self.host,
            path,
            next: last.and_then(|id| page.next(id)),
            prev: first.and_then(|id| page.prev(id)),
            query: Vec::new(),
        })
    }

    async fn keep_visible(&self, owner: &Account, statuses: Vec<Status>) -> Result<Vec<Status>> {
        let mut out = Vec::with_capacity(statuses.len());
        for s in statuses {
            if !self.visibility.status_visible(Some(owner), &s).await? {
                continue;
            }
            if self.mutes.status_muted(Some(owner), &s).await? {
                continue;
            }
            out.push(s);
        }
        Ok(out)
    }

    /// `owner`'s home timeline, newest first. Paging cursors come from the
    /// unfiltered page so hidden items are never served twice or skipped.
    pub async fn home_timeline(&self, owner: &Account, page: &Page<String>) -> Result<PageableResponse<Status>> {
        let statuses = self
            .home
            .get_timeline(&self.db, &owner.id, page, || self.db.get_home_timeline(&owner.id, page))
            .await
            .context("home timeline")?;
        let first = statuses.first().map(|s| s.id.clone());
        let last = statuses.last().map(|s| s.id.clone());
        let items = self.keep_visible(owner, statuses).await?;
        Ok(self.respond(page, "/api/v1/timelines/home", items, first, last))
    }

    pub async fn list_timeline(
        &self,
        owner: &Account,
        list_id: &str,
        page: &Page<String>,
    ) -> Result<PageableResponse<Status>> {
        let list = self.db.get_list_by_id(list_id).await.context("get list")?;
        if list.account_id != owner.id {
            return Err(Error::NotFound.into());
        }
        let statuses = self
            .lists
            .get_timeline(&self.db, list_id, page, || self.db.get_list_timeline(list_id, page))
            .await
            .context("list timeline")?;
        let first = statuses.first().map(|s| s.id.clone());
        let last = statuses.last().map(|s| s.id.clone());
        let items = self.keep_visible(owner, statuses).await?;
        Ok(self.respond(page, &format!("/api/v1/timelines/list/{list_id}"), items, first, last))
    }

    pub async fn notifications(
        &self,
        owner: &Account,
        page: &Page<String>,
    ) -> Result<PageableResponse<Notification>> {
        let mut items = self
            .db
            .get_account_notifications(&owner.id, page)
            .await
            .context("notifications")?;
        let first = items.first().map(|n| n.id.clone());
        let last = items.last().map(|n| n.id.clone());

        let mut kept = Vec::with_capacity(items.len());
        for n in items.drain(..) {
            let Some(origin) = optional(self.db.get_account_by_id(&n.origin_account_id).await)? else {
                continue;
            };
            if self
                .mutes
                .account_notifications_muted(Some(owner), &origin)
                .await?
            {
                continue;
            }
            kept.push(n);
        }
        Ok(self.respond(page, "/api/v1/notifications", kept, first, last))
    }

    /// Accounts `owner` blocks. Cursors are block IDs.
    pub async fn blocks(&self, owner: &Account, page: &Page<String>) -> Result<PageableResponse<Account>> {
        let blocks = self.db.get_account_blocks(&owner.id, page).await?;
        let first = blocks.first().map(|b| b.id.clone());
        let last = blocks.last().map(|b| b.id.clone());
        let mut accounts = Vec::with_capacity(blocks.len());
        for b in &blocks {
            if let Some(a) = optional(self.db.get_account_by_id(&b.target_account_id).await)? {
                accounts.push(a);
            }
        }
        Ok(self.respond(page, "/api/v1/blocks", accounts, first, last))
    }

    /// Accounts waiting on `owner` to answer a follow request.
    pub async fn follow_requests(&self, owner: &Account, page: &Page<String>) -> Result<PageableResponse<Account>> {
        let requests = self.db.get_account_follow_requests(&owner.id, page).await?;
        let first = requests.first().map(|r| r.id.clone());
        let last = requests.last().map(|r| r.id.clone());
        let mut accounts = Vec::with_capacity(requests.len());
        for r in &requests {
            if let Some(a) = optional(self.db.get_account_by_id(&r.account_id).await)? {
                accounts.push(a);
            }
        }
        Ok(self.respond(page, "/api/v1/follow_requests", accounts, first, last))
    }
}
