/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Renders outbound activities and queues one delivery per inbox.

use anyhow::{Context, Result};
use async_trait::async_trait;
use fedi3_protocol::{AS_CONTEXT, AS_PUBLIC};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::db::Db;
use crate::error::optional;
use crate::federation::{Outbound, Outbox};
use crate::model::{Account, Follow, FollowRequest, Status, Visibility};
use crate::util::new_id;
use crate::workers::{DeliveryMsg, WorkerPool};

pub struct DeliveryOutbox {
    db: Db,
    delivery: Arc<WorkerPool<DeliveryMsg>>,
}

struct Rendered {
    actor: Account,
    activity: Value,
    object_id: Option<String>,
    target_id: Option<String>,
    recipients: Vec<Account>,
}

impl DeliveryOutbox {
    pub fn new(db: Db, delivery: Arc<WorkerPool<DeliveryMsg>>) -> Self {
        Self { db, delivery }
    }

    async fn account(&self, id: &str) -> Result<Account> {
        self.db
            .get_account_by_id(id)
            .await
            .with_context(|| format!("get account {id}"))
    }

    async fn remote_followers(&self, account_id: &str) -> Result<Vec<Account>> {
        let mut out = Vec::new();
        for f in self.db.get_account_followers(account_id).await? {
            if let Some(a) = optional(self.db.get_account_by_id(&f.account_id).await)? {
                out.push(a);
            }
        }
        Ok(out)
    }

    async fn mentioned(&self, status: &Status) -> Result<Vec<Account>> {
        let mut out = Vec::with_capacity(status.mention_account_ids.len());
        for id in &status.mention_account_ids {
            if let Some(a) = optional(self.db.get_account_by_id(id).await)? {
                out.push(a);
            }
        }
        Ok(out)
    }

    /// Everyone a status is addressed to, following its visibility.
    async fn status_audience(&self, status: &Status, author: &Account) -> Result<(Value, Value, Vec<Account>)> {
        let mentioned = self.mentioned(status).await?;
        let mention_uris: Vec<&str> = mentioned.iter().map(|a| a.uri.as_str()).collect();
        let (to, cc) = match status.visibility {
            Visibility::Public => (json!([AS_PUBLIC]), json!([&author.followers_uri, mention_uris])),
            Visibility::Unlisted => (json!([&author.followers_uri]), json!([AS_PUBLIC, mention_uris])),
            Visibility::FollowersOnly => (json!([&author.followers_uri]), json!(mention_uris)),
            Visibility::Direct => (json!(mention_uris), json!([])),
        };
        let mut recipients = mentioned;
        if status.visibility != Visibility::Direct {
            recipients.extend(self.remote_followers(&author.id).await?);
        }
        if let Some(parent) = &status.in_reply_to_account_id {
            if let Some(a) = optional(self.db.get_account_by_id(parent).await)? {
                recipients.push(a);
            }
        }
        Ok((to, flatten(cc), recipients))
    }

    async fn note(&self, status: &Status, author: &Account) -> Result<(Value, Vec<Account>)> {
        let (to, cc, recipients) = self.status_audience(status, author).await?;
        let summary = (!status.content_warning.is_empty()).then_some(&status.content_warning);
        let note = json!({
            "id": status.uri,
            "type": "Note",
            "url": status.url,
            "attributedTo": author.uri,
            "content": status.content,
            "summary": summary,
            "inReplyTo": status.in_reply_to_uri,
            "to": to,
            "cc": cc,
        });
        Ok((note, recipients))
    }

    async fn announce_object(&self, boost: &Status, actor: &Account) -> Result<(Value, Vec<Account>)> {
        let mut recipients = self.remote_followers(&actor.id).await?;
        let mut cc = vec![actor.followers_uri.clone()];
        if let Some(original_author) = &boost.boost_of_account_id {
            if let Some(a) = optional(self.db.get_account_by_id(original_author).await)? {
                cc.push(a.uri.clone());
                recipients.push(a);
            }
        }
        let announce = json!({
            "id": boost.uri,
            "type": "Announce",
            "actor": actor.uri,
            "object": boost.boost_of_uri,
            "to": [AS_PUBLIC],
            "cc": cc,
        });
        Ok((announce, recipients))
    }

    fn follow_object(&self, uri: &str, follower: &Account, target: &Account) -> Value {
        json!({
            "id": uri,
            "type": "Follow",
            "actor": follower.uri,
            "object": target.uri,
        })
    }

    async fn follow_parties(&self, account_id: &str, target_id: &str) -> Result<(Account, Account)> {
        Ok((self.account(account_id).await?, self.account(target_id).await?))
    }

    async fn render(&self, out: &Outbound) -> Result<Option<Rendered>> {
        let verb = out.activity_type().as_str();
        let rendered = match out {
            Outbound::CreateStatus(s) | Outbound::UpdateStatus(s) => {
                let author = self.account(&s.account_id).await?;
                let (note, recipients) = self.note(s, &author).await?;
                let id = match out {
                    Outbound::CreateStatus(_) => format!("{}/activity", s.uri),
                    _ => format!("{}#updates/{}", s.uri, new_id()),
                };
                Rendered {
                    activity: activity(&id, verb, &author, note),
                    actor: author,
                    object_id: Some(s.uri.clone()),
                    target_id: s.in_reply_to_uri.clone(),
                    recipients,
                }
            }
            Outbound::DeleteStatus(s) => {
                let author = self.account(&s.account_id).await?;
                let (_, _, recipients) = self.status_audience(s, &author).await?;
                let tombstone = json!({ "id": s.uri, "type": "Tombstone" });
                Rendered {
                    activity: activity(&format!("{}#delete", s.uri), verb, &author, tombstone),
                    actor: author,
                    object_id: Some(s.uri.clone()),
                    target_id: None,
                    recipients,
                }
            }
            Outbound::Announce(b) => {
                let actor = self.account(&b.account_id).await?;
                let (mut announce, recipients) = self.announce_object(b, &actor).await?;
                announce["@context"] = json!(AS_CONTEXT);
                Rendered {
                    activity: announce,
                    actor,
                    object_id: b.boost_of_uri.clone(),
                    target_id: Some(b.uri.clone()),
                    recipients,
                }
            }
            Outbound::UndoAnnounce(b) => {
                let actor = self.account(&b.account_id).await?;
                let (announce, recipients) = self.announce_object(b, &actor).await?;
                Rendered {
                    activity: activity(&format!("{}#undo", b.uri), verb, &actor, announce),
                    actor,
                    object_id: b.boost_of_uri.clone(),
                    target_id: Some(b.uri.clone()),
                    recipients,
                }
            }
            Outbound::Like(f) | Outbound::UndoLike(f) => {
                let actor = self.account(&f.account_id).await?;
                let target = self.account(&f.target_account_id).await?;
                let status = self.db.get_status_by_id(&f.status_id).await?;
                let like = json!({
                    "id": f.uri,
                    "type": "Like",
                    "actor": actor.uri,
                    "object": status.uri,
                });
                let activity = match out {
                    Outbound::Like(_) => with_context(like),
                    _ => activity(&format!("{}#undo", f.uri), verb, &actor, like),
                };
                Rendered {
                    activity,
                    actor,
                    object_id: Some(status.uri),
                    target_id: Some(target.uri.clone()),
                    recipients: vec![target],
                }
            }
            Outbound::Follow(req) => {
                let (follower, target) = self.follow_parties(&req.account_id, &req.target_account_id).await?;
                follow_rendered(
                    with_context(self.follow_object(&req.uri, &follower, &target)),
                    follower,
                    target,
                )
            }
            Outbound::UndoFollow(f) => {
                let (follower, target) = self.follow_parties(&f.account_id, &f.target_account_id).await?;
                let obj = self.follow_object(&f.uri, &follower, &target);
                follow_rendered(
                    activity(&format!("{}#undo", f.uri), verb, &follower, obj),
                    follower,
                    target,
                )
            }
            Outbound::AcceptFollow(Follow { id, uri, account_id, target_account_id, .. })
            | Outbound::RejectFollow(FollowRequest { id, uri, account_id, target_account_id, .. }) => {
                let (follower, target) = self.follow_parties(account_id, target_account_id).await?;
                let obj = self.follow_object(uri, &follower, &target);
                let activity_id = format!("{}#{}s/follows/{}", target.uri, verb.to_lowercase(), id);
                Rendered {
                    activity: activity(&activity_id, verb, &target, obj),
                    object_id: Some(uri.clone()),
                    target_id: Some(follower.uri.clone()),
                    recipients: vec![follower],
                    actor: target,
                }
            }
            Outbound::Block(b) | Outbound::UndoBlock(b) => {
                let (actor, target) = self.follow_parties(&b.account_id, &b.target_account_id).await?;
                let block = json!({
                    "id": b.uri,
                    "type": "Block",
                    "actor": actor.uri,
                    "object": target.uri,
                });
                let activity = match out {
                    Outbound::Block(_) => with_context(block),
                    _ => activity(&format!("{}#undo", b.uri), verb, &actor, block),
                };
                Rendered {
                    activity,
                    actor,
                    object_id: Some(b.uri.clone()),
                    target_id: Some(target.uri.clone()),
                    recipients: vec![target],
                }
            }
            Outbound::AcceptInteraction(a) | Outbound::RejectInteraction(a) => {
                let actor = self.account(&a.account_id).await?;
                let interacting = self.account(&a.interacting_account_id).await?;
                let mut act = activity(&a.uri, verb, &actor, json!(a.interaction_uri));
                act["to"] = json!([interacting.uri]);
                Rendered {
                    activity: act,
                    actor,
                    object_id: Some(a.interaction_uri.clone()),
                    target_id: Some(interacting.uri.clone()),
                    recipients: vec![interacting],
                }
            }
            Outbound::Flag(r) => {
                if !r.forwarded {
                    return Ok(None);
                }
                let actor = self.account(&r.account_id).await?;
                let target = self.account(&r.target_account_id).await?;
                let mut objects = vec![target.uri.clone()];
                for id in &r.status_ids {
                    if let Some(s) = optional(self.db.get_status_by_id(id).await)? {
                        objects.push(s.uri);
                    }
                }
                let flag = json!({
                    "@context": AS_CONTEXT,
                    "id": r.uri,
                    "type": "Flag",
                    "actor": actor.uri,
                    "content": r.comment,
                    "object": objects,
                });
                Rendered {
                    activity: flag,
                    actor,
                    object_id: Some(r.uri.clone()),
                    target_id: Some(target.uri.clone()),
                    recipients: vec![target],
                }
            }
            Outbound::PollVote(v) => {
                let actor = self.account(&v.account_id).await?;
                let poll = self.db.get_poll_by_id(&v.poll_id).await?;
                let status = self.db.get_status_by_id(&poll.status_id).await?;
                let author = self.account(&status.account_id).await?;
                let answers: Vec<Value> = v
                    .choices
                    .iter()
                    .filter_map(|c| poll.options.get(*c))
                    .map(|name| {
                        json!({
                            "type": "Note",
                            "name": name,
                            "attributedTo": actor.uri,
                            "inReplyTo": status.uri,
                            "to": [author.uri],
                        })
                    })
                    .collect();
                let id = format!("{}#votes/{}", actor.uri, v.id);
                Rendered {
                    activity: activity(&id, verb, &actor, json!(answers)),
                    actor,
                    object_id: Some(status.uri),
                    target_id: Some(author.uri.clone()),
                    recipients: vec![author],
                }
            }
            Outbound::UpdateAccount(a) | Outbound::DeleteAccount(a) | Outbound::MoveAccount(a) => {
                let recipients = self.remote_followers(&a.id).await?;
                let (id, object) = match out {
                    Outbound::UpdateAccount(_) => (
                        format!("{}#updates/{}", a.uri, new_id()),
                        json!({
                            "id": a.uri,
                            "type": "Person",
                            "preferredUsername": a.username,
                            "name": a.display_name,
                            "inbox": a.inbox_uri,
                            "followers": a.followers_uri,
                            "manuallyApprovesFollowers": a.locked,
                            "movedTo": a.moved_to_uri,
                            "alsoKnownAs": a.also_known_as,
                        }),
                    ),
                    Outbound::DeleteAccount(_) => (format!("{}#delete", a.uri), json!(a.uri)),
                    _ => (format!("{}#moves/{}", a.uri, new_id()), json!(a.uri)),
                };
                let mut act = activity(&id, verb, a, object);
                if let Outbound::MoveAccount(_) = out {
                    act["target"] = json!(a.moved_to_uri);
                }
                act["to"] = json!([a.followers_uri]);
                Rendered {
                    activity: act,
                    actor: (**a).clone(),
                    object_id: Some(a.uri.clone()),
                    target_id: a.moved_to_uri.clone(),
                    recipients,
                }
            }
        };
        Ok(Some(rendered))
    }
}

#[async_trait]
impl Outbox for DeliveryOutbox {
    async fn send(&self, cancel: &CancellationToken, out: Outbound) -> Result<()> {
        let Some(r) = self.render(&out).await.with_context(|| format!("render {}", out.name()))? else {
            return Ok(());
        };
        if !r.actor.is_local() {
            debug!(activity = out.name(), actor = %r.actor.uri, "not sending for a remote actor");
            return Ok(());
        }

        let inboxes: BTreeSet<&str> = r
            .recipients
            .iter()
            .filter(|a| a.is_remote())
            .map(|a| a.delivery_inbox())
            .filter(|i| !i.is_empty())
            .collect();
        if inboxes.is_empty() {
            debug!(activity = out.name(), "no remote recipients");
            return Ok(());
        }

        let body: Arc<[u8]> = serde_json::to_vec(&r.activity)?.into();
        for inbox in inboxes {
            let msg = DeliveryMsg {
                id: new_id(),
                actor_id: r.actor.uri.clone(),
                object_id: r.object_id.clone(),
                target_id: r.target_id.clone(),
                inbox: inbox.to_string(),
                body: body.clone(),
            };
            if let Err(e) = self.delivery.queue(cancel.clone(), msg).await {
                warn!(activity = out.name(), inbox, "queue delivery: {e:#}");
                return Err(e);
            }
        }
        Ok(())
    }
}

fn activity(id: &str, verb: &str, actor: &Account, object: Value) -> Value {
    json!({
        "@context": AS_CONTEXT,
        "id": id,
        "type": verb,
        "actor": actor.uri,
        "object": object,
    })
}

fn with_context(mut v: Value) -> Value {
    v["@context"] = json!(AS_CONTEXT);
    v
}

fn follow_rendered(activity: Value, follower: Account, target: Account) -> Rendered {
    Rendered {
        activity,
        object_id: Some(target.uri.clone()),
        target_id: Some(target.uri.clone()),
        recipients: vec![target],
        actor: follower,
    }
}

/// `["a", ["b", "c"]]` to `["a", "b", "c"]`.
fn flatten(v: Value) -> Value {
    match v {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .flat_map(|i| match i {
                    Value::Array(inner) => inner,
                    other => vec![other],
                })
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Follow;
    use crate::testutil::{local_account, new_status, remote_account, test_db};
    use crate::util::now_ms;
    use tokio_util::sync::CancellationToken;

    fn follow(from: &Account, to: &Account) -> Follow {
        Follow {
            id: new_id(),
            uri: format!("{}/follows/{}", from.uri, new_id()),
            account_id: from.id.clone(),
            target_account_id: to.id.clone(),
            show_reblogs: true,
            notify: false,
            created_at_ms: now_ms(),
        }
    }

    #[tokio::test]
    async fn create_status_queues_one_delivery_per_shared_inbox() {
        let (db, _dir) = test_db();
        let me = local_account(&db, "me").await;
        let mut a = remote_account(&db, "a", "remote.test").await;
        let mut b = remote_account(&db, "b", "remote.test").await;
        a.shared_inbox_uri = Some("https://remote.test/inbox".into());
        b.shared_inbox_uri = Some("https://remote.test/inbox".into());
        db.update_account(&a).await.unwrap();
        db.update_account(&b).await.unwrap();
        let c = remote_account(&db, "c", "other.test").await;
        let local_friend = local_account(&db, "friend").await;
        for f in [&a, &b, &c, &local_friend] {
            db.put_follow(&follow(f, &me)).await.unwrap();
        }

        let pool = Arc::new(WorkerPool::new("delivery", 1, 10));
        let outbox = DeliveryOutbox::new(db.clone(), pool.clone());
        let status = new_status(&me);
        db.put_status(&status).await.unwrap();
        outbox
            .send(&CancellationToken::new(), Outbound::CreateStatus(Box::new(status.clone())))
            .await
            .unwrap();
        assert_eq!(pool.backlog(), 2);

        // Queued deliveries are purged along with the status.
        assert_eq!(pool.purge(&[status.uri.as_str()]), 2);
    }

    #[tokio::test]
    async fn remote_actors_are_never_sent_for() {
        let (db, _dir) = test_db();
        let them = remote_account(&db, "them", "remote.test").await;
        let me = local_account(&db, "me").await;
        db.put_follow(&follow(&me, &them)).await.unwrap();
        let pool = Arc::new(WorkerPool::new("delivery", 1, 10));
        let outbox = DeliveryOutbox::new(db.clone(), pool.clone());
        let status = new_status(&them);
        db.put_status(&status).await.unwrap();
        outbox
            .send(&CancellationToken::new(), Outbound::CreateStatus(Box::new(status)))
            .await
            .unwrap();
        assert_eq!(pool.backlog(), 0);
    }

    #[test]
    fn flatten_merges_nested_arrays() {
        assert_eq!(flatten(json!(["a", ["b", "c"], []])), json!(["a", "b", "c"]));
    }
}
