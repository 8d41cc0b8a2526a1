/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Result;
use rand::{thread_rng, Rng};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Sends the request built by `build` up to `attempts` times (at most 5),
/// backing off with jitter after transport errors, 429 and 5xx. The last
/// response is returned whatever its status.
pub async fn send_with_retry<F>(
    mut build: F,
    attempts: u32,
    cancel: &CancellationToken,
) -> Result<Response>
where
    F: FnMut() -> RequestBuilder,
{
    let max_attempts = attempts.clamp(1, 5);
    let mut backoff = Duration::from_millis(200);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let sent = tokio::select! {
            r = build().send() => r,
            _ = cancel.cancelled() => return Err(Error::Cancelled.into()),
        };
        match sent {
            Ok(resp) if should_retry_status(resp.status()) && attempt < max_attempts => {}
            Ok(resp) => return Ok(resp),
            Err(e) if attempt >= max_attempts => return Err(e.into()),
            Err(_) => {}
        }
        tokio::select! {
            _ = sleep_with_jitter(backoff) => {}
            _ = cancel.cancelled() => return Err(Error::Cancelled.into()),
        }
        backoff = backoff.saturating_mul(2).min(Duration::from_secs(5));
    }
}

pub fn should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

async fn sleep_with_jitter(base: Duration) {
    let jitter_ms: u64 = thread_rng().gen_range(0..=200);
    tokio::time::sleep(base + Duration::from_millis(jitter_ms)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_only_transient_statuses() {
        assert!(should_retry_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry_status(StatusCode::BAD_GATEWAY));
        assert!(!should_retry_status(StatusCode::NOT_FOUND));
        assert!(!should_retry_status(StatusCode::ACCEPTED));
    }

    #[tokio::test]
    async fn cancelled_before_sending() {
        let client = reqwest::Client::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = send_with_retry(|| client.post("http://127.0.0.1:9/inbox"), 3, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Cancelled)));
    }
}
