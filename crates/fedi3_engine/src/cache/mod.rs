/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! In-memory caches in front of storage.
//!
//! Each entity kind gets a [`StructCache`] with a primary index and any
//! number of secondary ones. Callers use `load` (read-through), `store`
//! (write-through) and `invalidate` after mutating a row. Derived
//! decisions (mutes, visibility) live in their own caches and are dropped
//! by hooks when the rows they were computed from change.

mod caches;
mod decisions;
mod entities;
pub mod index;
mod struct_cache;

pub use caches::{CacheSettings, Caches};
pub use decisions::{CachedMute, CachedVisibility, DecisionItem, ANONYMOUS};
pub use struct_cache::{key, key_of, CacheConfig, Cacheable, Hook, IndexConfig, StructCache};
