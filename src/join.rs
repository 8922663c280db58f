//! Per-user aggregation of profiles and actions.
//!
//! [`UserJoin`] maps each user id to an [`AggregatedUser`]. Profiles create
//! entries (first sighting wins); actions are appended to existing entries
//! (actions for unknown users are dropped as orphans).
//!
//! # Locking
//! The map is a sharded concurrent map whose values each carry their own
//! mutex:
//! - `upsert_profile` uses the map's entry API, so the check-and-create for
//!   an id is atomic and two concurrent upserts of the same id produce
//!   exactly one profile.
//! - `append_action` clones the user's `Arc` out of the map, releases the
//!   map shard, and only then takes that user's lock. Appends for different
//!   users never wait on each other.
//! - `snapshot` / `take_buckets` take no global lock; callers must drain all
//!   mutating jobs first.

use crate::dataset::DatasetType;
use crate::partition::Partitioner;
use crate::record::{Record, Value};
use crate::schema::Schema;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{debug, warn};
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError};

/// Column names the join relies on.
pub const TIMESTAMP: &str = "endpoint_ts";
pub const EVENT_TYPE: &str = "event_type";
const REGISTRATION_DT: &str = "registration_dt";
const COUNTRY_CODE: &str = "registration_country_code";
const IS_SUSPENDED: &str = "is_suspended";

/// Orphans past this many are logged at `debug` only.
const ORPHAN_WARN_LIMIT: u64 = 100;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub registration_date: String,
    pub country_code: String,
    pub is_suspended: bool,
}

impl UserProfile {
    /// Read a profile out of a `users` record, taking the id from the `key`
    /// column. `None` if a required column is missing from `schema`.
    #[must_use]
    pub fn from_record(schema: &Schema, record: &Record, key: &str) -> Option<Self> {
        let text = |name: &str| record.field(schema, name).map(ToString::to_string);
        let is_suspended = match record.field(schema, IS_SUSPENDED)? {
            Value::Bool(b) => *b,
            other => matches!(other.to_string().to_ascii_lowercase().as_str(), "true" | "1"),
        };
        Some(Self {
            id: text(key)?,
            registration_date: text(REGISTRATION_DT)?,
            country_code: text(COUNTRY_CODE)?,
            is_suspended,
        })
    }
}

/// One action attributed to a user.
///
/// `params` holds every schema column except the key and timestamp, in
/// schema order; `names` is shared by all actions of the same dataset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserAction {
    pub kind: DatasetType,
    pub timestamp: String,
    #[serde(skip)]
    pub names: Arc<[String]>,
    pub params: Vec<Value>,
}

impl UserAction {
    /// Remaining fields as `(column name, value)` pairs.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.names.iter().map(String::as_str).zip(self.params.iter())
    }

    /// Value of the field called `name`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Compare by timestamp only. See [`compare_timestamps`].
    #[must_use]
    pub fn cmp_timestamp(&self, other: &Self) -> Ordering {
        compare_timestamps(&self.timestamp, &other.timestamp)
    }
}

/// Total order over raw timestamps: integers first, numerically, then
/// everything else lexicographically.
#[must_use]
pub fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Precomputed column positions for turning records of one dataset into
/// [`UserAction`]s.
#[derive(Clone, Debug)]
pub struct ActionLayout {
    kind: DatasetType,
    user_index: usize,
    ts_index: usize,
    param_indices: Vec<usize>,
    names: Arc<[String]>,
}

impl ActionLayout {
    /// `None` if `schema` lacks the `key` or `endpoint_ts` column.
    #[must_use]
    pub fn new(kind: DatasetType, schema: &Schema, key: &str) -> Option<Self> {
        let user_index = schema.index_of(key)?;
        let ts_index = schema.index_of(TIMESTAMP)?;
        let (param_indices, names): (Vec<usize>, Vec<String>) = schema
            .columns()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != user_index && *i != ts_index)
            .map(|(i, c)| (i, c.name.clone()))
            .unzip();
        Some(Self {
            kind,
            user_index,
            ts_index,
            param_indices,
            names: names.into(),
        })
    }

    #[must_use]
    pub fn kind(&self) -> DatasetType {
        self.kind
    }

    /// Params this dataset contributes to a joined row. An `event_type`
    /// column becomes the event instead.
    #[must_use]
    pub fn param_width(&self) -> usize {
        self.names.iter().filter(|n| *n != EVENT_TYPE).count()
    }

    /// Split `record` into its user id and the action it describes.
    #[must_use]
    pub fn action(&self, record: &Record) -> Option<(String, UserAction)> {
        let user = record.get(self.user_index)?.to_string();
        let timestamp = record.get(self.ts_index)?.to_string();
        let params = self
            .param_indices
            .iter()
            .map(|&i| record.get(i).cloned())
            .collect::<Option<Vec<_>>>()?;
        Some((
            user,
            UserAction {
                kind: self.kind,
                timestamp,
                names: Arc::clone(&self.names),
                params,
            },
        ))
    }
}

/// A profile plus every action attributed to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AggregatedUser {
    pub profile: UserProfile,
    pub actions: Vec<UserAction>,
}

impl AggregatedUser {
    #[must_use]
    pub fn new(profile: UserProfile) -> Self {
        Self {
            profile,
            actions: Vec::new(),
        }
    }

    /// Stable sort of the actions by timestamp; ties keep arrival order.
    pub fn sort_actions(&mut self) {
        self.actions.sort_by(UserAction::cmp_timestamp);
    }
}

/// Result of [`UserJoin::upsert_profile`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Duplicate,
}

/// Result of [`UserJoin::append_action`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Append {
    Appended,
    Orphaned,
}

type Slot = Arc<Mutex<AggregatedUser>>;

/// Concurrent user id → [`AggregatedUser`] map.
#[derive(Default)]
pub struct UserJoin {
    users: DashMap<String, Slot>,
    duplicates: AtomicU64,
    orphans: AtomicU64,
}

impl UserJoin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the entry for `profile.id`, or keep the existing one and warn.
    pub fn upsert_profile(&self, profile: UserProfile) -> Upsert {
        match self.users.entry(profile.id.clone()) {
            Entry::Occupied(_) => {
                self.duplicates.fetch_add(1, AtomicOrdering::Relaxed);
                warn!("duplicate user id: {}", profile.id);
                Upsert::Duplicate
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(AggregatedUser::new(profile))));
                Upsert::Created
            }
        }
    }

    /// Append `action` to `user_id`'s list, or drop it if the user is unknown.
    pub fn append_action(&self, user_id: &str, action: UserAction) -> Append {
        let Some(slot) = self.users.get(user_id).map(|e| Arc::clone(e.value())) else {
            let seen = self.orphans.fetch_add(1, AtomicOrdering::Relaxed);
            if seen < ORPHAN_WARN_LIMIT {
                warn!("orphaned {} action for unknown user {user_id}", action.kind);
            } else {
                debug!("orphaned {} action for unknown user {user_id}", action.kind);
            }
            return Append::Orphaned;
        };
        slot.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .actions
            .push(action);
        Append::Appended
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    #[must_use]
    pub fn contains(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    /// Duplicate profile sightings so far.
    #[must_use]
    pub fn duplicates(&self) -> u64 {
        self.duplicates.load(AtomicOrdering::Relaxed)
    }

    /// Dropped orphan actions so far.
    #[must_use]
    pub fn orphans(&self) -> u64 {
        self.orphans.load(AtomicOrdering::Relaxed)
    }

    /// Copy of one user's aggregate.
    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<AggregatedUser> {
        let slot = self.users.get(user_id).map(|e| Arc::clone(e.value()))?;
        let user = slot.lock().unwrap_or_else(PoisonError::into_inner).clone();
        Some(user)
    }

    /// Copy of every aggregate, sorted by user id with actions in timestamp
    /// order. Only meaningful once all mutation has drained.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AggregatedUser> {
        let mut out: Vec<AggregatedUser> = self
            .users
            .iter()
            .map(|e| e.value().lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect();
        for user in &mut out {
            user.sort_actions();
        }
        out.sort_by(|a, b| a.profile.id.cmp(&b.profile.id));
        out
    }

    /// Move every aggregate out of the map, grouping users by the bucket of
    /// their id. Each bucket is sorted by user id and every user's actions by
    /// timestamp. The map is empty afterwards.
    #[must_use]
    pub fn take_buckets(&self, partitioner: Partitioner) -> Vec<Vec<AggregatedUser>> {
        let mut buckets: Vec<Vec<AggregatedUser>> =
            (0..partitioner.shard_count()).map(|_| Vec::new()).collect();
        let ids: Vec<String> = self.users.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            let Some((id, slot)) = self.users.remove(&id) else {
                continue;
            };
            let mut user = match Arc::try_unwrap(slot) {
                Ok(m) => m.into_inner().unwrap_or_else(PoisonError::into_inner),
                Err(shared) => shared.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            };
            user.sort_actions();
            buckets[partitioner.bucket(&id)].push(user);
        }
        for bucket in &mut buckets {
            bucket.sort_by(|a, b| a.profile.id.cmp(&b.profile.id));
        }
        buckets
    }
}
