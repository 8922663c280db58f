//! Dataset types and path classification.
//!
//! Every directory in the export holds one kind of user action. The kind is
//! recovered from the directory name by checking a fixed, ordered list of
//! keywords; the first keyword found wins.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Category of an input directory or file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetType {
    User,
    Vote,
    Comment,
    Submission,
    Removal,
    Report,
    Subscription,
    Unknown,
}

/// Keyword precedence used by [`classify`]. Order matters.
const KEYWORDS: [(&str, DatasetType); 7] = [
    ("user", DatasetType::User),
    ("vote", DatasetType::Vote),
    ("comment", DatasetType::Comment),
    ("submissions", DatasetType::Submission),
    ("removal", DatasetType::Removal),
    ("report", DatasetType::Report),
    ("subscription", DatasetType::Subscription),
];

impl DatasetType {
    /// Every known (non-`Unknown`) type, in classifier precedence order.
    pub const KNOWN: [DatasetType; 7] = [
        DatasetType::User,
        DatasetType::Vote,
        DatasetType::Comment,
        DatasetType::Submission,
        DatasetType::Removal,
        DatasetType::Report,
        DatasetType::Subscription,
    ];

    /// Canonical plural name, used as the per-bucket output file name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            DatasetType::User => "users",
            DatasetType::Vote => "votes",
            DatasetType::Comment => "comments",
            DatasetType::Submission => "submissions",
            DatasetType::Removal => "removals",
            DatasetType::Report => "reports",
            DatasetType::Subscription => "subscriptions",
            DatasetType::Unknown => "unknown",
        }
    }

    /// Event label written to the joined output for this kind of action.
    #[must_use]
    pub const fn event_label(self) -> &'static str {
        match self {
            DatasetType::User => "create",
            DatasetType::Vote => "vote",
            DatasetType::Comment => "comment",
            DatasetType::Submission => "submission",
            DatasetType::Removal => "removal",
            DatasetType::Report => "report",
            DatasetType::Subscription => "subscription",
            DatasetType::Unknown => "unknown",
        }
    }

    /// `true` for every type whose rows are user actions.
    #[must_use]
    pub const fn is_action(self) -> bool {
        !matches!(self, DatasetType::User | DatasetType::Unknown)
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify a name (not a path) by ordered substring match.
#[must_use]
pub fn classify_name(name: &str) -> DatasetType {
    KEYWORDS
        .iter()
        .find(|(kw, _)| name.contains(kw))
        .map_or(DatasetType::Unknown, |&(_, t)| t)
}

/// Classify a path by its final component.
///
/// Total: paths without a usable final component (e.g. `/` or `..`) are
/// `Unknown`. A trailing separator is ignored since `Path` normalizes it away.
#[must_use]
pub fn classify(path: impl AsRef<Path>) -> DatasetType {
    path.as_ref()
        .file_name()
        .map_or(DatasetType::Unknown, |n| classify_name(&n.to_string_lossy()))
}
