// tests/dataset.rs
use reddit_split::*;
use std::path::Path;

#[test]
fn classifies_canonical_directory_names() {
    let cases = [
        ("users", DatasetType::User),
        ("votes", DatasetType::Vote),
        ("comments", DatasetType::Comment),
        ("submissions", DatasetType::Submission),
        ("removals", DatasetType::Removal),
        ("reports", DatasetType::Report),
        ("subscriptions", DatasetType::Subscription),
    ];
    for (name, expected) in cases {
        assert_eq!(classify_name(name), expected, "{name}");
    }
}

#[test]
fn first_keyword_in_precedence_order_wins() {
    // "user" is checked before "vote".
    assert_eq!(classify_name("user_votes"), DatasetType::User);
    assert_eq!(classify_name("comment_votes"), DatasetType::Vote);
    assert_eq!(classify_name("comment_reports"), DatasetType::Comment);
    assert_eq!(classify_name("removal_report"), DatasetType::Removal);
}

#[test]
fn singular_submission_is_unknown() {
    assert_eq!(classify_name("submission"), DatasetType::Unknown);
    assert_eq!(classify_name("submissions_2018"), DatasetType::Submission);
}

#[test]
fn matching_is_case_sensitive_substring() {
    assert_eq!(classify_name("Votes"), DatasetType::Unknown);
    assert_eq!(classify_name("2018_votes_dump"), DatasetType::Vote);
    assert_eq!(classify_name("misc"), DatasetType::Unknown);
    assert_eq!(classify_name(""), DatasetType::Unknown);
}

#[test]
fn classify_uses_final_path_component() {
    assert_eq!(classify(Path::new("/data/users_dump/votes")), DatasetType::Vote);
    assert_eq!(classify(Path::new("/data/votes/")), DatasetType::Vote);
    assert_eq!(classify(Path::new("/")), DatasetType::Unknown);
    assert_eq!(classify(Path::new("..")), DatasetType::Unknown);
}

#[test]
fn canonical_names_and_labels() {
    assert_eq!(DatasetType::Submission.name(), "submissions");
    assert_eq!(DatasetType::User.event_label(), "create");
    assert_eq!(DatasetType::Vote.event_label(), "vote");
    assert_eq!(DatasetType::Removal.to_string(), "removals");
    assert!(DatasetType::Report.is_action());
    assert!(!DatasetType::User.is_action());
    assert!(!DatasetType::Unknown.is_action());
}

#[test]
fn every_known_type_round_trips_through_its_name() {
    for d in DatasetType::KNOWN {
        assert_eq!(classify_name(d.name()), d);
    }
}
