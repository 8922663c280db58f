// tests/join.rs
use anyhow::Result;
use reddit_split::join::{ActionLayout, Append, Upsert, compare_timestamps};
use reddit_split::*;
use std::cmp::Ordering;
use std::sync::Arc;

fn profile(id: &str, date: &str) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        registration_date: date.to_string(),
        country_code: "US".to_string(),
        is_suspended: false,
    }
}

fn vote_layout() -> Result<ActionLayout> {
    let registry = SchemaRegistry::reddit();
    let schema = registry.schema_for(DatasetType::Vote)?;
    Ok(ActionLayout::new(DatasetType::Vote, schema, "user_id").expect("votes have user_id and endpoint_ts"))
}

fn vote(layout: &ActionLayout, ts: &str, user: &str, target: &str) -> (String, UserAction) {
    let record = Record::new(
        [ts, user, "rust", target, "link", "up"]
            .into_iter()
            .map(|s| Value::Str(s.to_string()))
            .collect(),
    );
    layout.action(&record).expect("vote record matches layout")
}

#[test]
fn profile_from_users_record() -> Result<()> {
    let registry = SchemaRegistry::reddit();
    let schema = registry.schema_for(DatasetType::User)?;
    let record = Record::from_fields(schema, &["2016-01-02", "u1", "DE", "true"])?;
    let p = UserProfile::from_record(schema, &record, "user_id").expect("complete users row");
    assert_eq!(p.id, "u1");
    assert_eq!(p.registration_date, "2016-01-02");
    assert_eq!(p.country_code, "DE");
    assert!(p.is_suspended);
    Ok(())
}

#[test]
fn first_profile_wins() {
    let join = UserJoin::new();
    assert_eq!(join.upsert_profile(profile("u1", "first")), Upsert::Created);
    assert_eq!(join.upsert_profile(profile("u1", "second")), Upsert::Duplicate);
    assert_eq!(join.len(), 1);
    assert_eq!(join.duplicates(), 1);
    assert_eq!(join.get("u1").map(|u| u.profile.registration_date), Some("first".to_string()));
}

#[test]
fn concurrent_duplicate_upserts_create_one_profile() {
    let join = Arc::new(UserJoin::new());
    let created: usize = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let join = Arc::clone(&join);
                s.spawn(move || join.upsert_profile(profile("u1", &format!("t{i}"))) == Upsert::Created)
            })
            .collect();
        handles.into_iter().map(|h| usize::from(h.join().unwrap())).sum()
    });
    assert_eq!(created, 1);
    assert_eq!(join.len(), 1);
    assert_eq!(join.duplicates(), 7);
}

#[test]
fn actions_for_unknown_users_are_orphaned() -> Result<()> {
    let layout = vote_layout()?;
    let join = UserJoin::new();
    join.upsert_profile(profile("u1", "d"));

    let (user, action) = vote(&layout, "5", "ghost", "t3_x");
    assert_eq!(join.append_action(&user, action), Append::Orphaned);
    let (user, action) = vote(&layout, "5", "u1", "t3_y");
    assert_eq!(join.append_action(&user, action), Append::Appended);

    assert_eq!(join.orphans(), 1);
    assert!(!join.contains("ghost"));
    assert_eq!(join.get("u1").map(|u| u.actions.len()), Some(1));
    Ok(())
}

#[test]
fn concurrent_appends_for_one_user_are_all_kept() -> Result<()> {
    let layout = vote_layout()?;
    let join = UserJoin::new();
    join.upsert_profile(profile("u1", "d"));

    std::thread::scope(|s| {
        for t in 0..8 {
            let (join, layout) = (&join, &layout);
            s.spawn(move || {
                for i in 0..250 {
                    let (user, action) = vote(layout, &(t * 1000 + i).to_string(), "u1", "t3");
                    join.append_action(&user, action);
                }
            });
        }
    });

    let user = join.get("u1").expect("u1 exists");
    assert_eq!(user.actions.len(), 2_000);
    Ok(())
}

#[test]
fn action_fields_exclude_user_and_timestamp() -> Result<()> {
    let layout = vote_layout()?;
    let (user, action) = vote(&layout, "1520000000", "u1", "t3_abc");
    assert_eq!(user, "u1");
    assert_eq!(action.timestamp, "1520000000");
    assert_eq!(action.kind, DatasetType::Vote);
    let names: Vec<&str> = action.fields().map(|(n, _)| n).collect();
    assert_eq!(names, ["sr_name", "target_fullname", "target_type", "vote_direction"]);
    assert_eq!(action.field("target_fullname"), Some(&Value::Str("t3_abc".into())));
    Ok(())
}

#[test]
fn param_width_skips_event_type() {
    let registry = SchemaRegistry::reddit();
    let width = |d: DatasetType| ActionLayout::new(d, registry.schema_for(d).unwrap(), "user_id").map(|l| l.param_width());
    assert_eq!(width(DatasetType::Vote), Some(4));
    assert_eq!(width(DatasetType::Subscription), Some(1));
    assert_eq!(width(DatasetType::Removal), Some(4));
    assert_eq!(width(DatasetType::Submission), Some(6));
}

#[test]
fn layout_uses_the_given_key_column() -> Result<()> {
    let schema = Schema::strings(&["endpoint_ts", "user_id", "author", "sr_name"]);
    let layout = ActionLayout::new(DatasetType::Vote, &schema, "author").expect("author and endpoint_ts present");
    let record = Record::from_fields(&schema, &["5", "u1", "a9", "rust"])?;
    let (user, action) = layout.action(&record).expect("complete row");
    assert_eq!(user, "a9");
    let names: Vec<&str> = action.fields().map(|(n, _)| n).collect();
    assert_eq!(names, ["user_id", "sr_name"]);
    assert!(ActionLayout::new(DatasetType::Vote, &schema, "missing").is_none());

    let users = Schema::strings(&["registration_dt", "user_id", "author", "registration_country_code", "is_suspended"]);
    let record = Record::from_fields(&users, &["2016-01-02", "u1", "a9", "DE", "false"])?;
    let p = UserProfile::from_record(&users, &record, "author").expect("complete users row");
    assert_eq!(p.id, "a9");
    Ok(())
}

#[test]
fn layout_requires_timestamp() {
    let schema = Schema::strings(&["user_id", "sr_name"]);
    assert!(ActionLayout::new(DatasetType::Vote, &schema, "user_id").is_none());
}

#[test]
fn timestamps_compare_numerically_when_both_are_integers() {
    assert_eq!(compare_timestamps("9", "10"), Ordering::Less);
    assert_eq!(compare_timestamps("2018-01-02", "2018-01-10"), Ordering::Less);
    assert_eq!(compare_timestamps("9", "10x"), Ordering::Less);
    assert_eq!(compare_timestamps("1x", "10"), Ordering::Greater);
}

#[test]
fn mixed_timestamps_sort_integers_first() {
    let mut stamps = vec!["1x", "10", "9"];
    stamps.sort_by(|a, b| compare_timestamps(a, b));
    assert_eq!(stamps, ["9", "10", "1x"]);

    let mut mixed: Vec<String> = (0u64..2_000)
        .map(|i| {
            let n = i.wrapping_mul(2_654_435_761) % 1_000;
            if i % 3 == 0 { format!("{n}x") } else { n.to_string() }
        })
        .collect();
    mixed.sort_by(|a, b| compare_timestamps(a, b));

    let split = mixed.iter().position(|t| t.parse::<i64>().is_err()).unwrap_or(mixed.len());
    let (ints, text) = mixed.split_at(split);
    assert!(ints.windows(2).all(|w| w[0].parse::<i64>().unwrap() <= w[1].parse::<i64>().unwrap()));
    assert!(text.iter().all(|t| t.parse::<i64>().is_err()));
    assert!(text.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn snapshot_survives_mixed_timestamps() -> Result<()> {
    let layout = vote_layout()?;
    let join = UserJoin::new();
    join.upsert_profile(profile("u1", "d"));
    for i in 0u64..300 {
        let n = i.wrapping_mul(40_503) % 500;
        let ts = if i % 4 == 0 { format!("{n}x") } else { n.to_string() };
        let (user, action) = vote(&layout, &ts, "u1", "t3");
        join.append_action(&user, action);
    }

    let buckets = join.take_buckets(Partitioner::new(2)?);
    let user = &buckets[assign_bucket("u1", 2)][0];
    assert_eq!(user.actions.len(), 300);
    assert!(user.actions.windows(2).all(|w| w[0].cmp_timestamp(&w[1]) != Ordering::Greater));
    Ok(())
}

#[test]
fn snapshot_sorts_users_and_actions_stably() -> Result<()> {
    let layout = vote_layout()?;
    let join = UserJoin::new();
    join.upsert_profile(profile("u2", "d"));
    join.upsert_profile(profile("u1", "d"));
    for (ts, target) in [("30", "c"), ("10", "a"), ("20", "b1"), ("20", "b2")] {
        let (user, action) = vote(&layout, ts, "u1", target);
        join.append_action(&user, action);
    }

    let snap = join.snapshot();
    let ids: Vec<&str> = snap.iter().map(|u| u.profile.id.as_str()).collect();
    assert_eq!(ids, ["u1", "u2"]);
    let targets: Vec<String> = snap[0]
        .actions
        .iter()
        .map(|a| a.field("target_fullname").map(ToString::to_string).unwrap_or_default())
        .collect();
    assert_eq!(targets, ["a", "b1", "b2", "c"]);
    Ok(())
}

#[test]
fn take_buckets_groups_by_user_bucket_and_empties_the_map() -> Result<()> {
    let join = UserJoin::new();
    for id in ["u1", "u2", "u3", "u4", "u5"] {
        join.upsert_profile(profile(id, "d"));
    }
    let buckets = join.take_buckets(Partitioner::new(3)?);
    assert_eq!(buckets.len(), 3);
    assert!(join.is_empty());

    let mut seen = 0;
    for (b, users) in buckets.iter().enumerate() {
        for u in users {
            assert_eq!(assign_bucket(&u.profile.id, 3), b);
        }
        assert!(users.windows(2).all(|w| w[0].profile.id < w[1].profile.id));
        seen += users.len();
    }
    assert_eq!(seen, 5);
    Ok(())
}

#[test]
fn joined_rows_start_with_create_and_pad_params() -> Result<()> {
    let layout = vote_layout()?;
    let join = UserJoin::new();
    join.upsert_profile(profile("u1", "2016-01-02"));
    let (user, action) = vote(&layout, "7", "u1", "t3_a");
    join.append_action(&user, action);

    let dir = tempfile::tempdir()?;
    let writer = JoinWriter::new(dir.path(), 5);
    let user = join.get("u1").expect("u1 exists");
    let rows = writer.rows_for(&user);
    assert_eq!(rows.len(), 2);

    let text = |r: &Record| r.values().iter().map(ToString::to_string).collect::<Vec<_>>();
    assert_eq!(text(&rows[0]), ["u1", "2016-01-02", "create", "US", "false", "", "", ""]);
    assert_eq!(text(&rows[1]), ["u1", "7", "vote", "rust", "t3_a", "link", "up", ""]);
    assert_eq!(writer.schema().len(), 8);
    Ok(())
}
