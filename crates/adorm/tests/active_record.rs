mod common;

use adorm::{Cast, Model, ModelSchema, Record, Related, Relations, ValidationCode, Value};
use common::{Call, MockConnection, row};

struct User;

impl Model for User {
    fn schema() -> ModelSchema {
        ModelSchema::new("user")
            .cast("age", Cast::Int)
            .alias("mail", "email")
    }

    fn relations() -> Relations<Self> {
        Relations::new()
            .has_many("posts", "post", "user_id", "id")
            .belongs_to("team", "team", "team_id", "id")
            .relation("post_count", |user| {
                user.related("post")
                    .where_eq("user_id", user.get("id"))
                    .count("*")
                    .map(|n| Related::Scalar(n.into()))
            })
    }

    fn validate(record: &mut Record<Self>) -> bool {
        if record.get("name").is_null() {
            record.add_error("name is required");
            return false;
        }
        true
    }

    fn before_save(record: &mut Record<Self>) -> bool {
        if record.is_new_record() && record.get("status").is_null() {
            record.set("status", "pending");
        }
        true
    }

    fn after_save(record: &mut Record<Self>, saved: bool) {
        record.set_scenario(if saved { "saved" } else { "unsaved" });
    }
}

struct Membership;

impl Model for Membership {
    fn schema() -> ModelSchema {
        ModelSchema::new("membership")
            .composite_key(&["user_id", "team_id"])
            .protect_pk(false)
    }
}

// ==================== Insert ====================

#[test]
fn insert_writes_dirty_attributes_and_reads_generated_key() {
    let mock = MockConnection::new();
    mock.set_insert_id(42);
    mock.push_row(row(&[
        ("id", 42.into()),
        ("name", "john".into()),
        ("age", "30".into()),
    ]));

    let mut user = Record::<User>::new(mock.db());
    user.set("name", "john").set("age", "30");
    assert!(user.insert().unwrap());

    assert!(!user.is_new_record());
    assert!(!user.is_dirty());
    assert_eq!(user.key(), Some(Value::Int(42)));
    assert_eq!(user.get("age"), Value::Int(30));

    let calls = mock.calls();
    assert_eq!(
        calls[0],
        Call::Execute(
            "INSERT INTO `user` (`age`, `name`) VALUES (?, ?)".into(),
            vec![Value::Int(30), Value::from("john")]
        )
    );
    assert_eq!(calls[1], Call::InsertId("user".into(), "id".into()));
    assert_eq!(
        calls[2],
        Call::Query(
            "SELECT * FROM `user` WHERE `user`.`id` = ? LIMIT 1".into(),
            vec![Value::Int(42)]
        )
    );
}

#[test]
fn insert_failure_records_query_error() {
    let mock = MockConnection::new();
    mock.fail_next_execute("duplicate entry");

    let mut user = Record::<User>::new(mock.db());
    user.set("name", "john");
    let err = user.insert().unwrap_err();

    assert!(err.to_string().contains("duplicate entry"));
    assert!(user.is_new_record());
    assert!(user.is_dirty());
}

#[test]
fn insert_keeps_explicit_key() {
    let mock = MockConnection::new();
    let mut user = Record::<User>::new(mock.db());
    user.set("id", 7).set("name", "x");
    user.insert().unwrap();

    assert!(
        !mock
            .calls()
            .iter()
            .any(|c| matches!(c, Call::InsertId(..)))
    );
    assert_eq!(user.key(), Some(Value::Int(7)));
}

// ==================== Update / delete ====================

#[test]
fn update_sends_only_dirty_attributes() {
    let mock = MockConnection::new();
    let mut user = Record::<User>::hydrate(
        mock.db(),
        row(&[("id", 1.into()), ("name", "john".into()), ("age", 25.into())]),
    );
    user.set("age", "25").set("name", "jane");
    assert!(user.update().unwrap());

    assert_eq!(
        mock.executed(),
        vec![(
            "UPDATE `user` SET `name` = ? WHERE `id` = ?".to_string(),
            vec![Value::from("jane"), Value::Int(1)]
        )]
    );
    assert!(!user.is_dirty());
}

#[test]
fn update_without_changes_skips_storage() {
    let mock = MockConnection::new();
    let mut user = Record::<User>::hydrate(mock.db(), row(&[("id", 1.into())]));
    assert!(user.update().unwrap());
    assert!(mock.calls().is_empty());
}

#[test]
fn update_composite_key_locates_row_by_previous_key() {
    let mock = MockConnection::new();
    let mut membership = Record::<Membership>::hydrate(
        mock.db(),
        row(&[("user_id", 1.into()), ("team_id", 2.into())]),
    );
    membership.set("team_id", 3);
    assert!(membership.update().unwrap());

    assert_eq!(
        mock.executed(),
        vec![(
            "UPDATE `membership` SET `team_id` = ? WHERE `user_id` = ? AND `team_id` = ?"
                .to_string(),
            vec![Value::Int(3), Value::Int(1), Value::Int(2)]
        )]
    );

    // The next write locates the row by its new key.
    mock.clear_calls();
    membership.set("team_id", 4);
    membership.update().unwrap();
    assert_eq!(
        mock.executed()[0].1,
        vec![Value::Int(4), Value::Int(1), Value::Int(3)]
    );
}

#[test]
fn update_on_new_record_inserts() {
    let mock = MockConnection::new();
    let mut user = Record::<User>::new(mock.db());
    user.set("name", "john");
    user.update().unwrap();
    assert!(mock.executed()[0].0.starts_with("INSERT INTO `user`"));
}

#[test]
fn delete_uses_primary_key() {
    let mock = MockConnection::new();
    let mut user = Record::<User>::hydrate(mock.db(), row(&[("id", 9.into())]));
    assert!(user.delete().unwrap());
    assert_eq!(
        mock.executed(),
        vec![(
            "DELETE FROM `user` WHERE `id` = ?".to_string(),
            vec![Value::Int(9)]
        )]
    );
}

#[test]
fn refresh_replaces_attributes() {
    let mock = MockConnection::new();
    mock.push_row(row(&[("id", 1.into()), ("name", "stored".into())]));

    let mut user = Record::<User>::hydrate(mock.db(), row(&[("id", 1.into()), ("name", "x".into())]));
    user.set("name", "local");
    assert!(user.refresh());
    assert_eq!(user.get("name"), Value::from("stored"));
    assert!(!user.is_dirty());
}

// ==================== Save ====================

#[test]
fn save_runs_validation_and_hooks() {
    let mock = MockConnection::new();
    let mut user = Record::<User>::new(mock.db());
    user.set("name", "john");
    assert!(user.save().unwrap());

    assert_eq!(user.scenario(), Some("saved"));
    assert_eq!(
        mock.executed()[0],
        (
            "INSERT INTO `user` (`name`, `status`) VALUES (?, ?)".to_string(),
            vec![Value::from("john"), Value::from("pending")]
        )
    );
}

#[test]
fn failed_validation_aborts_save() {
    let mock = MockConnection::new();
    let mut user = Record::<User>::new(mock.db());
    user.set("age", 3);
    assert!(!user.save().unwrap());
    assert_eq!(user.errors().messages(), vec!["name is required"]);
    assert!(mock.calls().is_empty());
}

#[test]
fn disabled_validation_skips_validate_hook() {
    let mock = MockConnection::new();
    let mut user = Record::<User>::new(mock.db());
    user.validation(false).set("age", 3);
    assert!(user.save().unwrap());
    assert!(user.is_valid());
}

#[test]
fn after_save_sees_failure() {
    let mock = MockConnection::new();
    mock.fail_next_execute("gone away");
    let mut user = Record::<User>::new(mock.db());
    user.set("name", "john");
    assert!(user.save().is_err());
    assert_eq!(user.scenario(), Some("unsaved"));
}

// ==================== Unique ====================

#[test]
fn unique_excludes_own_row_and_flags_duplicates() {
    let mock = MockConnection::new();
    mock.push_row(row(&[("COUNT(*)", 1.into())]));

    let mut user = Record::<User>::hydrate(mock.db(), row(&[("id", 5.into())]));
    assert!(!user.unique("email", "a@b.c"));

    let error = &user.errors().items[0];
    assert_eq!(error.code, ValidationCode::Unique);
    assert_eq!(error.field, "email");
    assert_eq!(
        mock.queries()[0],
        (
            "SELECT COUNT(*) FROM `user` WHERE `user`.`email` = ? AND (`user`.`id` != ?)"
                .to_string(),
            vec![Value::from("a@b.c"), Value::Int(5)]
        )
    );
}

#[test]
fn unique_passes_when_no_row_matches() {
    let mock = MockConnection::new();
    mock.push_row(row(&[("COUNT(*)", 0.into())]));
    let mut user = Record::<User>::new(mock.db());
    assert!(user.unique("email", "a@b.c"));
    assert!(user.is_valid());
}

#[test]
fn unique_resolves_aliases() {
    let mock = MockConnection::new();
    mock.push_row(row(&[("COUNT(*)", 1.into())]));
    let mut user = Record::<User>::new(mock.db());

    assert!(!user.unique("mail", "a@b.c"));
    assert_eq!(user.errors().items[0].field, "email");
    assert_eq!(
        mock.queries()[0].0,
        "SELECT COUNT(*) FROM `user` WHERE `user`.`email` = ?"
    );
}

// ==================== Lookup / relations ====================

#[test]
fn find_by_pk_hydrates_record() {
    let mock = MockConnection::new();
    mock.push_row(row(&[("id", 3.into()), ("name", "ann".into())]));

    let user = Record::<User>::find_by_pk(&mock.db(), 3).unwrap().unwrap();
    assert!(!user.is_new_record());
    assert_eq!(user.get("name"), Value::from("ann"));
    assert_eq!(
        mock.queries()[0].0,
        "SELECT * FROM `user` WHERE `user`.`id` = ? LIMIT 1"
    );
}

#[test]
fn relations_are_resolved_once() {
    let mock = MockConnection::new();
    mock.push_rows(vec![
        row(&[("id", 10.into()), ("user_id", 1.into())]),
        row(&[("id", 11.into()), ("user_id", 1.into())]),
    ]);

    let mut user = Record::<User>::hydrate(mock.db(), row(&[("id", 1.into()), ("team_id", 4.into())]));
    assert_eq!(user.get_relation("posts").unwrap().as_many().len(), 2);
    assert_eq!(user.get_relation("posts").unwrap().as_many().len(), 2);
    assert_eq!(mock.queries().len(), 1);
    assert_eq!(
        mock.queries()[0],
        (
            "SELECT * FROM `post` WHERE `post`.`user_id` = ?".to_string(),
            vec![Value::Int(1)]
        )
    );

    mock.push_row(row(&[("n", 2.into())]));
    let count = user.get_relation("post_count").unwrap();
    assert_eq!(count.as_scalar(), Some(&Value::Int(2)));

    let team = user.get_relation("team").unwrap();
    assert!(team.as_one().is_none());
    assert_eq!(
        mock.queries().last().unwrap(),
        &(
            "SELECT * FROM `team` WHERE `team`.`id` = ? LIMIT 1".to_string(),
            vec![Value::Int(4)]
        )
    );
}
