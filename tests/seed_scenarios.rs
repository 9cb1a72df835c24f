//! Integration tests covering the seed scenarios: initialize+roundtrip,
//! integrity-bit-flip detection, item-insert+group-linkage,
//! password-history-on-update, generator-satisfying-conflicting-rules, and
//! half-enrollment 2FA cleanup.

use imcrypt::model::{Group, GroupUpdate, Item, ItemUpdate, Ruleset};
use imcrypt::session::{Session, SessionState};
use imcrypt::{keycache, ImcryptError};

fn blank_carrier(dir: &std::path::Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let image = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        256,
        256,
        image::Rgba([7, 7, 7, 255]),
    ));
    image
        .save_with_format(&path, image::ImageFormat::Png)
        .unwrap();
    path
}

fn login_item(title: &str, password: &str) -> Item {
    Item {
        item_type: imcrypt::config::item_kind::LOGIN.to_string(),
        title: title.to_string(),
        password: password.to_string(),
        ruleset: Ruleset {
            charset: "abcdefghijklmnopqrstuvwxyz0123456789".to_string(),
            ..Ruleset::default()
        },
        ..Default::default()
    }
}

// S1: initialize a new vault, unlock it back, and read the same database.
#[test]
fn s1_init_and_roundtrip() {
    let _guard = keycache::test_lock();
    keycache::delete();

    let dir = tempfile::tempdir().unwrap();
    let path = blank_carrier(dir.path(), "s1.png");

    let mut session = Session::new();
    session.load_file(&path).unwrap();
    session.initialize_storage("s1-password").unwrap();
    assert_eq!(session.state(), SessionState::Unlocked);

    session.close_session();

    session.load_file(&path).unwrap();
    session.unlock("s1-password").unwrap();
    let (database, has_2fa) = session.get_database().unwrap();
    assert!(database.items.is_empty());
    assert!(!has_2fa);

    session.close_session();
    keycache::delete();
}

// S2: flipping a bit in the encrypted blob is detected as an integrity
// failure rather than silently producing garbage data.
#[test]
fn s2_tampered_storage_fails_integrity_check() {
    let _guard = keycache::test_lock();
    keycache::delete();

    let dir = tempfile::tempdir().unwrap();
    let path = blank_carrier(dir.path(), "s2.png");

    let mut session = Session::new();
    session.load_file(&path).unwrap();
    session.initialize_storage("s2-password").unwrap();
    session.close_session();

    // Flip a low bit in the carrier's pixel data directly, corrupting the
    // embedded payload without touching the PNG container structure.
    let mut bytes = std::fs::read(&path).unwrap();
    let midpoint = bytes.len() / 2;
    bytes[midpoint] ^= 0x01;
    std::fs::write(&path, &bytes).unwrap();

    session.load_file(&path).unwrap();
    let result = session.unlock("s2-password");
    assert!(result.is_err());

    keycache::delete();
}

// S3: inserting an item with a group id links the group to the item.
#[test]
fn s3_insert_item_and_group_linkage() {
    let _guard = keycache::test_lock();
    keycache::delete();

    let dir = tempfile::tempdir().unwrap();
    let path = blank_carrier(dir.path(), "s3.png");

    let mut session = Session::new();
    session.load_file(&path).unwrap();
    session.initialize_storage("s3-password").unwrap();

    let group_ids = session
        .insert_groups(vec![Group {
            name: "Banking".to_string(),
            ..Default::default()
        }])
        .unwrap();

    let item_ids = session
        .insert_items(vec![(login_item("Bank", "p@ssw0rd1"), group_ids.clone())])
        .unwrap();

    let (database, _) = session.get_database().unwrap();
    assert!(database.groups[&group_ids[0]].items.contains(&item_ids[0]));

    session.close_session();
    keycache::delete();
}

// S4: updating a login's password records the old value in history and
// later blocks reuse when the ruleset forbids it.
#[test]
fn s4_password_history_on_update() {
    let _guard = keycache::test_lock();
    keycache::delete();

    let dir = tempfile::tempdir().unwrap();
    let path = blank_carrier(dir.path(), "s4.png");

    let mut session = Session::new();
    session.load_file(&path).unwrap();
    session.initialize_storage("s4-password").unwrap();

    let mut item = login_item("Email", "first-password");
    item.ruleset.reuse = false;
    let item_ids = session.insert_items(vec![(item, vec![])]).unwrap();

    session
        .update_items_by_id(vec![ItemUpdate {
            item_id: item_ids[0].clone(),
            item: Item {
                password: "second-password".to_string(),
                ..Default::default()
            },
            mask: vec!["password".to_string()],
            include_group_ids: true,
            ..Default::default()
        }])
        .unwrap();

    let (database, _) = session.get_database().unwrap();
    assert_eq!(
        database.items[&item_ids[0]].prev_passwords,
        vec!["first-password".to_string()]
    );

    let reuse_attempt = session.update_items_by_id(vec![ItemUpdate {
        item_id: item_ids[0].clone(),
        item: Item {
            password: "first-password".to_string(),
            ..Default::default()
        },
        mask: vec!["password".to_string()],
        include_group_ids: true,
        ..Default::default()
    }]);
    assert!(reuse_attempt.is_err());

    session.close_session();
    keycache::delete();
}

// S5: a ruleset whose at-least constraints cannot possibly coexist within
// max_length fails with a clear "constraints conflict" error rather than
// looping forever or silently returning an invalid password.
#[test]
fn s5_conflicting_ruleset_fails_generation() {
    let mut ruleset = Ruleset::default();
    ruleset.min_length = 2;
    ruleset.max_length = 2;
    ruleset.charset = "ab".to_string();
    ruleset.at_least_constraints = vec![
        imcrypt::model::IterationConstraint {
            iterations: 2,
            charset: "a".to_string(),
        },
        imcrypt::model::IterationConstraint {
            iterations: 2,
            charset: "b".to_string(),
        },
    ];

    let result = imcrypt::generate::generate(&ruleset, &[]);
    assert!(matches!(result, Err(ImcryptError::ConstraintsConflict)));
}

// S6: enrolling two-factor authentication but never confirming it leaves a
// recovery hash behind; the next successful unlock sweeps it away.
#[test]
fn s6_half_enrolled_two_factor_is_swept_on_unlock() {
    let _guard = keycache::test_lock();
    keycache::delete();

    let dir = tempfile::tempdir().unwrap();
    let path = blank_carrier(dir.path(), "s6.png");

    let mut session = Session::new();
    session.load_file(&path).unwrap();
    session.initialize_storage("s6-password").unwrap();

    session.generate_two_factor_secret().unwrap();
    assert!(session.has_two_factor_authentication().unwrap());
    session.flush();

    session.lock();
    session.unlock("s6-password").unwrap();

    assert!(!session.has_two_factor_authentication().unwrap());
    let (database, has_secret) = session.get_database().unwrap();
    let _ = database;
    assert!(!has_secret);

    session.close_session();
    keycache::delete();
}

// A group deletion that leaves a dangling item-side reference is tolerated
// rather than rejected -- the group update's own itemIds check runs against
// still-existing groups, not the other way around.
#[test]
fn group_deletion_does_not_block_subsequent_operations() {
    let _guard = keycache::test_lock();
    keycache::delete();

    let dir = tempfile::tempdir().unwrap();
    let path = blank_carrier(dir.path(), "group-delete.png");

    let mut session = Session::new();
    session.load_file(&path).unwrap();
    session.initialize_storage("password").unwrap();

    let group_ids = session
        .insert_groups(vec![Group {
            name: "Temp".to_string(),
            ..Default::default()
        }])
        .unwrap();
    let item_ids = session
        .insert_items(vec![(login_item("Item", "pass1234"), group_ids.clone())])
        .unwrap();

    session.delete_groups_by_id(&group_ids).unwrap();

    let (database, _) = session.get_database().unwrap();
    assert!(database.items.contains_key(&item_ids[0]));
    assert!(!database.groups.contains_key(&group_ids[0]));

    session.close_session();
    keycache::delete();
}

#[test]
fn group_name_reuse_rejected() {
    let _guard = keycache::test_lock();
    keycache::delete();

    let dir = tempfile::tempdir().unwrap();
    let path = blank_carrier(dir.path(), "group-update.png");

    let mut session = Session::new();
    session.load_file(&path).unwrap();
    session.initialize_storage("password").unwrap();

    let group_ids = session
        .insert_groups(vec![
            Group {
                name: "Work".to_string(),
                ..Default::default()
            },
            Group {
                name: "Personal".to_string(),
                ..Default::default()
            },
        ])
        .unwrap();

    let result = session.update_groups_by_id(vec![GroupUpdate {
        group_id: group_ids[1].clone(),
        group: Group {
            name: "WORK".to_string(),
            ..Default::default()
        },
        mask: vec!["name".to_string()],
    }]);
    assert!(result.is_err());

    session.close_session();
    keycache::delete();
}
