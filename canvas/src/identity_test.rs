use super::*;

#[test]
fn display_name_bounds_are_inclusive_and_trimmed() {
    assert!(validate_display_name("a").is_err());
    assert_eq!(validate_display_name("ab").expect("min"), "ab");
    assert_eq!(validate_display_name("  Amy  ").expect("trimmed"), "Amy");
    assert!(validate_display_name(&"x".repeat(40)).is_ok());
    assert!(matches!(
        validate_display_name(&"x".repeat(41)),
        Err(IdentityError::InvalidName { len: 41, .. })
    ));
    assert!(validate_display_name("   a   ").is_err());
}

#[test]
fn name_length_counts_characters_not_bytes() {
    assert!(validate_display_name("éé").is_ok());
    assert!(validate_display_name(&"é".repeat(40)).is_ok());
}

#[test]
fn generated_identity_uses_a_non_background_palette_color() {
    for _ in 0..50 {
        let identity = Identity::generate();
        assert_ne!(identity.color, DEFAULT_PALETTE[0]);
        assert!(DEFAULT_PALETTE.contains(&identity.color.as_str()));
        assert!(identity.display_name.starts_with("anon-"));
    }
}

#[test]
fn load_or_create_is_stable_across_calls() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IdentityStore::scoped(dir.path(), "default");
    let first = store.load_or_create().expect("create");
    let second = store.load_or_create().expect("load");
    assert_eq!(first, second);
    assert!(store.path().ends_with("identity-default.json"));
}

#[test]
fn scopes_have_separate_identities() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = IdentityStore::scoped(dir.path(), "a").load_or_create().expect("a");
    let b = IdentityStore::scoped(dir.path(), "b").load_or_create().expect("b");
    assert_ne!(a.id, b.id);
}

#[test]
fn set_display_name_writes_through() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IdentityStore::new(dir.path().join("nested/id.json"));
    let created = store.load_or_create().expect("create");
    let renamed = store.set_display_name(" Amy ").expect("rename");
    assert_eq!(renamed.id, created.id);
    assert_eq!(store.load_or_create().expect("load").display_name, "Amy");
}

#[test]
fn invalid_name_leaves_file_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IdentityStore::scoped(dir.path(), "x");
    let created = store.load_or_create().expect("create");
    assert!(store.set_display_name("a").is_err());
    assert_eq!(store.load_or_create().expect("load"), created);
}

#[test]
fn corrupt_file_is_replaced() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IdentityStore::scoped(dir.path(), "x");
    fs::write(store.path(), "{not json").expect("write");
    let identity = store.load_or_create().expect("recreate");
    assert_eq!(store.load_or_create().expect("load"), identity);
}

#[test]
fn presence_meta_carries_name_and_color() {
    let identity = Identity { id: Uuid::nil(), display_name: "Amy".into(), color: "#FFFFFF".into() };
    assert_eq!(identity.presence_meta(), json!({"name": "Amy", "color": "#FFFFFF"}));
    assert_eq!(identity.presence_key(), Uuid::nil().to_string());
}
