use super::*;
use canvas::channel::LocalHub;
use canvas::store::MemoryStore;

async fn open_memory_session(name: &str) -> Session {
    let store = MemoryStore::new();
    store.create_board(1, 4).await;
    let identity = Identity { display_name: name.to_owned(), ..Identity::generate() };
    let mut session =
        Session::new(identity, Arc::new(store), Arc::new(LocalHub::new()), SessionConfig::default());
    session.open(1, 4, Instant::now()).await;
    session
}

#[test]
fn board_args_default_to_board_one() {
    let cli = Cli::try_parse_from(["pixelboard", "place", "5", "5", "3"]).expect("parse");
    let Command::Place { board, x, y, color } = cli.command else {
        panic!("expected place");
    };
    assert_eq!((board.board, board.size), (1, DEFAULT_BOARD_SIZE));
    assert_eq!((x, y, color), (5, 5, 3));
    assert_eq!(cli.profile, "default");
    assert!(!cli.versioned);
}

#[test]
fn board_and_size_flags_override_defaults() {
    let cli = Cli::try_parse_from(["pixelboard", "--versioned", "load", "--board", "2", "--size", "16", "--cells"])
        .expect("parse");
    assert!(cli.versioned);
    let Command::Load { board, cells } = cli.command else {
        panic!("expected load");
    };
    assert_eq!((board.board, board.size), (2, 16));
    assert!(cells);
}

#[test]
fn place_requires_coordinates_and_color() {
    assert!(Cli::try_parse_from(["pixelboard", "place", "5", "5"]).is_err());
}

#[tokio::test]
async fn status_turns_server_once_a_write_lands() {
    let mut session = open_memory_session("A").await;
    let status = status_json(&session);
    assert_eq!(status["board_id"], 1);
    assert_eq!(status["size"], 4);
    // A never-written board has no usable snapshot yet.
    assert_eq!(status["source"], "local");
    assert_eq!(status["connected"], true);

    session.place_color(0, 0, 1, Instant::now()).await.expect("placed");
    let status = status_json(&session);
    assert_eq!(status["source"], "server");
    assert!(status["last_persist_error"].is_null());
}

#[tokio::test]
async fn placement_json_carries_wire_payload_and_cooldown() {
    let mut session = open_memory_session("A").await;
    let now = Instant::now();
    let placement = session.place_color(1, 2, 3, now).await.expect("placed");
    let value = placement_json(&placement, &session, now);
    assert_eq!(value["idx"], 9);
    assert_eq!(value["event"], "pixel");
    assert_eq!(value["payload"], json!({"x": 1, "y": 2, "colorIndex": 3, "owner": "A"}));
    assert_eq!(value["cooldown_secs"], 3);
    assert_eq!(value["status"]["version"], 1);
}

#[test]
fn cells_render_as_color_or_image() {
    assert_eq!(cell_json(&Cell::Color(4)), json!({"color": 4}));
    assert_eq!(cell_json(&Cell::Image("http://t/1.png".into())), json!({"image": "http://t/1.png"}));
}

#[test]
fn identity_json_exposes_presence_key() {
    let identity = Identity::generate();
    let value = identity_json(&identity);
    assert_eq!(value["presence_key"], identity.id.to_string());
    assert_eq!(value["display_name"], identity.display_name);
}

#[test]
fn identity_profiles_live_in_separate_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = IdentityStore::scoped(dir.path(), "a").load_or_create().expect("a");
    let b = IdentityStore::scoped(dir.path(), "b").load_or_create().expect("b");
    assert_ne!(a.id, b.id);
    let again = IdentityStore::scoped(dir.path(), "a").load_or_create().expect("a again");
    assert_eq!(again.id, a.id);
}

#[tokio::test]
async fn cooldown_from_an_earlier_run_refuses_the_next_place() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stamp = CooldownStamp::beside(IdentityStore::scoped(dir.path(), "a").path());
    stamp.record(SystemTime::now()).expect("record");

    let mut session = open_memory_session("A").await;
    let now = Instant::now();
    carry_cooldown(&mut session, &stamp, now);
    let err = session.place_color(0, 0, 1, now).await.expect_err("cooling down");
    assert!(matches!(err, PlaceError::CoolingDown(_)));

    let later = now + session.config().cooldown;
    session.place_color(0, 0, 1, later).await.expect("placed after cooldown");
}

#[tokio::test]
async fn no_stamp_leaves_the_session_ready() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stamp = CooldownStamp::beside(IdentityStore::scoped(dir.path(), "a").path());
    let mut session = open_memory_session("A").await;
    let now = Instant::now();
    carry_cooldown(&mut session, &stamp, now);
    assert_eq!(session.cooldown_remaining(now), Duration::ZERO);
}
