//! Integration tests for the dispatcher and per-device sessions.
//!
//! These drive the full press pipeline (key event → pager → face upload →
//! effect) against in-memory decks, so no hardware is needed. Faces are
//! stubbed as `name:label` byte strings to make uploads easy to assert.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use deck_transport::{
    BoxedDeck, Deck, DeckInfo, DeckKind, DeviceDiscovery, DiscoveredDeck, KeyEvent,
    KeyImageFormat, TransportError, VENDOR_ID,
};
use deckd::{
    ActionRunner, AppGrid, ConfigStore, DeckError, Direction, Dispatcher, FaceRenderer,
    SessionContext, Slot,
};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};

// ── Mock deck ──

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Reset,
    Brightness(u8),
    Image(u8, String),
    Close,
}

#[derive(Default)]
struct MockState {
    ops: Vec<Op>,
    closed: bool,
    fail_images: bool,
}

/// Test-side handle to a mock deck; the dispatcher gets a `MockDeck`
#[derive(Clone)]
struct MockHandle {
    info: DeckInfo,
    state: Arc<Mutex<MockState>>,
    keys: broadcast::Sender<KeyEvent>,
}

impl MockHandle {
    fn new(path: &str, kind: DeckKind) -> Self {
        let (keys, _) = broadcast::channel(64);
        Self {
            info: DeckInfo {
                vid: VENDOR_ID,
                pid: kind.pid(),
                kind,
                device_path: path.to_string(),
                serial: Some(format!("SN-{path}")),
                product_name: Some(kind.display_name().to_string()),
            },
            state: Arc::new(Mutex::new(MockState::default())),
            keys,
        }
    }

    fn key(&self, key: u8, pressed: bool) {
        self.keys.send(KeyEvent { key, pressed }).ok();
    }

    fn press(&self, key: u8) {
        self.key(key, true);
    }

    fn ops(&self) -> Vec<Op> {
        self.state.lock().ops.clone()
    }

    fn clear(&self) {
        self.state.lock().ops.clear();
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn fail_images(&self) {
        self.state.lock().fail_images = true;
    }

    fn started(&self) -> bool {
        self.ops().iter().any(|op| matches!(op, Op::Brightness(_)))
    }
}

struct MockDeck {
    handle: MockHandle,
}

impl MockDeck {
    fn write(&self, op: Op) -> Result<(), TransportError> {
        let mut state = self.handle.state.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        if state.fail_images && matches!(op, Op::Image(..)) {
            return Err(TransportError::Disconnected);
        }
        state.ops.push(op);
        Ok(())
    }
}

impl Deck for MockDeck {
    fn info(&self) -> &DeckInfo {
        &self.handle.info
    }

    fn is_open(&self) -> bool {
        !self.handle.state.lock().closed
    }

    fn serial_number(&mut self) -> Result<String, TransportError> {
        Ok(self.handle.info.serial.clone().unwrap_or_default())
    }

    fn firmware_version(&mut self) -> Result<String, TransportError> {
        Ok("1.00.000".to_string())
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.write(Op::Reset)
    }

    fn set_brightness(&mut self, percent: u8) -> Result<(), TransportError> {
        self.write(Op::Brightness(percent))
    }

    fn set_key_image(&mut self, key: u8, image: &[u8]) -> Result<(), TransportError> {
        self.write(Op::Image(key, String::from_utf8_lossy(image).into_owned()))
    }

    fn subscribe_keys(&self) -> Option<broadcast::Receiver<KeyEvent>> {
        Some(self.handle.keys.subscribe())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.handle.state.lock();
        state.closed = true;
        state.ops.push(Op::Close);
        Ok(())
    }
}

struct MockDiscovery {
    decks: Vec<MockHandle>,
    opened: Arc<Mutex<Vec<String>>>,
    unopenable: Option<String>,
}

impl MockDiscovery {
    fn new(decks: &[&MockHandle]) -> Self {
        Self {
            decks: decks.iter().map(|h| (*h).clone()).collect(),
            opened: Arc::new(Mutex::new(Vec::new())),
            unopenable: None,
        }
    }
}

impl DeviceDiscovery for MockDiscovery {
    fn list_devices(&self) -> Result<Vec<DiscoveredDeck>, TransportError> {
        Ok(self
            .decks
            .iter()
            .map(|h| DiscoveredDeck {
                info: h.info.clone(),
            })
            .collect())
    }

    fn open_device(&self, device: &DiscoveredDeck) -> Result<BoxedDeck, TransportError> {
        let path = &device.info.device_path;
        if self.unopenable.as_deref() == Some(path.as_str()) {
            return Err(TransportError::HidPermissionDenied(path.clone()));
        }
        let handle = self
            .decks
            .iter()
            .find(|h| &h.info.device_path == path)
            .ok_or_else(|| TransportError::DeviceNotFound(path.clone()))?;
        self.opened.lock().push(path.clone());
        Ok(Box::new(MockDeck {
            handle: handle.clone(),
        }))
    }
}

// ── Stub renderer and runner ──

struct StubRenderer;

impl FaceRenderer for StubRenderer {
    fn render(&self, slot: &Slot, _format: &KeyImageFormat) -> Result<Option<Vec<u8>>, DeckError> {
        match slot {
            Slot::Empty => Ok(None),
            Slot::Action { name, .. } if name == "ghost" => Err(DeckError::AssetMissing {
                path: PathBuf::from("assets/ghost.png"),
            }),
            Slot::Action { name, label, .. } => Ok(Some(format!("{name}:{label}").into_bytes())),
        }
    }

    fn blank(&self, _format: &KeyImageFormat) -> Result<Vec<u8>, DeckError> {
        Ok(b"blank".to_vec())
    }
}

#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<String>>,
}

impl RecordingRunner {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl ActionRunner for RecordingRunner {
    fn launch(&self, name: &str, argv: &[String]) -> Result<(), DeckError> {
        self.calls
            .lock()
            .push(format!("launch {} {}", name, argv.join(" ")));
        Ok(())
    }

    fn navigate(&self, direction: Direction) -> Result<(), DeckError> {
        self.calls.lock().push(format!("focus {}", direction.as_str()));
        Ok(())
    }
}

// ── Harness ──

/// Two pages: page 0 = [left, right, exit, browser, custom, up, reload, ghost],
/// page 1 = [left, right, exit] labelled "p2"
const APPS: &str = r#"[
    [{"name":"left"},{"name":"right"},{"name":"exit"},
     {"name":"browser","command":["firefox"],"label":"Web"},
     {"name":"custom"},{"name":"up"},{"name":"reload"},{"name":"ghost"}],
    [{"name":"left","label":"p2"},{"name":"right","label":"p2"},
     {"name":"exit","label":"p2"},{},{},{},{"name":"reload","label":"p2"}]
]"#;

const LEFT: u8 = 0;
const RIGHT: u8 = 1;
const EXIT: u8 = 2;
const BROWSER: u8 = 3;
const CUSTOM: u8 = 4;
const UP: u8 = 5;
const RELOAD: u8 = 6;
const GHOST: u8 = 7;

fn grid(text: &str) -> AppGrid {
    AppGrid::parse(text, Path::new("apps.json")).unwrap()
}

fn context(store: ConfigStore, runner: Arc<RecordingRunner>) -> SessionContext {
    SessionContext {
        store: Arc::new(store),
        renderer: Arc::new(StubRenderer),
        runner,
        brightness: 50,
        wrap: true,
    }
}

struct Running {
    stop: watch::Sender<bool>,
    task: tokio::task::JoinHandle<Result<usize, DeckError>>,
}

impl Running {
    async fn stop(self) -> Result<usize, DeckError> {
        self.stop.send(true).ok();
        self.finish().await
    }

    async fn finish(self) -> Result<usize, DeckError> {
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("dispatcher did not finish")
            .expect("dispatcher panicked")
    }
}

fn spawn(discovery: MockDiscovery, ctx: SessionContext) -> Running {
    let (stop, stop_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut dispatcher = Dispatcher::new(Box::new(discovery), ctx);
        dispatcher.run(stop_rx).await
    });
    Running { stop, task }
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

fn image(key: u8, face: &str) -> Op {
    Op::Image(key, face.to_string())
}

fn page0_faces() -> Vec<Op> {
    vec![
        image(LEFT, "left:"),
        image(RIGHT, "right:"),
        image(EXIT, "exit:"),
        image(BROWSER, "browser:Web"),
        image(CUSTOM, "custom:"),
        image(UP, "up:"),
        image(RELOAD, "reload:"),
    ]
}

fn page1_faces() -> Vec<Op> {
    vec![
        image(LEFT, "left:p2"),
        image(RIGHT, "right:p2"),
        image(EXIT, "exit:p2"),
        image(RELOAD, "reload:p2"),
    ]
}

// ── Startup ──

#[tokio::test]
async fn startup_resets_draws_page_then_sets_brightness() {
    let deck = MockHandle::new("/dev/hidraw0", DeckKind::Mk2);
    let runner = Arc::new(RecordingRunner::default());
    let running = spawn(
        MockDiscovery::new(&[&deck]),
        context(ConfigStore::with_grid("apps.json", grid(APPS)), runner),
    );
    wait_until("startup", || deck.started()).await;

    let mut expected = vec![Op::Reset];
    // Missing icon for "ghost" is skipped, not fatal
    expected.extend(page0_faces());
    expected.push(Op::Brightness(50));
    assert_eq!(deck.ops(), expected);

    assert_eq!(running.stop().await.unwrap(), 1);
}

#[tokio::test]
async fn non_visual_decks_are_skipped() {
    let pedal = MockHandle::new("/dev/hidraw1", DeckKind::Pedal);
    let deck = MockHandle::new("/dev/hidraw2", DeckKind::Mk2);
    let discovery = MockDiscovery::new(&[&pedal, &deck]);
    let opened = Arc::clone(&discovery.opened);
    let running = spawn(
        discovery,
        context(
            ConfigStore::with_grid("apps.json", grid(APPS)),
            Arc::new(RecordingRunner::default()),
        ),
    );
    wait_until("startup", || deck.started()).await;

    assert_eq!(*opened.lock(), vec!["/dev/hidraw2".to_string()]);
    assert!(pedal.ops().is_empty());
    assert_eq!(running.stop().await.unwrap(), 1);
}

#[tokio::test]
async fn no_visual_deck_exits_cleanly() {
    let pedal = MockHandle::new("/dev/hidraw1", DeckKind::Pedal);
    let running = spawn(
        MockDiscovery::new(&[&pedal]),
        context(
            ConfigStore::with_grid("apps.json", grid(APPS)),
            Arc::new(RecordingRunner::default()),
        ),
    );
    assert_eq!(running.finish().await.unwrap(), 0);
}

// ── Paging ──

#[tokio::test]
async fn right_then_wrap_then_left() {
    let deck = MockHandle::new("/dev/hidraw0", DeckKind::Mk2);
    let running = spawn(
        MockDiscovery::new(&[&deck]),
        context(
            ConfigStore::with_grid("apps.json", grid(APPS)),
            Arc::new(RecordingRunner::default()),
        ),
    );
    wait_until("startup", || deck.started()).await;

    // Page 0 -> 1: the pressed key is refreshed, then the new page is drawn
    deck.clear();
    deck.press(RIGHT);
    let mut expected = vec![image(RIGHT, "right:"), Op::Reset];
    expected.extend(page1_faces());
    wait_until("page 1", || deck.ops().len() == expected.len()).await;
    assert_eq!(deck.ops(), expected);

    // Release refreshes the key on the new page only
    deck.clear();
    deck.key(RIGHT, false);
    wait_until("release", || !deck.ops().is_empty()).await;
    assert_eq!(deck.ops(), vec![image(RIGHT, "right:p2")]);

    // Page 1 -> 0 (wrap)
    deck.clear();
    deck.press(RIGHT);
    let mut expected = vec![image(RIGHT, "right:p2"), Op::Reset];
    expected.extend(page0_faces());
    wait_until("wrap to page 0", || deck.ops().len() == expected.len()).await;
    assert_eq!(deck.ops(), expected);

    // Page 0 -> 1 (wrap backwards)
    deck.clear();
    deck.press(LEFT);
    let mut expected = vec![image(LEFT, "left:"), Op::Reset];
    expected.extend(page1_faces());
    wait_until("wrap to page 1", || deck.ops().len() == expected.len()).await;
    assert_eq!(deck.ops(), expected);

    running.stop().await.unwrap();
}

#[tokio::test]
async fn empty_key_press_blanks_face() {
    let deck = MockHandle::new("/dev/hidraw0", DeckKind::Mk2);
    let runner = Arc::new(RecordingRunner::default());
    let running = spawn(
        MockDiscovery::new(&[&deck]),
        context(
            ConfigStore::with_grid("apps.json", grid(APPS)),
            Arc::clone(&runner),
        ),
    );
    wait_until("startup", || deck.started()).await;

    deck.clear();
    deck.press(12);
    wait_until("blank", || !deck.ops().is_empty()).await;
    assert_eq!(deck.ops(), vec![image(12, "blank")]);
    assert!(runner.calls().is_empty());

    running.stop().await.unwrap();
}

// ── Effects ──

#[tokio::test]
async fn launch_and_focus_go_to_runner() {
    let deck = MockHandle::new("/dev/hidraw0", DeckKind::Mk2);
    let runner = Arc::new(RecordingRunner::default());
    let running = spawn(
        MockDiscovery::new(&[&deck]),
        context(
            ConfigStore::with_grid("apps.json", grid(APPS)),
            Arc::clone(&runner),
        ),
    );
    wait_until("startup", || deck.started()).await;

    deck.clear();
    deck.press(BROWSER);
    deck.press(UP);
    wait_until("runner calls", || runner.calls().len() == 2).await;
    assert_eq!(runner.calls(), vec!["launch browser firefox", "focus up"]);

    // Neither effect redraws the page
    assert_eq!(
        deck.ops(),
        vec![image(BROWSER, "browser:Web"), image(UP, "up:")]
    );

    running.stop().await.unwrap();
}

#[tokio::test]
async fn missing_command_does_not_stop_session() {
    let deck = MockHandle::new("/dev/hidraw0", DeckKind::Mk2);
    let runner = Arc::new(RecordingRunner::default());
    let running = spawn(
        MockDiscovery::new(&[&deck]),
        context(
            ConfigStore::with_grid("apps.json", grid(APPS)),
            Arc::clone(&runner),
        ),
    );
    wait_until("startup", || deck.started()).await;

    deck.press(CUSTOM);
    deck.press(GHOST);
    deck.clear();
    deck.press(RIGHT);
    wait_until("page 1", || deck.ops().contains(&image(RELOAD, "reload:p2"))).await;

    assert!(runner.calls().is_empty());
    assert!(!deck.is_closed());
    running.stop().await.unwrap();
}

#[tokio::test]
async fn failed_reload_keeps_page_and_grid() {
    let path = std::env::temp_dir().join(format!("deckd-it-reload-{}.json", std::process::id()));
    std::fs::write(&path, APPS).unwrap();

    let deck = MockHandle::new("/dev/hidraw0", DeckKind::Mk2);
    let running = spawn(
        MockDiscovery::new(&[&deck]),
        context(
            ConfigStore::open(&path).unwrap(),
            Arc::new(RecordingRunner::default()),
        ),
    );
    wait_until("startup", || deck.started()).await;

    deck.press(RIGHT);
    wait_until("page 1", || deck.ops().contains(&image(RELOAD, "reload:p2"))).await;

    std::fs::write(&path, "[[{\"name\": ").unwrap();
    deck.clear();
    deck.press(RELOAD);

    // Still on page 1 with the old grid, redrawn anyway
    let mut expected = vec![image(RELOAD, "reload:p2"), Op::Reset];
    expected.extend(page1_faces());
    wait_until("redraw", || deck.ops().len() == expected.len()).await;
    assert_eq!(deck.ops(), expected);

    running.stop().await.unwrap();
    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn reload_picks_up_new_grid() {
    let path = std::env::temp_dir().join(format!("deckd-it-swap-{}.json", std::process::id()));
    std::fs::write(&path, APPS).unwrap();

    let deck = MockHandle::new("/dev/hidraw0", DeckKind::Mk2);
    let running = spawn(
        MockDiscovery::new(&[&deck]),
        context(
            ConfigStore::open(&path).unwrap(),
            Arc::new(RecordingRunner::default()),
        ),
    );
    wait_until("startup", || deck.started()).await;

    std::fs::write(
        &path,
        r#"[[{"name":"exit"},{},{},{},{},{},{"name":"reload","label":"new"}]]"#,
    )
    .unwrap();
    deck.clear();
    deck.press(RELOAD);

    let expected = vec![
        image(RELOAD, "reload:"),
        Op::Reset,
        image(0, "exit:"),
        image(RELOAD, "reload:new"),
    ];
    wait_until("redraw", || deck.ops().len() == expected.len()).await;
    assert_eq!(deck.ops(), expected);

    running.stop().await.unwrap();
    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn reload_to_fewer_pages_moves_to_last_page() {
    let path = std::env::temp_dir().join(format!("deckd-it-shrink-{}.json", std::process::id()));
    std::fs::write(&path, APPS).unwrap();

    let deck = MockHandle::new("/dev/hidraw0", DeckKind::Mk2);
    let running = spawn(
        MockDiscovery::new(&[&deck]),
        context(
            ConfigStore::open(&path).unwrap(),
            Arc::new(RecordingRunner::default()),
        ),
    );
    wait_until("startup", || deck.started()).await;

    deck.clear();
    deck.press(RIGHT);
    let mut expected = vec![image(RIGHT, "right:"), Op::Reset];
    expected.extend(page1_faces());
    wait_until("page 1", || deck.ops().len() == expected.len()).await;

    // Shrink to a single page while the cursor sits on page 1
    std::fs::write(
        &path,
        r#"[[{"name":"exit"},{},{},{},{},{},{"name":"reload","label":"new"}]]"#,
    )
    .unwrap();
    deck.clear();
    deck.press(RELOAD);

    let expected = vec![
        image(RELOAD, "reload:p2"),
        Op::Reset,
        image(0, "exit:"),
        image(RELOAD, "reload:new"),
    ];
    wait_until("redraw", || deck.ops().len() == expected.len()).await;
    assert_eq!(deck.ops(), expected);

    // Cursor stays on the only page
    deck.clear();
    deck.press(RELOAD);
    let expected = vec![
        image(RELOAD, "reload:new"),
        Op::Reset,
        image(0, "exit:"),
        image(RELOAD, "reload:new"),
    ];
    wait_until("second reload", || deck.ops().len() == expected.len()).await;
    assert_eq!(deck.ops(), expected);

    running.stop().await.unwrap();
    std::fs::remove_file(&path).ok();
}

// ── Lifecycle ──

#[tokio::test]
async fn exit_releases_only_that_deck() {
    let a = MockHandle::new("/dev/hidraw0", DeckKind::Mk2);
    let b = MockHandle::new("/dev/hidraw1", DeckKind::Xl);
    let running = spawn(
        MockDiscovery::new(&[&a, &b]),
        context(
            ConfigStore::with_grid("apps.json", grid(APPS)),
            Arc::new(RecordingRunner::default()),
        ),
    );
    wait_until("startup", || a.started() && b.started()).await;

    a.clear();
    a.press(EXIT);
    wait_until("deck a closed", || a.is_closed()).await;
    assert_eq!(a.ops(), vec![image(EXIT, "exit:"), Op::Reset, Op::Close]);

    // Deck b is unaffected and keeps its own page cursor
    b.clear();
    b.press(RIGHT);
    wait_until("deck b page 1", || b.ops().contains(&image(RELOAD, "reload:p2"))).await;
    assert!(!b.is_closed());

    assert_eq!(running.stop().await.unwrap(), 2);
    assert!(b.is_closed());
}

#[tokio::test]
async fn stop_signal_releases_every_deck() {
    let a = MockHandle::new("/dev/hidraw0", DeckKind::Mk2);
    let b = MockHandle::new("/dev/hidraw1", DeckKind::Mini);
    let running = spawn(
        MockDiscovery::new(&[&a, &b]),
        context(
            ConfigStore::with_grid("apps.json", grid(APPS)),
            Arc::new(RecordingRunner::default()),
        ),
    );
    wait_until("startup", || a.started() && b.started()).await;
    a.clear();
    b.clear();

    assert_eq!(running.stop().await.unwrap(), 2);
    assert_eq!(a.ops(), vec![Op::Reset, Op::Close]);
    assert_eq!(b.ops(), vec![Op::Reset, Op::Close]);
}

#[tokio::test]
async fn device_failure_tears_down_all_decks() {
    let a = MockHandle::new("/dev/hidraw0", DeckKind::Mk2);
    let b = MockHandle::new("/dev/hidraw1", DeckKind::Mk2);
    let running = spawn(
        MockDiscovery::new(&[&a, &b]),
        context(
            ConfigStore::with_grid("apps.json", grid(APPS)),
            Arc::new(RecordingRunner::default()),
        ),
    );
    wait_until("startup", || a.started() && b.started()).await;

    b.fail_images();
    b.press(LEFT);

    let err = running.finish().await.unwrap_err();
    assert!(matches!(
        err,
        DeckError::Device(TransportError::Disconnected)
    ));
    assert!(a.is_closed());
    assert!(b.is_closed());
    assert_eq!(a.ops().last(), Some(&Op::Close));
}

#[tokio::test]
async fn open_failure_releases_decks_opened_so_far() {
    let a = MockHandle::new("/dev/hidraw0", DeckKind::Mk2);
    let b = MockHandle::new("/dev/hidraw1", DeckKind::Mk2);
    let mut discovery = MockDiscovery::new(&[&a, &b]);
    discovery.unopenable = Some("/dev/hidraw1".to_string());

    let running = spawn(
        discovery,
        context(
            ConfigStore::with_grid("apps.json", grid(APPS)),
            Arc::new(RecordingRunner::default()),
        ),
    );

    let err = running.finish().await.unwrap_err();
    assert!(matches!(
        err,
        DeckError::Device(TransportError::HidPermissionDenied(_))
    ));
    assert!(a.is_closed());
    assert_eq!(a.ops().last(), Some(&Op::Close));
    assert!(b.ops().is_empty());
}

// ── Runtime ──

/// Holds each face render, once armed, until the test releases it
struct GatedRenderer {
    armed: AtomicBool,
    gate: Mutex<mpsc::Receiver<()>>,
    timed_out: AtomicBool,
}

impl FaceRenderer for GatedRenderer {
    fn render(&self, slot: &Slot, format: &KeyImageFormat) -> Result<Option<Vec<u8>>, DeckError> {
        if self.armed.swap(false, Ordering::SeqCst)
            && self.gate.lock().recv_timeout(Duration::from_secs(2)).is_err()
        {
            self.timed_out.store(true, Ordering::SeqCst);
        }
        StubRenderer.render(slot, format)
    }

    fn blank(&self, format: &KeyImageFormat) -> Result<Vec<u8>, DeckError> {
        StubRenderer.blank(format)
    }
}

#[tokio::test]
async fn blocked_render_leaves_runtime_free() {
    let (release, gate) = mpsc::channel();
    let renderer = Arc::new(GatedRenderer {
        armed: AtomicBool::new(false),
        gate: Mutex::new(gate),
        timed_out: AtomicBool::new(false),
    });
    let deck = MockHandle::new("/dev/hidraw0", DeckKind::Mk2);
    let ctx = SessionContext {
        store: Arc::new(ConfigStore::with_grid("apps.json", grid(APPS))),
        renderer: renderer.clone(),
        runner: Arc::new(RecordingRunner::default()),
        brightness: 50,
        wrap: true,
    };
    let running = spawn(MockDiscovery::new(&[&deck]), ctx);
    wait_until("startup", || deck.started()).await;

    deck.clear();
    renderer.armed.store(true, Ordering::SeqCst);
    deck.press(CUSTOM);

    // Single-threaded runtime: this only runs if the render is off its thread
    tokio::time::sleep(Duration::from_millis(20)).await;
    release.send(()).unwrap();

    wait_until("key refresh", || !deck.ops().is_empty()).await;
    assert!(!renderer.timed_out.load(Ordering::SeqCst));
    assert_eq!(deck.ops(), vec![image(CUSTOM, "custom:")]);

    running.stop().await.unwrap();
}
