use pretty_assertions::assert_eq;
use signage_editor::decoration::{find_artifacts, SELECTION_COLOR};
use signage_editor::frame::FrameChannel;
use signage_editor::panel::PropertyPanel;
use signage_editor::protocol::{decode, encode};
use signage_editor::{
    inject_runtime, spawn_frame, EditState, EditorConfig, EditorError, EditorRuntime, ElementId,
    ElementType, FrameHandle, HostController, HostMessage, PanelContext, RuntimeMessage,
    SelectedElement, SessionStore,
};
use signage_markup::{parse_html, select_first};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const HEADLINE: &str = r#"<body><h1 data-editable="true">Title</h1></body>"#;

fn get_fixture_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(filename);
    path
}

fn load_fixture(filename: &str) -> String {
    fs::read_to_string(get_fixture_path(filename)).unwrap()
}

async fn next_message(channel: &mut FrameChannel) -> RuntimeMessage {
    loop {
        let payload = channel.inbound.recv().await.expect("runtime channel closed");
        if let Some(message) = decode::<RuntimeMessage>(&payload) {
            return message;
        }
    }
}

/// Everything the runtime has posted so far.
fn drain(channel: &mut FrameChannel) -> Vec<RuntimeMessage> {
    let mut out = Vec::new();
    while let Ok(payload) = channel.inbound.try_recv() {
        out.extend(decode::<RuntimeMessage>(&payload));
    }
    out
}

fn send(channel: &FrameChannel, message: &HostMessage) {
    channel.outbound.send(encode(message).unwrap()).unwrap();
}

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

async fn mounted(template: &str) -> (Arc<HostController>, FrameHandle) {
    let controller = Arc::new(HostController::new(EditorConfig::default()));
    let frame = controller.mount(template);
    controller.wait_ready().await.unwrap();
    (controller, frame)
}

async fn select(controller: &HostController, frame: &FrameHandle, selector: &str) -> SelectedElement {
    frame.click(selector).await.unwrap();
    let tag = selector.split(['.', '#']).next().unwrap_or_default().to_string();
    assert!(eventually(|| controller.selected().is_some_and(|s| tag.is_empty() || s.tag_name == tag)).await);
    controller.selected().unwrap()
}

fn request_id(payload: &str) -> u64 {
    match decode::<HostMessage>(payload) {
        Some(HostMessage::Serialize { request_id }) => request_id,
        other => panic!("expected a serialize request, got {:?}", other),
    }
}

// End to end

#[tokio::test]
async fn test_select_then_update_color() {
    let html = inject_runtime(HEADLINE, "/editor/runtime.js");
    let (frame, mut channel, _task) = spawn_frame(&html, &EditorConfig::default(), None);
    assert_eq!(next_message(&mut channel).await, RuntimeMessage::EditorReady);

    frame.click("h1").await.unwrap();
    let RuntimeMessage::ElementSelected(selected) = next_message(&mut channel).await else {
        panic!("expected element-selected");
    };
    assert_eq!(selected.element_type, ElementType::Text);
    assert_eq!(selected.text_content, "Title");
    assert_eq!(selected.tag_name, "h1");

    send(
        &channel,
        &HostMessage::UpdateProperty {
            element_id: selected.element_id.clone(),
            property: "color".into(),
            value: "#ff0000".into(),
        },
    );
    match next_message(&mut channel).await {
        RuntimeMessage::PropertyUpdated { element_id, styles } => {
            assert_eq!(element_id, selected.element_id);
            assert_eq!(styles["color"], "rgb(255, 0, 0)");
        }
        other => panic!("expected property-updated, got {:?}", other),
    }
}

#[tokio::test]
async fn test_controller_projection_follows_echoes() {
    let (controller, frame) = mounted(HEADLINE).await;
    let selected = select(&controller, &frame, "h1").await;
    assert_eq!(selected.element_type, ElementType::Text);

    controller.send_update(&selected.element_id, "color", "#ff0000");
    assert!(eventually(|| controller.selected().is_some_and(|s| s.styles["color"] == "rgb(255, 0, 0)")).await);

    let html = controller.serialize().await.unwrap();
    assert!(html.contains(r#"<h1 style="color: #ff0000;">Title</h1>"#));
}

// Serialization

#[tokio::test]
async fn test_serialize_is_idempotent_and_clean() {
    let (controller, frame) = mounted(&load_fixture("menu-board.html")).await;

    frame.hover(".hero").await.unwrap();
    let h1 = select(&controller, &frame, "h1").await;
    controller.send_update(&h1.element_id, "fontSize", "48px");
    frame.double_click("p.tagline").await.unwrap();
    frame.type_text("Fresh every day").await.unwrap();

    let first = controller.serialize().await.unwrap();
    let second = controller.serialize().await.unwrap();
    assert_eq!(first, second);

    assert!(find_artifacts(&parse_html(&first)).is_empty());
    for artifact in ["data-editor", "contenteditable", "#3B82F6", "#93C5FD", "#F59E0B", "/editor/runtime.js"] {
        assert!(!first.contains(artifact), "{} leaked", artifact);
    }
    assert!(first.contains("Fresh every day"));
    assert!(first.contains("font-size: 48px"));
    assert!(first.starts_with("<!DOCTYPE html>\n<html lang=\"en\">"));

    // The live document still carries its decorations.
    let snapshot = frame.snapshot().await.unwrap();
    assert!(snapshot.document.find_element(|d, n| d.attr(n, "style").is_some_and(|s| s.contains(SELECTION_COLOR))).is_some());
}

#[tokio::test]
async fn test_reloading_clean_output_is_stable() {
    let config = EditorConfig::default();
    let template = load_fixture("menu-board.html");
    signage_editor::cli::check_template(&template, &config).await.unwrap();
}

// Selection

#[tokio::test]
async fn test_selection_is_exclusive_and_hover_is_silent() {
    let html = inject_runtime(&load_fixture("menu-board.html"), "/editor/runtime.js");
    let (frame, mut channel, _task) = spawn_frame(&html, &EditorConfig::default(), None);
    assert_eq!(next_message(&mut channel).await, RuntimeMessage::EditorReady);

    frame.hover("h1").await.unwrap();
    frame.hover("img").await.unwrap();
    assert!(drain(&mut channel).is_empty());
    let img = frame.locate("img").await.unwrap();
    assert_eq!(frame.snapshot().await.unwrap().state, Some(EditState::Hovering(img)));

    frame.click("h1").await.unwrap();
    frame.click("p.tagline").await.unwrap();
    let kinds: Vec<&str> = drain(&mut channel).iter().map(|m| m.kind()).collect();
    assert_eq!(kinds, vec!["element-selected", "element-selected"]);

    let snapshot = frame.snapshot().await.unwrap();
    let outlined = snapshot
        .document
        .find_elements(|d, n| d.attr(n, "style").is_some_and(|s| s.contains(SELECTION_COLOR)));
    let tagline = select_first(&snapshot.document, "p.tagline").unwrap().unwrap();
    assert_eq!(outlined, vec![tagline]);
    assert_eq!(snapshot.state, Some(EditState::Selected(tagline)));

    // Outside every boundary.
    frame.click("footer p").await.unwrap();
    assert_eq!(drain(&mut channel), vec![RuntimeMessage::ElementDeselected]);
}

#[tokio::test]
async fn test_leaving_an_edit_commits_before_the_next_selection() {
    let template = r#"<body><p id="a" data-editable="true">First</p><p id="b" data-editable="true">Second</p></body>"#;
    let html = inject_runtime(template, "/editor/runtime.js");
    let (frame, mut channel, _task) = spawn_frame(&html, &EditorConfig::default(), None);
    assert_eq!(next_message(&mut channel).await, RuntimeMessage::EditorReady);

    frame.double_click("#a").await.unwrap();
    let RuntimeMessage::ElementSelected(a) = next_message(&mut channel).await else {
        panic!("expected element-selected");
    };
    frame.type_text("First, edited").await.unwrap();
    frame.double_click("#b").await.unwrap();

    let messages = drain(&mut channel);
    assert_eq!(messages.len(), 2);
    assert_eq!(
        messages[0],
        RuntimeMessage::TextChanged {
            element_id: a.element_id.clone(),
            text: "First, edited".into(),
        }
    );
    match &messages[1] {
        RuntimeMessage::ElementSelected(b) => assert_ne!(b.element_id, a.element_id),
        other => panic!("expected element-selected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_selection_callbacks() {
    let controller = HostController::new(EditorConfig::default());
    let ready = Arc::new(AtomicUsize::new(0));
    let counter = ready.clone();
    controller.on_ready(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let (tx, mut rx) = mpsc::unbounded_channel::<Option<String>>();
    controller.on_element_selected(move |sel| {
        let _ = tx.send(sel.map(|s| s.tag_name.clone()));
    });

    let frame = controller.mount(&load_fixture("menu-board.html"));
    controller.wait_ready().await.unwrap();
    assert!(eventually(|| ready.load(Ordering::SeqCst) == 1).await);

    frame.click("img").await.unwrap();
    assert_eq!(rx.recv().await, Some(Some("img".to_string())));
    frame.click("footer p").await.unwrap();
    assert_eq!(rx.recv().await, Some(None));
    assert!(eventually(|| controller.selected().is_none()).await);
}

// Capability

#[test]
fn test_capability_literal_cases() {
    let html = r#"<body>
<img id="photo" data-editable="true" src="x">
<div id="bg" data-editable="true" style="background-image: url(x.png)"></div>
<p id="para" data-editable="true">hello</p>
<div id="wrap" data-editable="true"><span>x</span></div>
</body>"#;
    let runtime = EditorRuntime::new(parse_html(html), &EditorConfig::default(), Vec::new());
    let kind = |selector: &str| {
        let node = select_first(runtime.document(), selector).unwrap().unwrap();
        runtime.element_type(node)
    };
    assert_eq!(kind("#photo"), ElementType::Image);
    assert_eq!(kind("#bg"), ElementType::Image);
    assert_eq!(kind("#para"), ElementType::Text);
    assert_eq!(kind("#wrap"), ElementType::Container);
}

#[test]
fn test_fixture_capabilities() {
    let found = signage_editor::cli::inspect_template(&load_fixture("menu-board.html"), &EditorConfig::default());
    let summary: Vec<(&str, ElementType)> = found.iter().map(|b| (b.tag_name.as_str(), b.element_type)).collect();
    assert_eq!(
        summary,
        vec![
            ("section", ElementType::Container),
            ("h1", ElementType::Text),
            ("p", ElementType::Text),
            ("div", ElementType::Image),
            ("img", ElementType::Image),
        ]
    );
}

// Serialize failure modes

#[tokio::test(start_paused = true)]
async fn test_serialize_timeout_then_recovery() {
    let controller = HostController::new(EditorConfig::default());
    let (host_tx, mut host_rx) = mpsc::unbounded_channel::<String>();
    let (runtime_tx, runtime_rx) = mpsc::unbounded_channel::<String>();
    controller.attach(host_tx, runtime_rx);

    let started = tokio::time::Instant::now();
    assert_eq!(
        controller.serialize().await,
        Err(EditorError::SerializeTimeout { timeout_ms: 5000 })
    );
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(5000) && waited < Duration::from_millis(5100));
    let abandoned = request_id(&host_rx.recv().await.unwrap());

    let responder = tokio::spawn(async move {
        let current = request_id(&host_rx.recv().await.unwrap());
        assert!(current > abandoned);
        // A late answer to the abandoned request must not satisfy the new one.
        for (request_id, html) in [(abandoned, "stale"), (current, "<!DOCTYPE html>\nfresh")] {
            let reply = RuntimeMessage::Serialized {
                request_id,
                html: html.to_string(),
            };
            runtime_tx.send(encode(&reply).unwrap()).unwrap();
        }
        (host_rx, runtime_tx)
    });
    assert_eq!(controller.serialize().await.unwrap(), "<!DOCTYPE html>\nfresh");
    let _channels = responder.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_serialize_frees_the_slot() {
    let controller = HostController::new(EditorConfig::default());
    let (host_tx, mut host_rx) = mpsc::unbounded_channel::<String>();
    let (runtime_tx, runtime_rx) = mpsc::unbounded_channel::<String>();
    controller.attach(host_tx, runtime_rx);

    // The caller gives up long before the controller's own timeout.
    assert!(tokio::time::timeout(Duration::from_millis(100), controller.serialize())
        .await
        .is_err());
    let abandoned = request_id(&host_rx.recv().await.unwrap());
    tokio::time::sleep(Duration::from_secs(60)).await;

    let responder = tokio::spawn(async move {
        let current = request_id(&host_rx.recv().await.unwrap());
        assert!(current > abandoned);
        let reply = RuntimeMessage::Serialized {
            request_id: current,
            html: "<!DOCTYPE html>\nagain".to_string(),
        };
        runtime_tx.send(encode(&reply).unwrap()).unwrap();
        (host_rx, runtime_tx)
    });
    assert_eq!(controller.serialize().await.unwrap(), "<!DOCTYPE html>\nagain");
    let _channels = responder.await.unwrap();
}

#[tokio::test]
async fn test_one_serialize_in_flight_and_empty_result() {
    let controller = Arc::new(HostController::new(EditorConfig::default()));
    let (host_tx, mut host_rx) = mpsc::unbounded_channel::<String>();
    let (runtime_tx, runtime_rx) = mpsc::unbounded_channel::<String>();
    controller.attach(host_tx, runtime_rx);

    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.serialize().await }
    });
    let id = request_id(&host_rx.recv().await.unwrap());
    assert_eq!(controller.serialize().await, Err(EditorError::SerializeInFlight));

    let reply = RuntimeMessage::Serialized {
        request_id: id,
        html: String::new(),
    };
    runtime_tx.send(encode(&reply).unwrap()).unwrap();
    assert_eq!(first.await.unwrap(), Err(EditorError::EmptySerialization));

    // The slot is free again.
    let again = tokio::spawn({
        let controller = controller.clone();
        async move { controller.serialize().await }
    });
    let id = request_id(&host_rx.recv().await.unwrap());
    let reply = RuntimeMessage::Serialized {
        request_id: id,
        html: "<html></html>".into(),
    };
    runtime_tx.send(encode(&reply).unwrap()).unwrap();
    assert_eq!(again.await.unwrap(), Ok("<html></html>".to_string()));
}

#[tokio::test]
async fn test_closed_frame_rejects_serialize() {
    let (controller, frame) = mounted(HEADLINE).await;
    controller.close();
    assert!(!controller.is_ready());
    assert_eq!(controller.serialize().await, Err(EditorError::FrameUnavailable));
    assert!(eventually(|| frame.is_closed()).await);
    // Updates without a frame are dropped quietly.
    controller.send_update(&ElementId::from("e-0"), "color", "red");
}

// Runtime-side tolerance

#[tokio::test]
async fn test_unknown_id_gets_no_echo() {
    let html = inject_runtime(HEADLINE, "/editor/runtime.js");
    let (_frame, mut channel, _task) = spawn_frame(&html, &EditorConfig::default(), None);
    assert_eq!(next_message(&mut channel).await, RuntimeMessage::EditorReady);

    send(
        &channel,
        &HostMessage::UpdateProperty {
            element_id: ElementId::from("e-999"),
            property: "color".into(),
            value: "red".into(),
        },
    );
    channel.outbound.send("not json".to_string()).unwrap();
    channel.outbound.send(r#"{"v":99,"message":{"type":"serialize","requestId":1}}"#.to_string()).unwrap();
    send(&channel, &HostMessage::Serialize { request_id: 7 });

    match next_message(&mut channel).await {
        RuntimeMessage::Serialized { request_id, html } => {
            assert_eq!(request_id, 7);
            assert!(html.contains("<h1>Title</h1>"));
        }
        other => panic!("expected serialized, got {:?}", other),
    }
}

// Panels and sessions

#[tokio::test]
async fn test_panel_edits_reach_the_frame() {
    let (controller, frame) = mounted(&load_fixture("menu-board.html")).await;
    let selected = select(&controller, &frame, "h1").await;

    let ctx = PanelContext::new(controller.clone(), controller.config());
    let PropertyPanel::Text(mut editor) = PropertyPanel::for_selection(Some(&selected), &ctx) else {
        panic!("expected the text editor");
    };
    assert_eq!(editor.font_size(), 64);
    let command = editor.set_color("#00ff00").unwrap();
    assert_eq!(command.old_value, "#222222");

    assert!(eventually(|| controller.selected().is_some_and(|s| s.styles["color"] == "rgb(0, 255, 0)")).await);
    assert_eq!(ctx.commands(), vec![command]);
}

#[tokio::test]
async fn test_sessions_do_not_share_identities() {
    let store = SessionStore::new(EditorConfig::default());
    let a = store.open(HEADLINE);
    let b = store.open(HEADLINE);
    assert_ne!(a.id, b.id);
    a.controller.wait_ready().await.unwrap();
    b.controller.wait_ready().await.unwrap();

    let in_a = select(&a.controller, &a.frame, "h1").await;
    let in_b = select(&b.controller, &b.frame, "h1").await;
    // Each runtime numbers its own elements.
    assert_eq!(in_a.element_id, in_b.element_id);

    assert!(store.close(&a.id));
    assert!(!store.close(&a.id));
    assert_eq!(store.len(), 1);
    assert!(store.get(&b.id).is_some());
}
