//! Drives a full engine over in-memory pipes, the way an editor host would.

use glimpse_core::EngineConfig;
use glimpse_protocol::{Engine, SchemaRegistry};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};

const TIMEOUT: Duration = Duration::from_secs(10);

struct Host {
    engine: Engine,
    input: Option<DuplexStream>,
    output: Lines<BufReader<DuplexStream>>,
    schemas: SchemaRegistry,
    _root: TempDir,
}

impl Host {
    /// Engine rooted in a temp dir holding `files`, already started.
    fn start(files: &[(&str, &str)]) -> Self {
        let host = Self::idle(files);
        host.engine.start().unwrap();
        host
    }

    /// Engine rooted in a temp dir holding `files`, not yet started.
    fn idle(files: &[(&str, &str)]) -> Self {
        let root = tempdir().unwrap();
        for (path, content) in files {
            let full = root.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }

        let (input, engine_in) = tokio::io::duplex(64 * 1024);
        let (engine_out, output) = tokio::io::duplex(64 * 1024);
        let config = EngineConfig::default().with_root(root.path());
        let engine = Engine::new(&config, engine_in, engine_out).unwrap();

        Self {
            engine,
            input: Some(input),
            output: BufReader::new(output).lines(),
            schemas: SchemaRegistry::v1(),
            _root: root,
        }
    }

    async fn write(&mut self, bytes: &[u8]) {
        self.input.as_mut().unwrap().write_all(bytes).await.unwrap();
    }

    async fn send(&mut self, frame: Value) {
        let mut line = frame.to_string();
        line.push('\n');
        self.write(line.as_bytes()).await;
    }

    /// Next frame from the engine; every frame must satisfy the schema.
    async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(TIMEOUT, self.output.next_line())
            .await
            .expect("engine went quiet")
            .unwrap()
            .expect("engine output closed");
        let frame: Value = serde_json::from_str(&line).unwrap();
        self.schemas
            .validate(&frame)
            .unwrap_or_else(|err| panic!("engine sent an invalid frame {line}: {err}"));
        frame
    }

    async fn recv_type(&mut self, message_type: &str) -> Value {
        let frame = self.recv().await;
        assert_eq!(frame["messageType"], message_type, "unexpected frame {frame}");
        frame
    }

    async fn handshake(&mut self, capabilities: &[&str]) -> Vec<Value> {
        self.recv_type("init").await;
        self.send(start(capabilities)).await;
        self.recv_type("acknowledge").await;
        let mut progress = Vec::new();
        loop {
            let frame = self.recv().await;
            assert_eq!(frame["messageType"], "init_progress");
            let done = frame["progress"] == 100.0;
            progress.push(frame);
            if done {
                return progress;
            }
        }
    }

    /// Frames of one preview cycle: acknowledge, progress, then the outcome.
    async fn preview_cycle(&mut self, path: &str) -> Value {
        assert_eq!(self.recv_type("preview_acknowledge").await["path"], path);
        let progress = self.recv_type("preview_progress").await;
        assert_eq!(progress["progress"], 0.0);
        let outcome = self.recv().await;
        assert_eq!(outcome["path"], path);
        outcome
    }
}

fn start(capabilities: &[&str]) -> Value {
    json!({"protocolVersion": "1.0", "messageType": "start", "capabilities": capabilities})
}

fn request(path: &str, live: bool) -> Value {
    json!({"protocolVersion": "1.0", "messageType": "request_preview", "path": path, "liveUpdate": live})
}

const BASIC: &[&str] = &[
    "version/1.0",
    "render/markdown",
    "render/markdown/table",
    "render/markdown/heading-anchor",
];

#[tokio::test]
async fn handshake_negotiates_and_renders() {
    let mut host = Host::start(&[("docs/guide.md", "# Guide\n\n| a | b |\n|---|---|\n| 1 | 2 |\n")]);

    let init = host.recv_type("init").await;
    let advertised: Vec<&str> = init["capabilities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap())
        .collect();
    assert_eq!(advertised[0], "version/1.0");
    assert!(advertised.contains(&"render/markdown/highlight"));
    assert_eq!(advertised.len(), 22);

    host.send(start(&[
        "render/markdown/heading-anchor",
        "version/1.0",
        "render/markdown/table",
        "render/markdown",
        "render/unknown",
    ]))
    .await;
    let ack = host.recv_type("acknowledge").await;
    assert_eq!(
        ack["capabilities"],
        json!([
            "version/1.0",
            "render/markdown/table",
            "render/markdown/heading-anchor",
            "render/markdown"
        ])
    );

    let mut steps = Vec::new();
    for _ in 0..4 {
        let frame = host.recv_type("init_progress").await;
        assert_eq!(frame["rendererName"], "markdown");
        steps.push((
            frame["progress"].as_f64().unwrap(),
            frame["message"].as_str().unwrap().to_string(),
        ));
    }
    assert_eq!(
        steps,
        vec![
            (0.0, "Initializing table".to_string()),
            (50.0, "Initialized table".to_string()),
            (50.0, "Initializing heading-anchor".to_string()),
            (100.0, "Initialized heading-anchor".to_string()),
        ]
    );

    host.send(request("docs/guide.md", false)).await;
    let complete = host.preview_cycle("docs/guide.md").await;
    assert_eq!(complete["messageType"], "preview_complete");
    let html = complete["html"].as_str().unwrap();
    assert!(html.contains(r##"<h1 id="guide">Guide<a class="heading-anchor" href="#guide""##));
    assert!(html.contains("<table>"));
}

#[tokio::test]
async fn start_without_version_is_rejected() {
    let mut host = Host::start(&[("a.md", "text")]);
    host.recv_type("init").await;

    host.send(start(&["render/markdown"])).await;
    let reject = host.recv_type("reject").await;
    assert!(reject["reason"].as_str().unwrap().contains("version/1.0"));

    host.send(request("a.md", false)).await;
    let fail = host.preview_cycle("a.md").await;
    assert_eq!(fail["messageType"], "preview_fail");
    assert!(fail["reason"].as_str().unwrap().contains("not initialized"));
}

#[tokio::test]
async fn preview_failures_are_reported() {
    let mut host = Host::start(&[("image.png", "png"), ("ok.md", "fine")]);
    host.handshake(BASIC).await;

    host.send(request("missing.md", false)).await;
    let fail = host.preview_cycle("missing.md").await;
    assert_eq!(fail["messageType"], "preview_fail");
    assert!(fail["reason"].as_str().unwrap().contains("missing.md"));

    host.send(request("image.png", false)).await;
    let fail = host.preview_cycle("image.png").await;
    assert_eq!(fail["messageType"], "preview_fail");
    assert!(fail["reason"].as_str().unwrap().contains("'png'"));

    host.send(request("ok.md", false)).await;
    assert_eq!(host.preview_cycle("ok.md").await["html"], "<p>fine</p>\n");
}

#[tokio::test]
async fn invalid_frames_are_logged_and_skipped() {
    let mut host = Host::start(&[("ok.md", "fine")]);
    host.handshake(BASIC).await;

    host.write(b"{not json}\n").await;
    let log = host.recv_type("log").await;
    assert_eq!(log["level"], "error");

    host.send(json!({"protocolVersion": "1.0", "messageType": "request_preview"}))
        .await;
    let log = host.recv_type("log").await;
    let message = log["message"].as_str().unwrap();
    assert!(message.contains("$.path"));
    assert!(message.contains("$.liveUpdate"));

    host.send(json!({"protocolVersion": "9.9", "messageType": "start", "capabilities": []}))
        .await;
    assert!(host.recv_type("log").await["message"]
        .as_str()
        .unwrap()
        .contains("9.9"));

    host.send(request("ok.md", false)).await;
    assert_eq!(host.preview_cycle("ok.md").await["messageType"], "preview_complete");
}

#[tokio::test]
async fn frames_survive_arbitrary_chunking() {
    let mut host = Host::start(&[("a.md", "alpha"), ("b.md", "beta")]);
    host.recv_type("init").await;

    let start_frame = format!("{}\n", start(BASIC));
    let (head, tail) = start_frame.split_at(17);
    host.write(head.as_bytes()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    host.write(tail.as_bytes()).await;
    host.recv_type("acknowledge").await;
    for _ in 0..4 {
        host.recv_type("init_progress").await;
    }

    // Two requests and a blank line in one write.
    let batch = format!("{}\n\n{}\n", request("a.md", false), request("b.md", false));
    host.write(batch.as_bytes()).await;
    assert_eq!(host.preview_cycle("a.md").await["html"], "<p>alpha</p>\n");
    assert_eq!(host.preview_cycle("b.md").await["html"], "<p>beta</p>\n");
}

#[tokio::test]
async fn overlay_updates_drive_live_previews() {
    let mut host = Host::start(&[("notes/disk.md", "from disk")]);
    host.handshake(BASIC).await;

    host.send(request("notes/new.md", true)).await;
    assert_eq!(host.preview_cycle("notes/new.md").await["messageType"], "preview_fail");

    host.send(json!({
        "protocolVersion": "1.0",
        "messageType": "update_filesystem",
        "updates": [{
            "action": "create",
            "path": "notes/new.md",
            "content": {"type": "base64", "base64": "IyBOZXcK", "originalEncoding": "utf-8"}
        }]
    }))
    .await;
    let complete = host.recv_type("preview_complete").await;
    assert_eq!(complete["path"], "notes/new.md");
    assert!(complete["html"].as_str().unwrap().contains(r#"id="new""#));

    // The overlay shadows the disk until the overlay copy is deleted.
    host.send(json!({
        "protocolVersion": "1.0",
        "messageType": "update_filesystem",
        "updates": [{
            "action": "update",
            "path": "notes/disk.md",
            "content": {"type": "base64", "base64": "Y2Fm6SBhdSBsYWl0Cg==", "originalEncoding": "latin1"}
        }]
    }))
    .await;
    host.send(request("notes/disk.md", false)).await;
    assert_eq!(
        host.preview_cycle("notes/disk.md").await["html"],
        "<p>café au lait</p>\n"
    );

    host.send(json!({
        "protocolVersion": "1.0",
        "messageType": "update_filesystem",
        "updates": [
            {"action": "delete", "path": "notes/disk.md"},
            {"action": "rename", "path": "notes/new.md", "newPath": "notes/moved.md"}
        ]
    }))
    .await;
    let fail = host.recv_type("preview_fail").await;
    assert_eq!(fail["path"], "notes/new.md");

    host.send(request("notes/disk.md", false)).await;
    assert_eq!(
        host.preview_cycle("notes/disk.md").await["html"],
        "<p>from disk</p>\n"
    );
    host.send(request("notes/moved.md", false)).await;
    assert_eq!(
        host.preview_cycle("notes/moved.md").await["messageType"],
        "preview_complete"
    );
}

#[tokio::test]
async fn bad_updates_are_reported() {
    let mut host = Host::start(&[]);
    host.handshake(BASIC).await;

    host.send(json!({
        "protocolVersion": "1.0",
        "messageType": "update_filesystem",
        "updates": [
            {"action": "rename", "path": "ghost.md", "newPath": "x.md"},
            {"action": "create", "path": "bad.md",
             "content": {"type": "base64", "base64": "bm90IHZhbGlkIHV0Zjgg/wo=", "originalEncoding": "utf-8"}},
            {"action": "create", "path": "good.md",
             "content": {"type": "base64", "base64": "IyBOZXcK", "originalEncoding": "utf-8"}}
        ]
    }))
    .await;
    let log = host.recv_type("log").await;
    let message = log["message"].as_str().unwrap();
    assert!(message.contains("2 update(s) failed"));
    assert!(message.contains("ghost.md"));
    assert!(message.contains("bad.md"));

    host.send(request("good.md", false)).await;
    assert_eq!(host.preview_cycle("good.md").await["messageType"], "preview_complete");
}

#[tokio::test]
async fn handling_stays_in_order_after_failures() {
    let mut host = Host::start(&[("one.md", "1"), ("two.md", "2")]);
    host.handshake(BASIC).await;

    let batch = format!(
        "{}\n{}\n{}\n{}\n",
        request("one.md", false),
        request("nope.md", false),
        json!({"protocolVersion": "1.0", "messageType": "shutdown"}),
        request("two.md", false),
    );
    host.write(batch.as_bytes()).await;

    let mut previews = Vec::new();
    let mut logs = 0;
    while previews.len() < 9 || logs == 0 {
        let frame = host.recv().await;
        match frame["messageType"].as_str().unwrap() {
            "log" => logs += 1,
            other => previews.push(format!("{other} {}", frame["path"].as_str().unwrap())),
        }
    }
    assert_eq!(logs, 1);
    assert_eq!(
        previews,
        vec![
            "preview_acknowledge one.md",
            "preview_progress one.md",
            "preview_complete one.md",
            "preview_acknowledge nope.md",
            "preview_progress nope.md",
            "preview_fail nope.md",
            "preview_acknowledge two.md",
            "preview_progress two.md",
            "preview_complete two.md",
        ]
    );
}

#[tokio::test]
async fn shutdown_stops_with_host_code() {
    let mut host = Host::start(&[]);
    host.recv_type("init").await;

    host.send(json!({"protocolVersion": "1.0", "messageType": "shutdown", "reason": "editor closed", "code": 7}))
        .await;
    let echo = host.recv_type("shutdown").await;
    assert_eq!(echo["reason"], "editor closed");
    assert_eq!(echo["code"], 7);

    let code = tokio::time::timeout(TIMEOUT, host.engine.wait()).await.unwrap();
    assert_eq!(code, 7);
}

#[tokio::test]
async fn closed_input_exits_cleanly() {
    let mut host = Host::start(&[]);
    host.recv_type("init").await;
    host.input.take();

    let code = tokio::time::timeout(TIMEOUT, host.engine.wait()).await.unwrap();
    assert_eq!(code, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn init_precedes_replies_to_waiting_input() {
    for _ in 0..50 {
        let mut host = Host::idle(&[("ready.md", "ready")]);
        host.send(start(BASIC)).await;
        host.send(request("ready.md", false)).await;
        host.engine.start().unwrap();

        let init = host.recv_type("init").await;
        assert_eq!(init["capabilities"][0], "version/1.0");
        host.recv_type("acknowledge").await;
        loop {
            if host.recv_type("init_progress").await["progress"] == 100.0 {
                break;
            }
        }
        let outcome = host.preview_cycle("ready.md").await;
        assert_eq!(outcome["messageType"], "preview_complete");
    }
}
