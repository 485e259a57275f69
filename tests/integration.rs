use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const BUGREPORT: &str = "== dumpstate: 2024-03-09 14:05:07\n\n\
------ SYSTEM LOG (logcat -v threadtime) ------\n\
03-09 14:01:12.345  1000  1234 E ActivityManager: ANR in com.android.systemui\n\
03-09 14:01:12.346  1000  1234 E ActivityManager: Reason: Input dispatching timed out\n\n\
------ BATTERY STATS (dumpsys batterystats) ------\n\
Estimated battery capacity: 4500 mAh\n\
Wakelock held by com.example.sync for 3h 12m\n";

fn brh_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("brh");
    path
}

/// Embeds "ANR" texts along one axis and everything else along another.
struct TopicEmbedder;

impl Respond for TopicEmbedder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let text = body["input"][0].as_str().unwrap_or_default();
        let vector = if text.contains("ANR") {
            vec![1.0, 0.1]
        } else {
            vec![0.1, 1.0]
        };
        ResponseTemplate::new(200)
            .set_body_json(json!({"data": [{"index": 0, "embedding": vector}]}))
    }
}

async fn mock_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(TopicEmbedder)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "systemui stopped handling input [1]."}}]
        })))
        .mount(&server)
        .await;
    server
}

fn setup_test_env(server_uri: &str, completion: bool) -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let report = root.join("bugreport-pixel.txt");
    fs::write(&report, BUGREPORT).unwrap();

    let completion_section = if completion {
        format!(
            "[completion]\nprovider = \"openai\"\nmodel = \"test-chat\"\nurl = \"{}\"\nmax_retries = 0\n",
            server_uri
        )
    } else {
        String::new()
    };

    let config_content = format!(
        r#"[index]
dir = "{root}/data/indexes"
chunk_size = 120
chunk_overlap = 20

[retrieval]
top_k = 2

[embedding]
provider = "openai"
model = "test-embed"
url = "{uri}"
max_retries = 0

[log]
session_log = "{root}/data/session.jsonl"

{completion}"#,
        root = root.display(),
        uri = server_uri,
        completion = completion_section,
    );

    let config_path = config_dir.join("brh.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path, report)
}

fn run_brh(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = brh_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("OPENAI_API_KEY", "sk-test")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run brh binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Run the binary off the async runtime so the mock server keeps serving.
async fn brh(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let config_path = config_path.to_path_buf();
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_brh(&config_path, &args)
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_index_then_list_then_reuse() {
    let server = mock_server().await;
    let (_tmp, config_path, report) = setup_test_env(&server.uri(), false);
    let report = report.to_str().unwrap();

    let (stdout, stderr, success) = brh(&config_path, &["index", report, "--progress", "off"]).await;
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("index bugreport-pixel.txt"));
    assert!(stdout.contains("failed: 0"));
    assert!(stdout.contains("saved: "));
    assert!(stdout.contains("ok"));

    let (stdout, _, success) = brh(&config_path, &["indexes"]).await;
    assert!(success);
    assert!(stdout.contains("bugreport-pixel-"));
    assert!(stdout.contains("-index.json"));
    assert!(stdout.contains("source: bugreport-pixel.txt"));
    assert!(stdout.contains("model: test-embed"));

    let (stdout, stderr, success) = brh(&config_path, &["index", report]).await;
    assert!(success, "re-index failed: {}", stderr);
    assert!(stdout.contains("up to date"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_dry_run_prints_grounded_prompt() {
    let server = mock_server().await;
    let (_tmp, config_path, report) = setup_test_env(&server.uri(), false);

    let (_, stderr, success) = brh(&config_path, &["index", report.to_str().unwrap()]).await;
    assert!(success, "index failed: {}", stderr);

    let (stdout, stderr, success) =
        brh(&config_path, &["ask", "Why did systemui ANR?", "--dry-run"]).await;
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Instructions:"));
    assert!(stdout.contains("[1] source: bugreport-pixel.txt"));
    assert!(stdout.contains("[2] source: bugreport-pixel.txt"));
    assert!(!stdout.contains("[3] source:"));
    assert!(stdout.contains("Question:\nWhy did systemui ANR?"));
    // The highest-ranked source is the ANR window.
    let first = stdout.split("[1] source:").nth(1).unwrap();
    let first = first.split("[2] source:").next().unwrap();
    assert!(first.contains("ANR in com.android.systemui"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_json_dry_run() {
    let server = mock_server().await;
    let (_tmp, config_path, report) = setup_test_env(&server.uri(), false);
    brh(&config_path, &["index", report.to_str().unwrap()]).await;

    let (stdout, stderr, success) = brh(
        &config_path,
        &["ask", "battery wakelock", "--dry-run", "--json", "--top-k", "1"],
    )
    .await;
    assert!(success, "ask failed: {}", stderr);
    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["source_id"], "bugreport-pixel.txt");
    assert_eq!(result["sources"].as_array().unwrap().len(), 1);
    assert!(result.get("answer").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_answers_with_sources_and_logs_session() {
    let server = mock_server().await;
    let (tmp, config_path, report) = setup_test_env(&server.uri(), true);
    brh(&config_path, &["index", report.to_str().unwrap()]).await;

    let (stdout, stderr, success) = brh(&config_path, &["ask", "Why did systemui ANR?"]).await;
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.starts_with("systemui stopped handling input [1]."));
    assert!(stdout.contains("Sources (bugreport-pixel.txt):"));
    assert!(stdout.contains("  [1] offsets "));

    let log = fs::read_to_string(tmp.path().join("data").join("session.jsonl")).unwrap();
    let events: Vec<String> = log
        .lines()
        .map(|l| serde_json::from_str::<Value>(l).unwrap()["event"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(events, vec!["index_built", "question", "answer"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_without_index_fails() {
    let server = mock_server().await;
    let (_tmp, config_path, _) = setup_test_env(&server.uri(), false);

    let (_, stderr, success) = brh(&config_path, &["ask", "anything", "--dry-run"]).await;
    assert!(!success);
    assert!(stderr.contains("no index found, run `brh index` first"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_index_dry_run_embeds_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let (tmp, config_path, report) = setup_test_env(&server.uri(), false);

    let (stdout, stderr, success) =
        brh(&config_path, &["index", report.to_str().unwrap(), "--dry-run"]).await;
    assert!(success, "dry-run failed: {}", stderr);
    assert!(stdout.contains("(dry-run)"));
    assert!(stdout.contains("estimated chunks:"));
    assert!(!tmp.path().join("data").join("indexes").exists());
}

#[test]
fn test_summarize_requires_completion_provider() {
    let (_tmp, config_path, report) = setup_test_env("http://127.0.0.1:9", false);
    let (_, stderr, success) = run_brh(&config_path, &["summarize", report.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Completion provider is disabled"));
}

#[test]
fn test_completions_do_not_need_config() {
    let (stdout, stderr, success) =
        run_brh(Path::new("/nonexistent/brh.toml"), &["completions", "bash"]);
    assert!(success, "completions failed: {}", stderr);
    assert!(stdout.contains("brh"));
}

#[test]
fn test_invalid_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("brh.toml");
    fs::write(&config_path, "[retrieval]\ntop_k = 0\n").unwrap();
    let (_, stderr, success) = run_brh(&config_path, &["indexes"]);
    assert!(!success);
    assert!(stderr.contains("retrieval.top_k must be > 0"));
}
