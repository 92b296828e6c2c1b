use std::{
    fs,
    path::{Path, PathBuf},
};

use assert_cmd::Command;
use predicates::str::{contains, is_match};
use serde_json::Value;
use tempfile::TempDir;

const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

struct TestEnv {
    _tmp: TempDir,
    root: PathBuf,
    config: PathBuf,
}

impl TestEnv {
    /// Isolated directories plus a config file; `key` goes into the file when given.
    fn new(key: Option<&str>) -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().to_path_buf();
        fs::create_dir_all(root.join("raw")).expect("raw dir");

        let mut body = format!(
            "source_dir = {:?}\nencrypted_dir = {:?}\nscratch_dir = {:?}\n",
            root.join("raw"),
            root.join("encrypted"),
            root.join("scratch"),
        );
        if let Some(key) = key {
            body.push_str(&format!("encryption_key = \"{key}\"\n"));
        }
        let config = root.join("config.toml");
        fs::write(&config, body).expect("write config");

        Self {
            _tmp: tmp,
            root,
            config,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("salesvault").expect("binary built");
        cmd.arg("--config")
            .arg(&self.config)
            .env("HOME", &self.root)
            .env_remove("SALESVAULT_ENCRYPTION_KEY")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Write an export the way the sales system does: ten preamble lines, then `;` data.
    fn export(&self, name: &str, rows: &[&str]) {
        let mut text: String = (0..10).map(|i| format!("preamble {i}\n")).collect();
        text.push_str("IDProducto;Ventas\n");
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        fs::write(self.root.join("raw").join(name), text).expect("write export");
    }

    fn scratch_is_empty(&self) -> bool {
        scratch_empty(&self.root.join("scratch"))
    }
}

fn scratch_empty(dir: &Path) -> bool {
    fs::read_dir(dir).map_or(true, |mut entries| entries.next().is_none())
}

#[test]
fn keygen_prints_a_hex_key() {
    let env = TestEnv::new(None);
    env.cmd()
        .arg("keygen")
        .assert()
        .success()
        .stdout(is_match("^[0-9a-f]{64}\n$").expect("valid regex"));
}

#[test]
fn version_prints_binary_name() {
    let env = TestEnv::new(None);
    env.cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(contains("salesvault"));
}

#[test]
fn encrypt_then_load_reports_missing_period() {
    let env = TestEnv::new(Some(KEY));
    env.export("enero.csv", &["1;10", "2;20"]);
    env.export("marzo.csv", &["3;30"]);

    env.cmd()
        .arg("encrypt")
        .assert()
        .success()
        .stdout(contains("Encrypted 2 file(s)"));
    assert!(env.root.join("encrypted").join("enero.enc").is_file());

    let out = env
        .cmd()
        .args([
            "load", "--period", "enero", "--period", "febrero", "--period", "marzo", "--json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&out).expect("valid json output");

    assert_eq!(json["records"], 3);
    assert_eq!(json["succeeded"], serde_json::json!(["enero", "marzo"]));
    assert_eq!(json["failed"][0]["identifier"], "febrero");
    assert_eq!(json["reports"][0]["valid_records"], 2);
    assert!(json["columns"]
        .as_array()
        .is_some_and(|cols| cols.iter().any(|c| c == "period_index")));
    assert!(env.scratch_is_empty());
}

#[test]
fn parallel_load_matches_text_output() {
    let env = TestEnv::new(Some(KEY));
    env.export("enero.csv", &["1;10"]);
    env.export("febrero.csv", &["2;20"]);
    env.cmd().arg("encrypt").assert().success();

    env.cmd()
        .args(["load", "--period", "enero", "--period", "febrero", "--parallel"])
        .assert()
        .success()
        .stdout(contains("Loaded 2 record(s) from 2 of 2 period(s)"));
}

#[test]
fn load_without_periods_uses_configured_list() {
    let env = TestEnv::new(Some(KEY));
    let mut body = fs::read_to_string(&env.config).expect("read config");
    body.push_str("\n[dataset]\nperiods = [\"enero\", \"febrero\"]\n");
    fs::write(&env.config, body).expect("rewrite config");
    env.export("enero.csv", &["1;10"]);
    env.cmd().arg("encrypt").assert().success();

    env.cmd()
        .arg("load")
        .assert()
        .success()
        .stdout(contains("Loaded 1 record(s) from 1 of 2 period(s)"))
        .stdout(contains("failed febrero"));
}

#[test]
fn load_with_nothing_encrypted_fails() {
    let env = TestEnv::new(Some(KEY));
    env.cmd()
        .args(["load", "--period", "enero"])
        .assert()
        .failure()
        .stderr(contains("no data loaded"));
}

#[test]
fn key_can_come_from_environment() {
    let env = TestEnv::new(None);
    env.cmd()
        .env("SALESVAULT_ENCRYPTION_KEY", KEY)
        .arg("health")
        .assert()
        .success()
        .stdout(contains("Cipher: ok"));
}

#[test]
fn missing_key_is_fatal() {
    let env = TestEnv::new(None);
    env.cmd()
        .arg("encrypt")
        .assert()
        .failure()
        .stderr(contains("SALESVAULT_ENCRYPTION_KEY"));
}

#[test]
fn invalid_key_is_fatal() {
    let env = TestEnv::new(Some("abc123"));
    env.cmd()
        .arg("health")
        .assert()
        .failure()
        .stderr(contains("64 hex characters"));
}

#[test]
fn summary_is_optional() {
    let env = TestEnv::new(Some(KEY));
    env.cmd()
        .arg("summary")
        .assert()
        .success()
        .stdout(contains("No anual source found"));

    env.export("anual.csv", &["1;120"]);
    env.cmd().arg("encrypt").assert().success();
    env.cmd()
        .arg("summary")
        .assert()
        .success()
        .stdout(contains("anual: 1 record(s), 2 column(s)"));
}

#[test]
fn config_init_never_clobbers() {
    let env = TestEnv::new(Some(KEY));
    let before = fs::read_to_string(&env.config).expect("read config");
    env.cmd()
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(contains("Config initialized"));
    assert_eq!(fs::read_to_string(&env.config).expect("reread"), before);

    let fresh = env.root.join("fresh").join("config.toml");
    Command::cargo_bin("salesvault")
        .expect("binary built")
        .args(["config", "init", "--config"])
        .arg(&fresh)
        .env("HOME", &env.root)
        .assert()
        .success();
    let written = fs::read_to_string(&fresh).expect("config written");
    assert!(written.contains("[dataset]"));
    assert!(!written.contains("encryption_key"));
}
