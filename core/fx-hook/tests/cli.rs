use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempDir;

fn fx_hook(home: &Path, args: &[&str], stdin: &str, extra_env: &[(&str, &str)]) -> Output {
    let runtime = home.join(".claude-fx");
    let mut command = Command::new(env!("CARGO_BIN_EXE_fx-hook"));
    command
        .args(args)
        .env("HOME", home)
        .env("CLAUDE_FX_DIR", &runtime)
        .env("CLAUDE_FX_ROOT", &runtime)
        .env("CLAUDE_FX_OVERLAY_BIN", home.join("no-such-overlay"))
        .env_remove("CLAUDE_FX_ENABLED")
        .env_remove("CLAUDE_PLUGIN_ROOT")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in extra_env {
        command.env(key, value);
    }

    let mut child = command.spawn().expect("Failed to spawn fx-hook");
    child
        .stdin
        .take()
        .expect("stdin piped")
        .write_all(stdin.as_bytes())
        .expect("Failed to write stdin");
    child.wait_with_output().expect("Failed to wait for fx-hook")
}

#[test]
fn invalid_json_exits_zero_silently() {
    let home = TempDir::new().unwrap();
    let output = fx_hook(home.path(), &[], "{not json", &[]);
    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());
    assert!(output.stderr.is_empty());
}

#[test]
fn unreachable_overlay_still_exits_zero() {
    let home = TempDir::new().unwrap();
    let output = fx_hook(
        home.path(),
        &[],
        r#"{"hook_event_name":"PreToolUse","tool_name":"Bash"}"#,
        &[],
    );
    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());
}

#[test]
fn disabled_hook_is_a_no_op() {
    let home = TempDir::new().unwrap();
    let output = fx_hook(
        home.path(),
        &[],
        r#"{"hook_event_name":"SessionStart"}"#,
        &[("CLAUDE_FX_ENABLED", "0")],
    );
    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());
}

#[test]
fn reload_settings_without_overlay_reports_error() {
    let home = TempDir::new().unwrap();
    let output = fx_hook(home.path(), &["reload-settings"], "", &[]);
    assert_eq!(output.status.code(), Some(1));

    let reply: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be a JSON reply");
    assert_eq!(reply["status"], "error");
    assert!(reply["message"].is_string());
}

#[test]
fn change_character_with_missing_folder_reports_error() {
    let home = TempDir::new().unwrap();
    let missing = home.path().join("no-character");
    let output = fx_hook(
        home.path(),
        &["change-character", missing.to_str().unwrap()],
        "",
        &[],
    );
    assert_eq!(output.status.code(), Some(1));

    let reply: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reply["status"], "error");
}

/// UTC calendar date for a day count since the epoch, as `YYYY-MM-DD`.
fn utc_date(days_since_epoch: i64) -> String {
    let z = days_since_epoch + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    format!("{:04}-{:02}-{:02}", year, month, day)
}

#[test]
fn unopenable_log_file_does_not_fail_the_hook() {
    let home = TempDir::new().unwrap();
    let logs = home.path().join(".claude-fx").join("logs");
    let today = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
        / 86_400;
    // Cover both sides of a midnight rollover during the test.
    for day in [today - 1, today, today + 1] {
        std::fs::create_dir_all(logs.join(format!("hook.log.{}", utc_date(day)))).unwrap();
    }

    let output = fx_hook(
        home.path(),
        &[],
        r#"{"hook_event_name":"PreToolUse"}"#,
        &[],
    );
    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());
}

#[test]
fn utc_date_matches_known_days() {
    assert_eq!(utc_date(0), "1970-01-01");
    assert_eq!(utc_date(11_016), "2000-02-29");
    assert_eq!(utc_date(20_744), "2026-10-18");
}
