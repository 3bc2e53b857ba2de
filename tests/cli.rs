use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const TEMPLATE: &str = "https://convert.example/convert?remote_data={}&format=gpx";

fn gpxgrab(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_gpxgrab"));
    cmd.current_dir(dir)
        .args(["--download-dir", dir.join("Downloads").to_str().unwrap()])
        .args(args)
        .env_remove("CONVERT_URL")
        .env_remove("GMAPS_API_KEY")
        .env("RUST_LOG", "warn");
    cmd
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("json report on stdout")
}

#[test]
fn convert_stage_runs_without_network_or_browser() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("client_redirected_urls.csv"),
        "id,url\ntrip1,https://maps.google.com/dir/A/B\ntrip2,https://maps.google.com/a b\n",
    )
    .unwrap();

    let output = gpxgrab(dir.path(), &["--from", "convert", "--to", "convert"])
        .env("CONVERT_URL", TEMPLATE)
        .output()
        .expect("run gpxgrab");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let v = stdout_json(&output);
    assert_eq!(v["stages"].as_array().map(Vec::len), Some(1));
    assert_eq!(v["stages"][0]["stage"], "convert");
    assert_eq!(v["stages"][0]["changed"], 2);

    let written = fs::read_to_string(dir.path().join("gps_vis_urls.csv")).unwrap();
    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("id,url"));
    assert_eq!(
        lines.next(),
        Some(
            "trip1,https://convert.example/convert\
             ?remote_data=https%3A%2F%2Fmaps.google.com%2Fdir%2FA%2FB&format=gpx"
        )
    );
    let second = lines.next().unwrap();
    assert!(second.starts_with("trip2,"));
    assert!(second.contains("https%3A%2F%2Fmaps.google.com%2Fa+b"));
    assert!(!second.contains(' '));
}

#[test]
fn template_can_come_from_dotenv() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".env"), format!("CONVERT_URL=\"{TEMPLATE}\"\n")).unwrap();
    fs::write(
        dir.path().join("client_redirected_urls.csv"),
        "id,url\nx,https://maps.google.com/dir/1/2\n",
    )
    .unwrap();

    let output = gpxgrab(dir.path(), &["--from", "convert", "--to", "convert"])
        .output()
        .expect("run gpxgrab");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let written = fs::read_to_string(dir.path().join("gps_vis_urls.csv")).unwrap();
    assert!(written.contains("remote_data=https%3A%2F%2Fmaps.google.com%2Fdir%2F1%2F2"));
}

#[test]
fn missing_template_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = gpxgrab(dir.path(), &["--from", "convert", "--to", "convert"])
        .output()
        .expect("run gpxgrab");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("CONVERT_URL"));
    assert!(output.stdout.is_empty());
}

#[test]
fn missing_input_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = gpxgrab(dir.path(), &["--from", "convert", "--to", "convert"])
        .env("CONVERT_URL", TEMPLATE)
        .output()
        .expect("run gpxgrab");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("client_redirected_urls.csv"));
}
