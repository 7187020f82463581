use std::io::Write;
use std::sync::Mutex;

use tempfile::Builder;

use promo_booth::config::BoothConfig;
use promo_booth::{AspectRatio, Facing, DEFAULT_TAG_TEXT};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "BOOTH_CONFIG",
        "BOOTH_CAMERA",
        "BOOTH_TAGS",
        "BOOTH_ASPECT",
        "BOOTH_JPEG_QUALITY",
        "BOOTH_SCAN_CODE",
        "BOOTH_OUTBOX",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = BoothConfig::load().expect("load config");
    assert_eq!(cfg.camera_uri, "stub://booth");
    assert_eq!(cfg.initial_facing, Facing::Front);
    assert_eq!(cfg.capture.target_aspect, AspectRatio::new(9, 16).unwrap());
    assert_eq!((cfg.capture.output_width, cfg.capture.output_height), (1080, 1920));
    assert!(!cfg.flow.scan_code);
    assert!(cfg.flow.copy_tags);
    assert_eq!(cfg.campaign.default_tags, DEFAULT_TAG_TEXT);
    assert!(cfg.clipboard_command.is_none());
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".json").tempfile().expect("temp config");
    let json = r##"{
        "camera": { "uri": "stub://stand?size=1920x1080", "facing": "back" },
        "capture": { "aspect": "3:4", "output_width": 600, "output_height": 800, "jpeg_quality": 70 },
        "flow": { "scan_code": false, "copy_tags": false },
        "share": { "outbox": "/var/spool/booth", "clipboard_command": "wl-copy" },
        "campaign": { "name": "Spring Fair", "default_tags": "#springfair" }
    }"##;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("BOOTH_CONFIG", file.path());
    std::env::set_var("BOOTH_SCAN_CODE", "yes");
    std::env::set_var("BOOTH_JPEG_QUALITY", "85");
    std::env::set_var("BOOTH_TAGS", "  #override @brand ");

    let cfg = BoothConfig::load().expect("load config");

    assert_eq!(cfg.camera_uri, "stub://stand?size=1920x1080");
    assert_eq!(cfg.initial_facing, Facing::Back);
    assert_eq!(cfg.capture.target_aspect, AspectRatio::new(3, 4).unwrap());
    assert_eq!((cfg.capture.ideal_width, cfg.capture.ideal_height), (600, 800));
    assert_eq!(cfg.capture.jpeg_quality, 85);
    assert!(cfg.flow.scan_code);
    assert!(!cfg.flow.copy_tags);
    assert_eq!(cfg.outbox, std::path::PathBuf::from("/var/spool/booth"));
    assert_eq!(cfg.clipboard_command.as_deref(), Some("wl-copy"));
    assert_eq!(cfg.campaign.name, "Spring Fair");
    assert_eq!(cfg.campaign.default_tags, "#override @brand");

    clear_env();
}

#[test]
fn loads_toml_file_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r##"
[camera]
uri = "stub://toml"

[capture]
jpeg_quality = 90

[campaign]
default_tags = "#tomlfair"

[campaign.screens.reward]
title = "You did it!"
"##;
    file.write_all(toml.as_bytes()).expect("write config");

    let cfg = BoothConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.camera_uri, "stub://toml");
    assert_eq!(cfg.capture.jpeg_quality, 90);
    assert_eq!(cfg.campaign.default_tags, "#tomlfair");
    assert_eq!(cfg.campaign.screens.reward.title, "You did it!");
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BOOTH_JPEG_QUALITY", "0");
    assert!(BoothConfig::load().is_err());
    clear_env();

    std::env::set_var("BOOTH_ASPECT", "wide");
    assert!(BoothConfig::load().is_err());
    clear_env();

    std::env::set_var("BOOTH_SCAN_CODE", "sometimes");
    assert!(BoothConfig::load().is_err());
    clear_env();
}

#[test]
fn env_aspect_resizes_output_width() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("BOOTH_ASPECT", "16:9");
    let cfg = BoothConfig::load().expect("load config");
    assert_eq!(cfg.capture.target_aspect, AspectRatio::new(16, 9).unwrap());
    assert_eq!((cfg.capture.output_width, cfg.capture.output_height), (3413, 1920));

    std::env::set_var("BOOTH_ASPECT", "1:1");
    let cfg = BoothConfig::load().expect("load config");
    assert_eq!((cfg.capture.output_width, cfg.capture.output_height), (1920, 1920));
    clear_env();
}

#[test]
fn explicit_output_width_against_aspect_names_the_keys() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".json").tempfile().expect("temp config");
    let json = r#"{ "capture": { "aspect": "3:4", "output_width": 1080, "output_height": 1920 } }"#;
    file.write_all(json.as_bytes()).expect("write config");

    let err = BoothConfig::load_from(Some(file.path())).unwrap_err().to_string();
    assert!(err.contains("capture.output_width/output_height"), "{}", err);
    assert!(err.contains("set output width to 1440"), "{}", err);
}

#[test]
fn rejects_unreadable_and_malformed_files() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let dir = tempfile::tempdir().expect("temp dir");
    assert!(BoothConfig::load_from(Some(&dir.path().join("missing.json"))).is_err());

    let mut file = Builder::new().suffix(".json").tempfile().expect("temp config");
    file.write_all(b"{ not json").expect("write config");
    assert!(BoothConfig::load_from(Some(file.path())).is_err());
}
