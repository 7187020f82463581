use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::campaign::Campaign;
use crate::capture::{CaptureSettings, DEFAULT_JPEG_QUALITY, DEFAULT_OUTPUT_HEIGHT};
use crate::flow::FlowOptions;
use crate::{AspectRatio, Facing, DEFAULT_TARGET_ASPECT};

const DEFAULT_CAMERA: &str = "stub://booth";
const DEFAULT_OUTBOX: &str = "booth_outbox";

#[derive(Debug, Deserialize, Default)]
struct BoothConfigFile {
    camera: Option<CameraConfigFile>,
    capture: Option<CaptureConfigFile>,
    flow: Option<FlowConfigFile>,
    share: Option<ShareConfigFile>,
    campaign: Option<Campaign>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    uri: Option<String>,
    facing: Option<Facing>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    aspect: Option<String>,
    ideal_width: Option<u32>,
    ideal_height: Option<u32>,
    output_width: Option<u32>,
    output_height: Option<u32>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct FlowConfigFile {
    scan_code: Option<bool>,
    copy_tags: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct ShareConfigFile {
    outbox: Option<PathBuf>,
    clipboard_command: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BoothConfig {
    pub camera_uri: String,
    pub initial_facing: Facing,
    pub capture: CaptureSettings,
    pub flow: FlowOptions,
    pub outbox: PathBuf,
    pub clipboard_command: Option<String>,
    pub campaign: Campaign,
}

impl BoothConfig {
    /// Defaults, then the file named by `BOOTH_CONFIG`, then `BOOTH_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("BOOTH_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Same as `load`, with an explicit file path taking the place of `BOOTH_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: BoothConfigFile) -> Result<Self> {
        let camera_uri = file
            .camera
            .as_ref()
            .and_then(|camera| camera.uri.clone())
            .unwrap_or_else(|| DEFAULT_CAMERA.to_string());
        let initial_facing = file
            .camera
            .as_ref()
            .and_then(|camera| camera.facing)
            .unwrap_or_default();

        let capture_file = file.capture.unwrap_or_default();
        let target_aspect = match capture_file.aspect.as_deref() {
            Some(aspect) => aspect.parse()?,
            None => DEFAULT_TARGET_ASPECT,
        };
        // Output width follows the aspect unless set explicitly.
        let output_height = capture_file.output_height.unwrap_or(DEFAULT_OUTPUT_HEIGHT);
        let output_width = capture_file
            .output_width
            .unwrap_or_else(|| target_aspect.width_for(output_height));
        let capture = CaptureSettings {
            ideal_width: capture_file.ideal_width.unwrap_or(output_width),
            ideal_height: capture_file.ideal_height.unwrap_or(output_height),
            target_aspect,
            output_width,
            output_height,
            jpeg_quality: capture_file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
        };

        let defaults = FlowOptions::default();
        let flow = FlowOptions {
            scan_code: file
                .flow
                .as_ref()
                .and_then(|flow| flow.scan_code)
                .unwrap_or(defaults.scan_code),
            copy_tags: file
                .flow
                .as_ref()
                .and_then(|flow| flow.copy_tags)
                .unwrap_or(defaults.copy_tags),
        };

        let outbox = file
            .share
            .as_ref()
            .and_then(|share| share.outbox.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTBOX));
        let clipboard_command = file.share.and_then(|share| share.clipboard_command);

        Ok(Self {
            camera_uri,
            initial_facing,
            capture,
            flow,
            outbox,
            clipboard_command,
            campaign: file.campaign.unwrap_or_default(),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(uri) = std::env::var("BOOTH_CAMERA") {
            if !uri.trim().is_empty() {
                self.camera_uri = uri;
            }
        }
        if let Ok(tags) = std::env::var("BOOTH_TAGS") {
            if !tags.trim().is_empty() {
                self.campaign.default_tags = tags.trim().to_string();
            }
        }
        if let Ok(aspect) = std::env::var("BOOTH_ASPECT") {
            let aspect: AspectRatio = aspect
                .parse()
                .map_err(|e| anyhow!("BOOTH_ASPECT must look like W:H: {}", e))?;
            self.capture.target_aspect = aspect;
            self.capture.output_width = aspect.width_for(self.capture.output_height);
        }
        if let Ok(quality) = std::env::var("BOOTH_JPEG_QUALITY") {
            self.capture.jpeg_quality = quality
                .trim()
                .parse()
                .map_err(|_| anyhow!("BOOTH_JPEG_QUALITY must be an integer in 1..=100"))?;
        }
        if let Ok(scan) = std::env::var("BOOTH_SCAN_CODE") {
            self.flow.scan_code = parse_bool(&scan)
                .ok_or_else(|| anyhow!("BOOTH_SCAN_CODE must be true or false"))?;
        }
        if let Ok(outbox) = std::env::var("BOOTH_OUTBOX") {
            if !outbox.trim().is_empty() {
                self.outbox = PathBuf::from(outbox);
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.camera_uri.trim().is_empty() {
            return Err(anyhow!("camera uri must not be empty"));
        }
        if !(1..=100).contains(&self.capture.jpeg_quality) {
            return Err(anyhow!("jpeg quality must be in 1..=100"));
        }
        self.capture
            .check_geometry()
            .map_err(|e| anyhow!("capture.output_width/output_height: {}", e))?;
        if self.campaign.default_tags.trim().is_empty() {
            return Err(anyhow!("default tags must not be empty"));
        }
        self.campaign.default_tags = self.campaign.default_tags.trim().to_string();
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<BoothConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool(" Yes "), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn defaults_validate() -> Result<()> {
        let mut cfg = BoothConfig::from_file(BoothConfigFile::default())?;
        cfg.validate()?;
        assert_eq!(cfg.camera_uri, DEFAULT_CAMERA);
        assert_eq!(cfg.capture, CaptureSettings::default());
        assert_eq!(cfg.flow, FlowOptions::default());
        Ok(())
    }

    #[test]
    fn mismatched_output_geometry_is_rejected() -> Result<()> {
        let file = BoothConfigFile {
            capture: Some(CaptureConfigFile {
                aspect: Some("1:1".to_string()),
                output_width: Some(1080),
                ..CaptureConfigFile::default()
            }),
            ..BoothConfigFile::default()
        };
        let mut cfg = BoothConfig::from_file(file)?;
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("output_width"), "{}", err);
        assert!(err.contains("set output width to 1920"), "{}", err);
        Ok(())
    }

    #[test]
    fn output_width_follows_file_aspect() -> Result<()> {
        let file = BoothConfigFile {
            capture: Some(CaptureConfigFile {
                aspect: Some("4:5".to_string()),
                output_height: Some(1350),
                ..CaptureConfigFile::default()
            }),
            ..BoothConfigFile::default()
        };
        let mut cfg = BoothConfig::from_file(file)?;
        cfg.validate()?;
        assert_eq!((cfg.capture.output_width, cfg.capture.output_height), (1080, 1350));
        Ok(())
    }
}
