use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::Deserialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

/// Tunables of the touch state machine. All read per packet; the defaults
/// match the hardware's useful ranges (capacitance is 6 bits, positions are
/// 12 bits).
#[derive(Debug, Clone, Deserialize)]
pub struct Thresholds {
    /// Minimum contact weight that counts as a finger on the sensor.
    #[serde(default = "default_capacitance_threshold")]
    pub capacitance_threshold: u8,
    /// Contact weight above this is palm contact; the touch is discarded.
    #[serde(default = "default_palm_ignore_threshold")]
    pub palm_ignore_threshold: u8,
    /// How far the finger must travel from its landing point before the
    /// touch produces events at all.
    #[serde(default = "default_movement_hysteresis_threshold")]
    pub movement_hysteresis_threshold: i32,
    /// Raw position delta per emitted scroll step. Must be non-zero.
    #[serde(default = "default_movement_divisor")]
    pub movement_divisor: i32,
}

fn default_capacitance_threshold() -> u8 {
    16
}
fn default_palm_ignore_threshold() -> u8 {
    36
}
fn default_movement_hysteresis_threshold() -> i32 {
    192
}
fn default_movement_divisor() -> i32 {
    128
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            capacitance_threshold: default_capacitance_threshold(),
            palm_ignore_threshold: default_palm_ignore_threshold(),
            movement_hysteresis_threshold: default_movement_hysteresis_threshold(),
            movement_divisor: default_movement_divisor(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    #[serde(default)]
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
    pub detected_ports: Vec<String>,
}

fn config_dir() -> PathBuf {
    let home = UserDirs::new().unwrap().home_dir().to_path_buf();
    home.join(".config").join("fjscroll")
}

fn profiles_dir() -> PathBuf {
    config_dir().join("profiles")
}

fn active_ptr_path() -> PathBuf {
    config_dir().join("active")
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir();
        let profdir = profiles_dir();
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = active_ptr_path();
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = Self::load_profile(&active_name)?;
        let detected_ports = crate::ps2::discover()
            .iter()
            .map(|p| p.display().to_string())
            .collect();

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
            detected_ports,
        })
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = Self::load_profile(&self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.reload()?;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                if let Some(ext) = e.path().extension() {
                    if ext == "toml" {
                        if let Some(stem) = e.path().file_stem().and_then(|s| s.to_str()) {
                            v.push(stem.to_string());
                        }
                    }
                }
            }
        }
        v.sort();
        v
    }

    fn load_profile(name: &str) -> Result<Profile> {
        let path = profiles_dir().join(format!("{name}.toml"));
        let txt = fs::read_to_string(&path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        let profile: Profile =
            toml::from_str(&txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let uinput_ok = Path::new("/dev/uinput").exists();
        let in_input_group = check_in_input_group();
        serde_json::json!({
            "uinput_present": uinput_ok,
            "input_group_member": in_input_group,
            "serio_raw_ports": self.detected_ports,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "hints": {
                "bind_serio_raw": "echo -n serio_raw | sudo tee /sys/bus/serio/devices/serioN/drvctl",
                "udev_rule": "/etc/udev/rules.d/80-uinput.rules",
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

pub fn validate_profile(p: &Profile) -> Result<()> {
    let th = &p.thresholds;
    if th.capacitance_threshold == 0 || th.capacitance_threshold > 0x3f {
        return Err(anyhow!(
            "thresholds.capacitance_threshold must be in 1..=63 (capacitance is 6 bits)"
        ));
    }
    if th.palm_ignore_threshold > 0x3f {
        return Err(anyhow!("thresholds.palm_ignore_threshold must be <= 63"));
    }
    if th.palm_ignore_threshold < th.capacitance_threshold {
        return Err(anyhow!(
            "thresholds.palm_ignore_threshold below capacitance_threshold would suppress every touch"
        ));
    }
    if th.movement_hysteresis_threshold <= 0
        || th.movement_hysteresis_threshold > crate::motion::MAX_POSITION as i32
    {
        return Err(anyhow!(
            "thresholds.movement_hysteresis_threshold must be in 1..=4095 (positions are 12 bits)"
        ));
    }
    if th.movement_divisor <= 0 {
        return Err(anyhow!("thresholds.movement_divisor must be positive"));
    }
    Ok(())
}

fn check_in_input_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if line.starts_with("input:") {
                if line
                    .split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
                {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with(th: Thresholds) -> Profile {
        Profile {
            meta: Meta { name: None },
            thresholds: th,
        }
    }

    #[test]
    fn defaults_match_the_hardware_tuning() {
        let th = Thresholds::default();
        assert_eq!(th.capacitance_threshold, 16);
        assert_eq!(th.palm_ignore_threshold, 36);
        assert_eq!(th.movement_hysteresis_threshold, 192);
        assert_eq!(th.movement_divisor, 128);
    }

    #[test]
    fn omitted_thresholds_fall_back_to_defaults() {
        let p: Profile = toml::from_str("[meta]\nname = \"bare\"\n").unwrap();
        assert_eq!(p.thresholds.movement_divisor, 128);
        assert!(validate_profile(&p).is_ok());
    }

    #[test]
    fn zero_hysteresis_is_rejected() {
        let th = Thresholds {
            movement_hysteresis_threshold: 0,
            ..Thresholds::default()
        };
        assert!(validate_profile(&profile_with(th)).is_err());
    }

    #[test]
    fn zero_divisor_is_rejected() {
        let th = Thresholds {
            movement_divisor: 0,
            ..Thresholds::default()
        };
        assert!(validate_profile(&profile_with(th)).is_err());
    }

    #[test]
    fn palm_threshold_below_touch_threshold_is_rejected() {
        let th = Thresholds {
            capacitance_threshold: 40,
            palm_ignore_threshold: 36,
            ..Thresholds::default()
        };
        assert!(validate_profile(&profile_with(th)).is_err());
    }
}
