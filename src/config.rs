use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::stack::StackLocation;
use crate::style::{parse_hex_color, Rgba, Style};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub location: StackLocation,
    pub monitor: usize,
    pub default_timeout_ms: u64,
    pub font: String,
    pub gradient_look: bool,
    pub transparency: bool,
    pub screen_width: i32,
    pub screen_height: i32,
    pub colors: Colors,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Colors {
    pub base: Option<String>,
    pub bg_normal: Option<String>,
    pub bg_selected: Option<String>,
    pub bg_active: Option<String>,
    pub text: Option<String>,
    pub border: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            location: StackLocation::BottomRight,
            monitor: 0,
            default_timeout_ms: 5000,
            font: "Sans 10".to_string(),
            gradient_look: false,
            transparency: true,
            screen_width: 1920,
            screen_height: 1080,
            colors: Colors::default(),
        }
    }
}

impl Config {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parse config")
    }

    /// Palette with every valid configured color applied over the defaults.
    pub fn style(&self) -> Style {
        let mut style = Style::default();
        let c = &self.colors;
        let slots: [(&Option<String>, &mut Rgba, &str); 6] = [
            (&c.base, &mut style.base, "base"),
            (&c.bg_normal, &mut style.bg_normal, "bg_normal"),
            (&c.bg_selected, &mut style.bg_selected, "bg_selected"),
            (&c.bg_active, &mut style.bg_active, "bg_active"),
            (&c.text, &mut style.text, "text"),
            (&c.border, &mut style.border, "border"),
        ];
        for (value, slot, name) in slots {
            let Some(value) = value else { continue };
            match parse_hex_color(value) {
                Some(rgba) => *slot = rgba,
                None => warn!("ignoring invalid color {name} = {value:?}"),
            }
        }
        style
    }
}

pub fn config_path() -> PathBuf {
    let base = env::var("XDG_CONFIG_HOME")
        .unwrap_or_else(|_| format!("{}/.config", env::var("HOME").unwrap_or_default()));
    PathBuf::from(base).join("squawk").join("config.json")
}

pub fn read_config() -> Result<Config> {
    let path = config_path();
    let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    Config::parse(&text)
}
