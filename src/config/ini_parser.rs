//! Minimal INI reader: `[section]` headers, `key = value` pairs, `#`/`;`
//! comments, and typed getters for the values the server reads.

use crate::error::AppError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct IniConfig {
    sections: HashMap<String, HashMap<String, String>>,
    global: HashMap<String, String>,
}

impl IniConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from file
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::InvalidConfiguration(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::parse(&content)
    }

    /// Parse INI content from string
    pub fn parse(content: &str) -> Result<Self, AppError> {
        let mut config = Self::new();
        let mut current_section = String::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            let line_number = index + 1;

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') {
                let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) else {
                    // Unterminated header, skip it
                    continue;
                };
                current_section = name.trim().to_string();
                if current_section.is_empty() {
                    return Err(invalid(format!("Empty section name at line {line_number}")));
                }
                config.sections.entry(current_section.clone()).or_default();
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(invalid(format!("Invalid syntax at line {line_number}: {line}")));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(invalid(format!("Empty key at line {line_number}: {line}")));
            }

            // Inline comments end the value
            let value = value
                .split(['#', ';'])
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();

            let target = if current_section.is_empty() {
                &mut config.global
            } else {
                config.sections.entry(current_section.clone()).or_default()
            };
            target.insert(key.to_string(), value);
        }

        Ok(config)
    }

    /// Get string value; empty values count as unset
    pub fn get_string(&self, section: &str, key: &str) -> Option<String> {
        let value = if section.is_empty() {
            self.global.get(key)
        } else {
            self.sections.get(section)?.get(key)
        };
        value.filter(|v| !v.is_empty()).cloned()
    }

    pub fn get_u16(&self, section: &str, key: &str) -> Option<u16> {
        self.get_string(section, key)?.parse().ok()
    }

    pub fn get_usize(&self, section: &str, key: &str) -> Option<usize> {
        self.get_string(section, key)?.parse().ok()
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Option<bool> {
        match self.get_string(section, key)?.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Some(true),
            "false" | "no" | "0" | "off" => Some(false),
            _ => None,
        }
    }

    /// Get comma-separated list
    pub fn get_list(&self, section: &str, key: &str) -> Vec<String> {
        self.get_string(section, key)
            .map(|s| {
                s.split(',')
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parse file size (supports KB, MB, GB suffixes)
    pub fn get_file_size(&self, section: &str, key: &str) -> Option<u64> {
        parse_file_size(&self.get_string(section, key)?)
    }
}

fn invalid(msg: String) -> AppError {
    AppError::InvalidConfiguration(msg)
}

/// Parse sizes like "100MB", "1.5GB" or a bare byte count
fn parse_file_size(value: &str) -> Option<u64> {
    let value = value.trim().to_uppercase();

    if let Ok(num) = value.parse::<u64>() {
        return Some(num);
    }

    let (num_part, multiplier) = if let Some(num) = value.strip_suffix("GB") {
        (num, 1024 * 1024 * 1024)
    } else if let Some(num) = value.strip_suffix("MB") {
        (num, 1024 * 1024)
    } else if let Some(num) = value.strip_suffix("KB") {
        (num, 1024)
    } else if let Some(num) = value.strip_suffix('B') {
        (num, 1)
    } else {
        return None;
    };

    let num_str = num_part.trim();
    if let Ok(num) = num_str.parse::<u64>() {
        return num.checked_mul(multiplier);
    }
    if let Ok(num) = num_str.parse::<f64>()
        && num >= 0.0
    {
        return Some((num * multiplier as f64) as u64);
    }

    None
}
