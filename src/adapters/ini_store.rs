//! INI-file configuration store.
//!
//! Implements [`ConfigStore`] over a flash-backed INI file
//! (`/spiffs/config.ini` on the device).  Format:
//!
//! ```text
//! ; comment            # comment
//! [WiFi]
//! ssid=Siet_rozhlas
//! password=...
//! ```
//!
//! The whole file is parsed and validated once.  A file that cannot be
//! read, has a malformed line, repeats a section, or lacks a required
//! section makes [`status`](ConfigStore::status) fail and every lookup
//! return an empty string.  Unknown sections and keys are logged as
//! warnings and kept out of lookups.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: [`mount_spiffs`] registers the SPIFFS
//!   partition with the VFS so `std::fs` can read it.
//! - **all other targets**: any filesystem path works.

use std::path::Path;

use log::{info, warn};

use crate::app::ports::{ConfigStore, ConfigStoreError};
use crate::config::{KNOWN_KEYS, REQUIRED_SECTIONS};

/// Device path of the configuration file.
pub const CONFIG_PATH: &str = "/spiffs/config.ini";

#[derive(Debug, Clone, Default)]
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

/// Parsed configuration file.
#[derive(Debug, Clone)]
pub struct IniStore {
    sections: Vec<Section>,
    status: Result<(), ConfigStoreError>,
    /// `Section.key` names that are not part of the known layout.
    unknown: Vec<String>,
}

impl IniStore {
    /// Read and parse `path`.  An unreadable file yields a store whose
    /// status is [`ConfigStoreError::Unavailable`].
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                info!("Config: loaded {} ({} bytes)", path.display(), text.len());
                Self::parse(&text)
            }
            Err(e) => {
                warn!("Config: cannot read {}: {}", path.display(), e);
                Self::failed(ConfigStoreError::Unavailable)
            }
        }
    }

    /// Parse INI text.  Never panics; problems surface through `status()`.
    pub fn parse(text: &str) -> Self {
        let mut sections: Vec<Section> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Self::failed(ConfigStoreError::Malformed { line: line_no });
                };
                let name = name.trim();
                if name.is_empty() {
                    return Self::failed(ConfigStoreError::Malformed { line: line_no });
                }
                if sections.iter().any(|s| s.name == name) {
                    return Self::failed(ConfigStoreError::DuplicateSection { line: line_no });
                }
                sections.push(Section {
                    name: name.to_owned(),
                    entries: Vec::new(),
                });
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Self::failed(ConfigStoreError::Malformed { line: line_no });
            };
            let key = key.trim();
            let Some(section) = sections.last_mut() else {
                return Self::failed(ConfigStoreError::Malformed { line: line_no });
            };
            if key.is_empty() {
                return Self::failed(ConfigStoreError::Malformed { line: line_no });
            }

            let value = value.trim().to_owned();
            match section.entries.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => {
                    warn!("Config: [{}] {} repeated at line {}, last wins", section.name, key, line_no);
                    entry.1 = value;
                }
                None => section.entries.push((key.to_owned(), value)),
            }
        }

        for required in REQUIRED_SECTIONS {
            if !sections.iter().any(|s| s.name == required) {
                return Self::failed(ConfigStoreError::MissingSection(required));
            }
        }

        let unknown = strip_unknown(&mut sections);
        for name in &unknown {
            warn!("Config: unknown key {} ignored (typo?)", name);
        }

        Self {
            sections,
            status: Ok(()),
            unknown,
        }
    }

    fn failed(err: ConfigStoreError) -> Self {
        warn!("Config: store invalid: {}", err);
        Self {
            sections: Vec::new(),
            status: Err(err),
            unknown: Vec::new(),
        }
    }

    /// Keys that were present in the file but are not recognised.
    pub fn unknown_keys(&self) -> &[String] {
        &self.unknown
    }
}

/// Remove entries outside the known layout, returning their names.
fn strip_unknown(sections: &mut [Section]) -> Vec<String> {
    let mut unknown = Vec::new();
    for section in sections.iter_mut() {
        let known = KNOWN_KEYS
            .iter()
            .find(|(name, _)| *name == section.name)
            .map(|(_, keys)| *keys);
        let name = section.name.clone();
        section.entries.retain(|(key, _)| {
            let ok = known.is_some_and(|keys| keys.contains(&key.as_str()));
            if !ok {
                unknown.push(format!("{}.{}", name, key));
            }
            ok
        });
    }
    unknown
}

impl ConfigStore for IniStore {
    fn status(&self) -> Result<(), ConfigStoreError> {
        self.status
    }

    fn get(&self, section: &str, key: &str) -> String {
        if self.status.is_err() {
            return String::new();
        }
        self.sections
            .iter()
            .find(|s| s.name == section)
            .and_then(|s| s.entries.iter().find(|(k, _)| k == key))
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }
}

/// Register the SPIFFS data partition at `/spiffs`.
#[cfg(target_os = "espidf")]
pub fn mount_spiffs() -> Result<(), ConfigStoreError> {
    use esp_idf_svc::sys::{ESP_OK, esp_vfs_spiffs_conf_t, esp_vfs_spiffs_register};

    let conf = esp_vfs_spiffs_conf_t {
        base_path: c"/spiffs".as_ptr(),
        partition_label: core::ptr::null(),
        max_files: 4,
        format_if_mount_failed: false,
    };
    let ret = unsafe { esp_vfs_spiffs_register(&conf) };
    if ret != ESP_OK {
        warn!("Config: SPIFFS mount failed ({})", ret);
        return Err(ConfigStoreError::Unavailable);
    }
    Ok(())
}
