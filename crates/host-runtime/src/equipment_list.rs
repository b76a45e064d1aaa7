//! # Persisted Equipment List
//!
//! `{ "equipments": [ { equipment_name, equipment_model, address, port,
//! session_id, connect_mode, device_type, enable } ... ] }`
//!
//! `EquipmentList` holds the document; `EquipmentListFile` ties it to a path
//! and rewrites the file after every successful change. A failed change
//! leaves both the list and the file untouched.

use eq_session_controller::ModelKind;
use serde::{Deserialize, Serialize};
use shared_types::{ConnectMode, EquipmentIdentity};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Equipment list errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    #[error("equipment list I/O error: {0}")]
    Io(String),

    #[error("equipment list parse error: {0}")]
    Parse(String),

    #[error("equipment {0} already exists")]
    Duplicate(String),

    #[error("unknown equipment: {0}")]
    UnknownEquipment(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("invalid value {value:?} for {field}")]
    InvalidValue { field: String, value: String },
}

/// The persisted document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentList {
    #[serde(default)]
    pub equipments: Vec<EquipmentIdentity>,
}

impl EquipmentList {
    pub fn from_json(json: &str) -> Result<Self, ListError> {
        serde_json::from_str(json).map_err(|e| ListError::Parse(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ListError> {
        serde_json::to_string_pretty(self).map_err(|e| ListError::Parse(e.to_string()))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EquipmentIdentity> {
        self.equipments.iter().find(|e| e.equipment_name == name)
    }

    /// Equipments with the administrative flag set.
    pub fn enabled(&self) -> impl Iterator<Item = &EquipmentIdentity> {
        self.equipments.iter().filter(|e| e.enable)
    }

    /// Add a tool. Names are unique and the model tag must be known.
    pub fn add(&mut self, identity: EquipmentIdentity) -> Result<(), ListError> {
        if self.get(&identity.equipment_name).is_some() {
            return Err(ListError::Duplicate(identity.equipment_name));
        }
        identity
            .equipment_model
            .parse::<ModelKind>()
            .map_err(|_| ListError::UnknownModel(identity.equipment_model.clone()))?;
        self.equipments.push(identity);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<EquipmentIdentity, ListError> {
        let index = self
            .equipments
            .iter()
            .position(|e| e.equipment_name == name)
            .ok_or_else(|| ListError::UnknownEquipment(name.to_string()))?;
        Ok(self.equipments.remove(index))
    }

    /// Set one field from its text form. The name itself cannot be edited.
    pub fn edit(&mut self, name: &str, field: &str, value: &str) -> Result<(), ListError> {
        let index = self
            .equipments
            .iter()
            .position(|e| e.equipment_name == name)
            .ok_or_else(|| ListError::UnknownEquipment(name.to_string()))?;

        let mut updated = self.equipments[index].clone();
        apply_field(&mut updated, field, value)?;
        self.equipments[index] = updated;
        Ok(())
    }

    pub fn set_enabled(&mut self, name: &str, enable: bool) -> Result<(), ListError> {
        self.edit(name, "enable", if enable { "true" } else { "false" })
    }
}

fn apply_field(identity: &mut EquipmentIdentity, field: &str, value: &str) -> Result<(), ListError> {
    let invalid = || ListError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    };
    let value = value.trim();
    match field {
        "equipment_model" => {
            let kind = value
                .parse::<ModelKind>()
                .map_err(|_| ListError::UnknownModel(value.to_string()))?;
            identity.equipment_model = kind.as_str().to_string();
        }
        "address" => identity.address = value.to_string(),
        "port" => identity.port = value.parse().map_err(|_| invalid())?,
        "session_id" => identity.session_id = value.parse().map_err(|_| invalid())?,
        "connect_mode" => {
            identity.connect_mode = match value.to_ascii_uppercase().as_str() {
                "ACTIVE" => ConnectMode::Active,
                "PASSIVE" => ConnectMode::Passive,
                _ => return Err(invalid()),
            }
        }
        "device_type" => identity.device_type = value.to_string(),
        "enable" => identity.enable = value.parse().map_err(|_| invalid())?,
        _ => return Err(ListError::UnknownField(field.to_string())),
    }
    Ok(())
}

/// An equipment list bound to its file.
#[derive(Debug)]
pub struct EquipmentListFile {
    path: PathBuf,
    list: EquipmentList,
}

impl EquipmentListFile {
    /// Load `path`; a missing file is an empty list.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ListError> {
        let path = path.into();
        let list = match std::fs::read_to_string(&path) {
            Ok(json) => EquipmentList::from_json(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no equipment list, starting empty");
                EquipmentList::default()
            }
            Err(e) => return Err(ListError::Io(format!("{}: {e}", path.display()))),
        };
        info!(path = %path.display(), equipments = list.equipments.len(), "equipment list loaded");
        Ok(Self { path, list })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn list(&self) -> &EquipmentList {
        &self.list
    }

    pub fn add(&mut self, identity: EquipmentIdentity) -> Result<(), ListError> {
        self.change(|list| list.add(identity))
    }

    pub fn remove(&mut self, name: &str) -> Result<EquipmentIdentity, ListError> {
        self.change(|list| list.remove(name))
    }

    pub fn edit(&mut self, name: &str, field: &str, value: &str) -> Result<(), ListError> {
        self.change(|list| list.edit(name, field, value))
    }

    pub fn set_enabled(&mut self, name: &str, enable: bool) -> Result<(), ListError> {
        self.change(|list| list.set_enabled(name, enable))
    }

    /// Apply `op` to a copy, persist it, then keep it.
    fn change<T>(&mut self, op: impl FnOnce(&mut EquipmentList) -> Result<T, ListError>) -> Result<T, ListError> {
        let mut next = self.list.clone();
        let result = op(&mut next).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "equipment list change refused");
            e
        })?;
        save(&self.path, &next)?;
        self.list = next;
        Ok(result)
    }
}

fn save(path: &Path, list: &EquipmentList) -> Result<(), ListError> {
    let io = |e: std::io::Error| ListError::Io(format!("{}: {e}", path.display()));
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(io)?;
    }
    let staging = path.with_extension("json.partial");
    std::fs::write(&staging, list.to_json()?).map_err(io)?;
    std::fs::rename(&staging, path).map_err(io)
}
