//! Gas-phase thermodynamic library in the Lewis 9-coefficient format.
//!
//! The built-in data set (`lewis_gas.json`) is compiled into the crate; user libraries with the
//! same record layout can be loaded from disk and merged on top of it.
use super::NASA9data::{LewisError, LewisInput, LewisPolynomial};
use log::{info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

const LEWIS_GAS: &str = include_str!("lewis_gas.json");

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Unknown species '{0}': no record in the thermodynamic library")]
    UnknownSpecies(String),
    #[error("Bad record for species '{species}': {source}")]
    BadRecord {
        species: String,
        #[source]
        source: LewisError,
    },
    #[error("Failed to read library file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse library JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

/// map species name -> raw Lewis record
#[derive(Debug, Clone, Default)]
pub struct LewisLibrary {
    pub records: HashMap<String, LewisInput>,
}

impl LewisLibrary {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// library shipped with the crate
    pub fn builtin() -> Result<Self, LibraryError> {
        Self::from_str(LEWIS_GAS)
    }

    pub fn from_str(s: &str) -> Result<Self, LibraryError> {
        let raw: HashMap<String, Value> = serde_json::from_str(s)?;
        Self::from_values(raw)
    }

    pub fn from_values(raw: HashMap<String, Value>) -> Result<Self, LibraryError> {
        let mut records = HashMap::new();
        for (name, value) in raw {
            let input: LewisInput = serde_json::from_value(value)?;
            // reject malformed coefficient arrays at load time
            LewisPolynomial::from_flat(&input.Cp).map_err(|e| LibraryError::BadRecord {
                species: name.clone(),
                source: e,
            })?;
            records.insert(name, input);
        }
        if records.is_empty() {
            warn!("Loaded Lewis library is empty");
        }
        Ok(Self { records })
    }

    /// load a JSON library `{"name": {"composition": {..}, "model": "NASA9", "Cp": [..]}}`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LibraryError> {
        let path_str = path.as_ref().display().to_string();
        let content = fs::read_to_string(&path).map_err(|e| LibraryError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        let library = Self::from_str(&content)?;
        info!(
            "Loaded {} species from Lewis library '{}'",
            library.records.len(),
            path_str
        );
        Ok(library)
    }

    /// records of `other` replace records of the same name
    pub fn merge(&mut self, other: LewisLibrary) {
        self.records.extend(other.records);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&LewisInput, LibraryError> {
        self.records
            .get(name)
            .ok_or_else(|| LibraryError::UnknownSpecies(name.to_string()))
    }

    pub fn polynomial(&self, name: &str) -> Result<LewisPolynomial, LibraryError> {
        let record = self.get(name)?;
        LewisPolynomial::from_flat(&record.Cp).map_err(|e| LibraryError::BadRecord {
            species: name.to_string(),
            source: e,
        })
    }

    pub fn species_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records.keys().cloned().collect();
        names.sort();
        names
    }
}
