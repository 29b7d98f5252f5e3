// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Advanced engine options
//!
//! Options the engine documents are validated against their type; any other
//! name is kept verbatim as a custom option and forwarded untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{TetraError, TetraResult};

/// Value type of a documented option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    Bool,
    Int,
    Double,
    Text,
}

const KNOWN_OPTIONS: &[(&str, OptionType)] = &[
    ("boundary_regeneration", OptionType::Text),
    ("create_tag_on_collision", OptionType::Bool),
    ("debug", OptionType::Bool),
    ("force_output_quadratic_mesh", OptionType::Bool),
    ("max_number_of_errors_printed", OptionType::Int),
    ("no_initial_central_point", OptionType::Bool),
    ("sliver_angle", OptionType::Double),
    ("target_quality", OptionType::Double),
    ("volume_proximity_layers", OptionType::Int),
];

/// Type of `name` if it is a documented option.
pub fn known_option(name: &str) -> Option<OptionType> {
    KNOWN_OPTIONS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, kind)| *kind)
}

fn normalize(name: &str, kind: OptionType, value: &str) -> TetraResult<String> {
    let value = value.trim();
    let bad = || TetraError::Hypothesis(format!("invalid value '{}' for option {}", value, name));
    match kind {
        OptionType::Bool => match value.to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" | "on" => Ok("yes".into()),
            "no" | "false" | "0" | "off" => Ok("no".into()),
            _ => Err(bad()),
        },
        OptionType::Int => value.parse::<i64>().map(|v| v.to_string()).map_err(|_| bad()),
        OptionType::Double => match value.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(value.to_string()),
            _ => Err(bad()),
        },
        OptionType::Text => Ok(value.to_string()),
    }
}

/// Documented and custom advanced options, both kept in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedOptions {
    known: BTreeMap<String, String>,
    custom: BTreeMap<String, String>,
}

impl AdvancedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option. Documented options must parse as their type.
    pub fn set(&mut self, name: &str, value: &str) -> TetraResult<()> {
        let name = name.trim().trim_start_matches('-');
        if name.is_empty() {
            return Err(TetraError::Hypothesis("empty option name".into()));
        }
        match known_option(name) {
            Some(kind) => {
                let value = normalize(name, kind, value)?;
                self.known.insert(name.to_string(), value);
            }
            None => {
                self.custom.insert(name.to_string(), value.trim().to_string());
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.known
            .get(name)
            .or_else(|| self.custom.get(name))
            .map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.known.remove(name).or_else(|| self.custom.remove(name))
    }

    pub fn is_custom(&self, name: &str) -> bool {
        self.custom.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.custom.is_empty()
    }

    /// Documented options first, then custom ones.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.known
            .iter()
            .chain(self.custom.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Re-check documented options, e.g. after deserialisation.
    pub fn validate(&self) -> TetraResult<()> {
        for (name, value) in &self.known {
            let kind = known_option(name).ok_or_else(|| {
                TetraError::Hypothesis(format!("{} is not a documented option", name))
            })?;
            normalize(name, kind, value)?;
        }
        Ok(())
    }
}
