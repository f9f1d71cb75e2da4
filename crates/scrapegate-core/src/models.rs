use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Lowest machine number reachable on the device subnet.
pub const MIN_MACHINE: u16 = 71;
/// Highest machine number reachable on the device subnet.
pub const MAX_MACHINE: u16 = 110;

/// A PDF-filename-keyed cluster of the table rows that follow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobGroup {
    pub pdf_file: String,
    pub data_rows: Vec<Vec<String>>,
}

impl JobGroup {
    pub fn new(pdf_file: impl Into<String>) -> Self {
        Self {
            pdf_file: pdf_file.into(),
            data_rows: Vec::new(),
        }
    }
}

/// A validated device number in `71..=110`.
///
/// The only way to obtain one is through [`MachineId::new`] or [`FromStr`],
/// so holding a `MachineId` means no browser work is wasted on bad input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MachineId(u16);

impl MachineId {
    pub fn new(value: u16) -> Result<Self, AppError> {
        if (MIN_MACHINE..=MAX_MACHINE).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AppError::Validation(format!(
                "machine {value} is outside {MIN_MACHINE}-{MAX_MACHINE}"
            )))
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

/// Decimal integer text, optionally padded with whitespace and carrying a
/// leading `+`, as `u16` parsing accepts.
impl FromStr for MachineId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u16 = s
            .trim()
            .parse()
            .map_err(|_| AppError::Validation(format!("machine '{s}' is not a number")))?;
        Self::new(value)
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
