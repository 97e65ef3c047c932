use crate::sim::*;

use log::debug;
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "contestName")]
    pub contest_name: String,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "nameColumnIndex")]
    pub name_column_index: Option<JSValue>,
    #[serde(rename = "firstWeightColumnIndex")]
    pub first_weight_column_index: Option<JSValue>,
}

impl FileSource {
    pub fn csv(file_path: &str) -> FileSource {
        FileSource {
            provider: "csv".to_string(),
            file_path: file_path.to_string(),
            name_column_index: None,
            first_weight_column_index: None,
        }
    }

    /// The 0-based index of the name column, if any.
    pub fn name_column_index_int(&self) -> SimResult<Option<usize>> {
        match self.name_column_index {
            None | Some(JSValue::Null) => Ok(None),
            _ => read_js_int(&self.name_column_index).map(|x| Some(x - 1)),
        }
    }

    /// The 0-based index of the first weight column, if specified.
    pub fn first_weight_column_index_int(&self) -> SimResult<Option<usize>> {
        match self.first_weight_column_index {
            None | Some(JSValue::Null) => Ok(None),
            _ => read_js_int(&self.first_weight_column_index).map(|x| Some(x - 1)),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ConfigElector {
    pub name: Option<String>,
    pub preferences: BTreeMap<String, f64>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimRules {
    #[serde(rename = "fractionRequired")]
    pub fraction_required: Option<f64>,
    #[serde(rename = "maxRounds")]
    pub max_rounds: Option<u32>,
    #[serde(rename = "randomSeed")]
    pub random_seed: Option<String>,
    #[serde(rename = "tiebreakMode")]
    pub tiebreak_mode: Option<String>,
}

impl SimRules {
    pub fn random_seed(&self) -> SimResult<Option<u64>> {
        match self.random_seed.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => match s.parse::<u64>() {
                Ok(x) => Ok(Some(x)),
                Err(_) => whatever!("Failed to understand randomSeed option: {:?}", s),
            },
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub electors: Vec<ConfigElector>,
    #[serde(rename = "electorFileSources", default)]
    pub elector_file_sources: Vec<FileSource>,
    #[serde(default)]
    pub rules: SimRules,
}

pub fn read_config(path: &str) -> SimResult<SimConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: SimConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn read_summary(path: &str) -> SimResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

/// Reads a 1-based column index, written either as a number or as a string.
/// Excel-style column letters are accepted as well ("A" is the first column).
fn read_js_int(x: &Option<JSValue>) -> SimResult<usize> {
    let idx = match x {
        Some(JSValue::Number(n)) => n.as_u64().map(|x| x as usize),
        Some(JSValue::String(s)) if s.len() == 1 && s.chars().all(|c| c.is_ascii_alphabetic()) => {
            s.to_ascii_lowercase()
                .chars()
                .next()
                .map(|c| (c as usize) - ('a' as usize) + 1)
        }
        Some(JSValue::String(s)) => s.parse::<usize>().ok(),
        _ => None,
    };
    match idx {
        Some(i) if i >= 1 => Ok(i),
        _ => ParsingJsonNumberSnafu {
            content: format!("{:?}", x),
        }
        .fail(),
    }
}
