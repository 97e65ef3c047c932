// Primitives for reading elector preferences from CSV files.

use log::debug;
use snafu::prelude::*;

use crate::sim::*;

/// The electors read from one CSV file, and the options named in its header.
#[derive(PartialEq, Debug, Clone)]
pub struct PreferenceTable {
    pub options: Vec<String>,
    pub electors: Vec<ElectorEntry>,
}

pub fn read_csv_preferences(path: &str, cfs: &FileSource) -> SimResult<PreferenceTable> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        // Short rows are reported with their line number below.
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut records = rdr.into_records();

    let header = records
        .next()
        .context(CsvEmptySnafu { path })?
        .context(CsvLineParseSnafu { lineno: 1usize })?;
    debug!("read_csv_preferences: header: {:?}", header);

    // Without explicit configuration, a first column titled "name" holds the names.
    let name_idx_o = match cfs.name_column_index_int()? {
        Some(idx) => Some(idx),
        None if header
            .get(0)
            .map(|h| h.eq_ignore_ascii_case("name"))
            .unwrap_or(false) =>
        {
            Some(0)
        }
        None => None,
    };
    let first_weight_col = match cfs.first_weight_column_index_int()? {
        Some(idx) => idx,
        None => name_idx_o.map(|idx| idx + 1).unwrap_or(0),
    };

    let weight_columns: Vec<(usize, String)> = header
        .iter()
        .enumerate()
        .skip(first_weight_col)
        .filter(|(col, _)| Some(*col) != name_idx_o)
        .map(|(col, option)| (col, option.to_string()))
        .collect();
    let options: Vec<String> = weight_columns.iter().map(|(_, o)| o.clone()).collect();

    let mut electors: Vec<ElectorEntry> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;

        let name = match name_idx_o {
            Some(name_idx) => {
                let n = line.get(name_idx).context(CsvLineTooShortSnafu { lineno })?;
                if n.is_empty() {
                    None
                } else {
                    Some(n.to_string())
                }
            }
            None => None,
        };

        let mut preferences: Vec<(String, f64)> = Vec::new();
        for (col, option) in weight_columns.iter() {
            let cell = line.get(*col).context(CsvLineTooShortSnafu { lineno })?;
            let weight = if cell.is_empty() {
                0.0
            } else {
                cell.parse::<f64>().ok().context(CsvWeightParseSnafu {
                    lineno,
                    content: cell,
                })?
            };
            preferences.push((option.clone(), weight));
        }
        debug!(
            "read_csv_preferences: lineno: {:?} name: {:?} preferences: {:?}",
            lineno, name, preferences
        );
        electors.push(ElectorEntry { name, preferences });
    }

    Ok(PreferenceTable { options, electors })
}
