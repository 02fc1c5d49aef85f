//! Delimited raw-table reader shared by both instrument families.
//!
//! The reader maps configured header names to sample fields, decodes condition
//! codes and applies the family's current sign convention. Header bytes are
//! decoded lossily so exports written in legacy code pages still resolve their
//! ASCII column names. Rows are returned in file order with `step_time_s`
//! left at zero; cycle construction re-derives it.

use crate::core::Sample;
use crate::error::{AppResult, CyclerError};
use crate::instrument::config::TableLayout;
use csv::{ByteRecord, ReaderBuilder};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

struct ColumnIndex {
    time: usize,
    voltage: usize,
    current: usize,
    capacity: usize,
    condition: usize,
    temperature: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &[String], layout: &TableLayout, file: &Path) -> AppResult<Self> {
        let find = |name: &str| headers.iter().position(|h| h == name.trim());
        let require = |name: &str| {
            find(name).ok_or_else(|| {
                CyclerError::source_format(
                    file,
                    format!("missing column '{name}' (found: {})", headers.join(", ")),
                )
            })
        };
        let columns = &layout.columns;
        Ok(Self {
            time: require(&columns.time)?,
            voltage: require(&columns.voltage)?,
            current: require(&columns.current)?,
            capacity: require(&columns.capacity)?,
            condition: require(&columns.condition)?,
            temperature: columns.temperature.as_deref().and_then(find),
        })
    }
}

/// Reads every sample from the table at `path`.
pub fn read_table(path: &Path, layout: &TableLayout) -> AppResult<Vec<Sample>> {
    let file = File::open(path).map_err(|e| CyclerError::io(path, e))?;
    parse_table(BufReader::new(file), path, layout)
}

/// Parses a raw table from `reader`; `file` is only used in error messages.
///
/// Rows whose voltage or current field is empty are skipped. Any other
/// unparsable numeric field, or an unknown condition code, is a `SourceFormat`
/// error naming the line.
pub fn parse_table<R: Read>(reader: R, file: &Path, layout: &TableLayout) -> AppResult<Vec<Sample>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(layout.delimiter_byte()?)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .byte_headers()
        .map_err(|e| CyclerError::csv(file, e))?
        .iter()
        .map(|h| String::from_utf8_lossy(h).trim().to_string())
        .collect();
    let index = ColumnIndex::resolve(&headers, layout, file)?;

    let mut samples = Vec::new();
    let mut skipped = 0usize;
    let mut record = ByteRecord::new();
    while reader
        .read_byte_record(&mut record)
        .map_err(|e| CyclerError::csv(file, e))?
    {
        let line = record.position().map_or(0, |p| p.line());
        let row = RowReader {
            record: &record,
            file,
            line,
        };

        let voltage = row.optional_number(index.voltage, "voltage")?;
        let current = row.optional_number(index.current, "current")?;
        let (Some(voltage_v), Some(raw_current)) = (voltage, current) else {
            skipped += 1;
            continue;
        };

        let code = row.text(index.condition);
        let condition = layout.condition_codes.decode(&code).ok_or_else(|| {
            CyclerError::source_format(file, format!("line {line}: unknown condition code '{code}'"))
        })?;

        samples.push(Sample {
            time_s: row.number(index.time, "time")?,
            step_time_s: 0.0,
            condition,
            voltage_v,
            current_ma: layout.current_sign.apply(raw_current, condition),
            capacity_mah: row.number(index.capacity, "capacity")?,
            temperature_c: match index.temperature {
                Some(i) => row.optional_number(i, "temperature")?,
                None => None,
            },
        });
    }

    if skipped > 0 {
        debug!(file = %file.display(), skipped, "Skipped rows without voltage or current");
    }
    Ok(samples)
}

struct RowReader<'a> {
    record: &'a ByteRecord,
    file: &'a Path,
    line: u64,
}

impl RowReader<'_> {
    fn text(&self, i: usize) -> String {
        self.record
            .get(i)
            .map(|f| String::from_utf8_lossy(f).trim().to_string())
            .unwrap_or_default()
    }

    fn optional_number(&self, i: usize, field: &str) -> AppResult<Option<f64>> {
        let text = self.text(i);
        if text.is_empty() {
            return Ok(None);
        }
        text.parse::<f64>()
            .map(|v| v.is_finite().then_some(v))
            .map_err(|_| {
                CyclerError::source_format(
                    self.file,
                    format!("line {}: {field} value '{text}' is not a number", self.line),
                )
            })
    }

    fn number(&self, i: usize, field: &str) -> AppResult<f64> {
        self.optional_number(i, field)?.ok_or_else(|| {
            CyclerError::source_format(
                self.file,
                format!("line {}: {field} value is missing", self.line),
            )
        })
    }
}
