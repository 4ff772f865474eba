//! Loading of hourly sensor readings.
//!
//! The training file holds one row per (day, channel) with 24 hourly readings,
//! 20 days per month. The test file holds blocks of `channels` rows, each row carrying
//! the last 9 hourly readings of one channel.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use ndarray::{Array, Array3};

use crate::error::{Error, Result};

pub const CHANNEL_NAMES: [&str; 18] = [
    "AMB_TEMP",
    "CH4",
    "CO",
    "NMHC",
    "NO",
    "NO2",
    "NOx",
    "O3",
    "PM10",
    "PM2.5",
    "RAINFALL",
    "RH",
    "SO2",
    "THC",
    "WD_HR",
    "WIND_DIREC",
    "WIND_SPEED",
    "WS_HR",
];

/// Token written by the sensors when no reading was taken.
pub const MISSING_SENTINEL: &str = "NR";

/// How tokens that are not numbers get imputed while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingValuePolicy {
    /// `NR` and empty fields become `0.0`, anything else that fails to parse is an error.
    #[default]
    ZeroFill,
    /// Every token that fails to parse becomes `0.0`.
    ZeroFillMalformed,
}

impl MissingValuePolicy {
    /// Returns `None` when the token is rejected under this policy.
    pub fn parse(&self, token: &[u8]) -> Option<f64> {
        let token = std::str::from_utf8(token).ok().map(str::trim);

        match token {
            Some("") | Some(MISSING_SENTINEL) => Some(0.),
            Some(t) => match (t.parse::<f64>(), self) {
                (Ok(v), _) => Some(v),
                (Err(_), MissingValuePolicy::ZeroFillMalformed) => Some(0.),
                (Err(_), MissingValuePolicy::ZeroFill) => None,
            },
            None => match self {
                MissingValuePolicy::ZeroFillMalformed => Some(0.),
                MissingValuePolicy::ZeroFill => None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorLayout {
    pub channels: usize,
    pub hours_per_day: usize,
    pub days_per_month: usize,
    /// Leading columns (date, station, channel name) dropped from training rows.
    pub train_skip_columns: usize,
    /// Leading columns (record id, channel name) dropped from test rows.
    pub test_skip_columns: usize,
    pub hours_per_record: usize,
}

impl Default for SensorLayout {
    fn default() -> Self {
        Self {
            channels: CHANNEL_NAMES.len(),
            hours_per_day: 24,
            days_per_month: 20,
            train_skip_columns: 3,
            test_skip_columns: 2,
            hours_per_record: 9,
        }
    }
}

impl SensorLayout {
    pub fn hours_per_month(&self) -> usize {
        self.hours_per_day * self.days_per_month
    }
}

/// Reads every row of a csv as numbers, dropping `skip` leading columns and expecting
/// exactly `width` values after them.
fn read_rows<R: Read>(
    reader: &mut csv::Reader<R>,
    skip: usize,
    width: usize,
    policy: MissingValuePolicy,
) -> Result<(usize, Vec<f64>)> {
    let mut values = Vec::new();
    let mut rows = 0;

    for record in reader.byte_records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let fields = record.iter().skip(skip).collect::<Vec<_>>();

        if fields.len() != width {
            return Err(Error::shape(
                "hourly readings per row",
                width,
                format!("{} at line {}", fields.len(), line),
            ));
        }

        for (i, field) in fields.into_iter().enumerate() {
            let value = policy.parse(field).ok_or_else(|| Error::MalformedRecord {
                line,
                column: skip + i,
                token: String::from_utf8_lossy(field).into_owned(),
            })?;

            values.push(value);
        }

        rows += 1;
    }

    Ok((rows, values))
}

/// Parses training readings into a `(month, channel, hour-of-month)` tensor.
pub fn read_training<R: Read>(
    reader: R,
    layout: &SensorLayout,
    policy: MissingValuePolicy,
) -> Result<Array3<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let (rows, values) = read_rows(
        &mut reader,
        layout.train_skip_columns,
        layout.hours_per_day,
        policy,
    )?;

    let rows_per_month = layout.days_per_month * layout.channels;

    if rows == 0 || rows % rows_per_month != 0 {
        return Err(Error::shape(
            "training rows",
            format!("a positive multiple of {}", rows_per_month),
            rows,
        ));
    }

    let months = rows / rows_per_month;

    let raw = Array::from_shape_vec(
        (
            months,
            layout.days_per_month,
            layout.channels,
            layout.hours_per_day,
        ),
        values,
    )
    .map_err(|e| Error::shape("training tensor", "(month, day, channel, hour)", e))?;

    // (month, day, channel, hour) -> (month, channel, day, hour), then days are concatenated
    let tensor = raw
        .permuted_axes([0, 2, 1, 3])
        .as_standard_layout()
        .into_owned()
        .into_shape((months, layout.channels, layout.hours_per_month()))
        .map_err(|e| Error::shape("training tensor", "(month, channel, hour)", e))?;

    log::debug!("training tensor shape: {:?}", tensor.shape());

    Ok(tensor)
}

pub fn load_training<P: AsRef<Path>>(
    path: P,
    layout: &SensorLayout,
    policy: MissingValuePolicy,
) -> Result<Array3<f64>> {
    read_training(File::open(path)?, layout, policy)
}

/// Parses test records into a `(record, channel, hour)` tensor.
pub fn read_test<R: Read>(
    reader: R,
    layout: &SensorLayout,
    policy: MissingValuePolicy,
) -> Result<Array3<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let (rows, values) = read_rows(
        &mut reader,
        layout.test_skip_columns,
        layout.hours_per_record,
        policy,
    )?;

    if rows % layout.channels != 0 {
        return Err(Error::shape(
            "test rows",
            format!("a multiple of {}", layout.channels),
            rows,
        ));
    }

    let tensor = Array::from_shape_vec(
        (rows / layout.channels, layout.channels, layout.hours_per_record),
        values,
    )
    .map_err(|e| Error::shape("test tensor", "(record, channel, hour)", e))?;

    log::debug!("test tensor shape: {:?}", tensor.shape());

    Ok(tensor)
}

pub fn load_test<P: AsRef<Path>>(
    path: P,
    layout: &SensorLayout,
    policy: MissingValuePolicy,
) -> Result<Array3<f64>> {
    read_test(File::open(path)?, layout, policy)
}
