//! Flat `key=value` model file.
//!
//! ```text
//! w_1=0.25
//! ...
//! w_189=-1.5
//! b=3.75
//! min_1=0
//! ...
//! max_189=10000
//! ```
//!
//! Keys are 1-based. Lines are looked up by key, so their order does not matter.
//! The `min_*`/`max_*` normalization bounds are optional; files written without them
//! still load, with `scaler` set to `None`.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::Array1;

use crate::error::{Error, Result};
use crate::model::LinearModel;
use crate::normalizer::MinMaxScaler;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelFile {
    pub model: LinearModel,
    pub scaler: Option<MinMaxScaler>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Key {
    Weight(usize),
    Bias,
    Min(usize),
    Max(usize),
}

fn parse_key(key: &str) -> Option<Key> {
    let indexed = |prefix: &str, make: fn(usize) -> Key| {
        key.strip_prefix(prefix)
            .and_then(|i| i.parse::<usize>().ok())
            .filter(|&i| i > 0)
            .map(|i| make(i - 1))
    };

    match key {
        "b" => Some(Key::Bias),
        _ => indexed("w_", Key::Weight)
            .or_else(|| indexed("min_", Key::Min))
            .or_else(|| indexed("max_", Key::Max)),
    }
}

pub fn write_model<W: Write>(
    mut writer: W,
    model: &LinearModel,
    scaler: Option<&MinMaxScaler>,
) -> Result<()> {
    for (i, w) in model.weights.iter().enumerate() {
        writeln!(writer, "w_{}={}", i + 1, w)?;
    }

    writeln!(writer, "b={}", model.bias)?;

    if let Some(scaler) = scaler {
        if scaler.len() != model.feature_count() {
            return Err(Error::shape(
                "scaler columns",
                model.feature_count(),
                scaler.len(),
            ));
        }

        for (i, min) in scaler.min.iter().enumerate() {
            writeln!(writer, "min_{}={}", i + 1, min)?;
        }

        for (i, max) in scaler.max.iter().enumerate() {
            writeln!(writer, "max_{}={}", i + 1, max)?;
        }
    }

    writer.flush()?;

    Ok(())
}

pub fn save_model<P: AsRef<Path>>(
    path: P,
    model: &LinearModel,
    scaler: Option<&MinMaxScaler>,
) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_model(BufWriter::new(file), model, scaler)?;

    log::info!("model saved to {}", path.as_ref().display());

    Ok(())
}

/// Turns `{index: value}` into a vector, requiring every index below the largest one.
fn dense(values: &BTreeMap<usize, f64>, name: &str) -> Result<Array1<f64>> {
    if let Some((missing, _)) = values
        .keys()
        .enumerate()
        .find(|&(expected, &found)| expected != found)
    {
        return Err(Error::IncompleteModel(format!(
            "{}_{} is missing",
            name,
            missing + 1
        )));
    }

    Ok(values.values().copied().collect())
}

pub fn read_model<R: BufRead>(reader: R) -> Result<ModelFile> {
    let mut entries: BTreeMap<Key, f64> = BTreeMap::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = i + 1;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let malformed = |reason: String| Error::MalformedModel {
            line: line_no,
            reason,
        };

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| malformed(format!("{:?} is not a key=value pair", line)))?;

        let key = parse_key(key.trim()).ok_or_else(|| malformed(format!("unknown key {:?}", key)))?;
        let value = value
            .trim()
            .parse::<f64>()
            .map_err(|e| malformed(format!("bad value {:?}: {}", value, e)))?;

        match entries.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
            Entry::Occupied(_) => return Err(malformed(format!("duplicate key {:?}", key))),
        }
    }

    let mut weights = BTreeMap::new();
    let mut mins = BTreeMap::new();
    let mut maxs = BTreeMap::new();
    let mut bias = None;

    for (key, value) in entries {
        match key {
            Key::Weight(i) => {
                weights.insert(i, value);
            }
            Key::Min(i) => {
                mins.insert(i, value);
            }
            Key::Max(i) => {
                maxs.insert(i, value);
            }
            Key::Bias => bias = Some(value),
        }
    }

    let bias = bias.ok_or_else(|| Error::IncompleteModel("b is missing".into()))?;

    let model = LinearModel::new(dense(&weights, "w")?, bias);

    let scaler = if mins.is_empty() && maxs.is_empty() {
        None
    } else {
        let (min, max) = (dense(&mins, "min")?, dense(&maxs, "max")?);

        if min.len() != model.feature_count() || max.len() != model.feature_count() {
            return Err(Error::IncompleteModel(format!(
                "{} weights but {} min and {} max bounds",
                model.feature_count(),
                min.len(),
                max.len()
            )));
        }

        Some(MinMaxScaler::from_parts(min, max)?)
    };

    Ok(ModelFile { model, scaler })
}

pub fn load_model<P: AsRef<Path>>(path: P) -> Result<ModelFile> {
    let file = File::open(path.as_ref())?;
    let model_file = read_model(BufReader::new(file))?;

    log::info!(
        "model with {} weights loaded from {}",
        model_file.model.feature_count(),
        path.as_ref().display()
    );

    Ok(model_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn to_string(model: &LinearModel, scaler: Option<&MinMaxScaler>) -> String {
        let mut buf = Vec::new();
        write_model(&mut buf, model, scaler).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn writes_weights_then_bias() {
        let text = to_string(&LinearModel::new(array![1.5, -2.], 0.25), None);

        assert_eq!(text, "w_1=1.5\nw_2=-2\nb=0.25\n");
    }

    #[test]
    fn round_trip_is_exact() {
        let model = LinearModel::new(
            array![1. / 3., -1e-300, f64::MAX, f64::MIN_POSITIVE, 0.1 + 0.2, -0.],
            std::f64::consts::PI,
        );
        let scaler = MinMaxScaler::from_parts(
            array![0., 1e-20, -5.5, 2., 7., 0.],
            array![1., 2e-20, 5.5, 2., 1e10, 0.],
        )
        .unwrap();

        let text = to_string(&model, Some(&scaler));
        let loaded = read_model(text.as_bytes()).unwrap();

        assert_eq!(loaded.model, model);
        assert_eq!(loaded.scaler, Some(scaler));
        for (a, b) in loaded.model.weights.iter().zip(model.weights.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn line_order_does_not_matter() {
        let model = LinearModel::new(array![1., 2., 3.], -4.);
        let scaler = MinMaxScaler::from_parts(array![0., 0., 0.], array![1., 2., 3.]).unwrap();

        let text = to_string(&model, Some(&scaler));
        let mut lines = text.lines().collect::<Vec<_>>();
        lines.reverse();
        lines.swap(0, 4);

        let loaded = read_model(lines.join("\n").as_bytes()).unwrap();

        assert_eq!(loaded.model, model);
        assert_eq!(loaded.scaler, Some(scaler));
    }

    #[test]
    fn bounds_are_optional() {
        let loaded = read_model("w_1=2\n\nb=1\n".as_bytes()).unwrap();

        assert_eq!(loaded.model, LinearModel::new(array![2.], 1.));
        assert_eq!(loaded.scaler, None);
    }

    #[test]
    fn rejects_malformed_lines() {
        let cases = [
            "w_1=1\nw_1=2\nb=0\n",
            "w_1=1\nbias=0\n",
            "w_1=one\nb=0\n",
            "w_0=1\nb=0\n",
            "w_1\nb=0\n",
        ];

        for case in cases {
            assert!(
                matches!(read_model(case.as_bytes()), Err(Error::MalformedModel { .. })),
                "accepted {:?}",
                case
            );
        }
    }

    #[test]
    fn rejects_incomplete_files() {
        let cases = [
            "w_1=1\nw_3=2\nb=0\n",
            "w_1=1\n",
            "w_1=1\nb=0\nmin_1=0\n",
            "w_1=1\nb=0\nmin_1=0\nmin_2=0\nmax_1=1\nmax_2=1\n",
        ];

        for case in cases {
            assert!(
                matches!(read_model(case.as_bytes()), Err(Error::IncompleteModel(_))),
                "accepted {:?}",
                case
            );
        }
    }

    #[test]
    fn missing_keys_are_not_blamed_on_a_line() {
        let err = read_model("w_1=1\nw_3=2\nb=0\n".as_bytes()).unwrap_err();

        assert_eq!(err.to_string(), "incomplete model file: w_2 is missing");
    }

    #[test]
    fn bad_lines_report_their_number() {
        let err = read_model("w_1=1\n\nw_2=x\nb=0\n".as_bytes()).unwrap_err();

        assert!(matches!(err, Error::MalformedModel { line: 3, .. }));
    }

    #[test]
    fn refuses_to_write_mismatched_bounds() {
        let model = LinearModel::new(array![1., 2.], 0.);
        let scaler = MinMaxScaler::from_parts(array![0.], array![1.]).unwrap();

        assert!(write_model(Vec::new(), &model, Some(&scaler)).is_err());
    }
}
