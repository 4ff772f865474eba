//! Sliding-window features.
//!
//! Every row is `[raw | raw² | cross]` where `raw` holds the selected channels'
//! readings over the window (channel-major), and `cross` is the element-wise product
//! of two selected channels over the same window.

use itertools::iproduct;
use ndarray::{Array1, Array2, Array3, ArrayView2};

use crate::dataset::CHANNEL_NAMES;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    /// Hours per window.
    pub window: usize,
    /// Channel indices taken into the window.
    pub channels: Vec<usize>,
    /// Channel predicted `window` hours after the window start.
    pub target_channel: usize,
    /// Positions within `channels` multiplied together.
    pub cross_pair: (usize, usize),
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            window: 9,
            channels: vec![2, 7, 8, 9, 10, 12, 14, 15, 16, 17],
            target_channel: 9,
            // O3 x PM2.5
            cross_pair: (1, 3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig) -> Result<Self> {
        if config.window == 0 {
            return Err(Error::InvalidConfig("window must span at least one hour".into()));
        }

        if config.channels.is_empty() {
            return Err(Error::InvalidConfig("no channels selected".into()));
        }

        let (a, b) = config.cross_pair;
        if a >= config.channels.len() || b >= config.channels.len() {
            return Err(Error::InvalidConfig(format!(
                "cross pair {:?} outside of {} selected channels",
                config.cross_pair,
                config.channels.len()
            )));
        }

        Ok(Self { config })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn feature_count(&self) -> usize {
        2 * self.config.channels.len() * self.config.window + self.config.window
    }

    /// Human readable column names, mostly for logging the fitted weights.
    pub fn feature_names(&self) -> Vec<String> {
        let name = |c: usize| {
            CHANNEL_NAMES
                .get(c)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("ch{}", c))
        };
        let window = self.config.window;

        let raw = iproduct!(self.config.channels.iter(), 0..window)
            .map(|(&c, t)| format!("{}[t-{}]", name(c), window - t))
            .collect::<Vec<_>>();

        let (a, b) = self.cross_channels();

        raw.iter()
            .cloned()
            .chain(raw.iter().map(|n| format!("{}^2", n)))
            .chain((0..window).map(|t| format!("{}*{}[t-{}]", name(a), name(b), window - t)))
            .collect()
    }

    fn cross_channels(&self) -> (usize, usize) {
        let (a, b) = self.config.cross_pair;
        (self.config.channels[a], self.config.channels[b])
    }

    fn check_channels(&self, available: usize, with_target: bool) -> Result<()> {
        let max_selected = self.config.channels.iter().copied().max().unwrap_or_default();
        let max_needed = if with_target {
            max_selected.max(self.config.target_channel)
        } else {
            max_selected
        };

        if max_needed >= available {
            return Err(Error::shape(
                "channel count",
                format!("more than {}", max_needed),
                available,
            ));
        }

        Ok(())
    }

    fn push_row(&self, series: ArrayView2<f64>, start: usize, row: &mut Vec<f64>) {
        let end = start + self.config.window;

        let raw = iproduct!(self.config.channels.iter(), start..end)
            .map(|(&c, t)| series[[c, t]])
            .collect::<Vec<_>>();

        let (a, b) = self.cross_channels();
        let cross = (start..end).map(|t| series[[a, t]] * series[[b, t]]);

        row.extend(
            raw.iter()
                .copied()
                .chain(raw.iter().map(|x| x * x))
                .chain(cross),
        );
    }

    /// One row per window start in `[0, hours - window)` of every month, labeled with
    /// the target channel right after the window.
    pub fn build_training(&self, tensor: &Array3<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
        let (months, channels, hours) = tensor.dim();
        let window = self.config.window;

        self.check_channels(channels, true)?;

        if hours <= window {
            return Err(Error::shape(
                "hours per month",
                format!("more than {}", window),
                hours,
            ));
        }

        let per_month = hours - window;
        let mut features = Vec::with_capacity(months * per_month * self.feature_count());
        let mut labels = Vec::with_capacity(months * per_month);

        for month in tensor.outer_iter() {
            for start in 0..per_month {
                self.push_row(month, start, &mut features);
                labels.push(month[[self.config.target_channel, start + window]]);
            }
        }

        let features = Array2::from_shape_vec((labels.len(), self.feature_count()), features)
            .map_err(|e| Error::shape("feature matrix", "(window, feature)", e))?;

        log::debug!("training features shape: {:?}", features.dim());

        Ok((features, Array1::from_vec(labels)))
    }

    /// One row per record, taken from the record's last `window` hours.
    pub fn build_inference(&self, records: &Array3<f64>) -> Result<Array2<f64>> {
        let (n, channels, hours) = records.dim();
        let window = self.config.window;

        self.check_channels(channels, false)?;

        if hours < window {
            return Err(Error::shape(
                "hours per record",
                format!("at least {}", window),
                hours,
            ));
        }

        let mut features = Vec::with_capacity(n * self.feature_count());

        for record in records.outer_iter() {
            self.push_row(record, hours - window, &mut features);
        }

        let features = Array2::from_shape_vec((n, self.feature_count()), features)
            .map_err(|e| Error::shape("feature matrix", "(record, feature)", e))?;

        log::debug!("inference features shape: {:?}", features.dim());

        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::s;

    #[test]
    fn full_year_yields_5652_rows_of_189_features() {
        let builder = FeatureBuilder::new(FeatureConfig::default()).unwrap();
        let tensor = Array3::<f64>::zeros((12, 18, 480));

        let (features, labels) = builder.build_training(&tensor).unwrap();

        assert_eq!(builder.feature_count(), 189);
        assert_eq!(features.dim(), (5652, 189));
        assert_eq!(labels.len(), 5652);
        assert_eq!(builder.feature_names().len(), 189);
    }

    fn tiny_builder() -> FeatureBuilder {
        FeatureBuilder::new(FeatureConfig {
            window: 2,
            channels: vec![0, 2],
            target_channel: 1,
            cross_pair: (0, 1),
        })
        .unwrap()
    }

    /// value = channel * 10 + hour
    fn tiny_tensor() -> Array3<f64> {
        Array3::from_shape_fn((1, 3, 4), |(_, c, h)| (c * 10 + h) as f64)
    }

    #[test]
    fn rows_are_raw_then_squared_then_cross() {
        let (features, labels) = tiny_builder().build_training(&tiny_tensor()).unwrap();

        assert_eq!(features.dim(), (2, 10));

        let raw = [1., 2., 21., 22.];
        let expected = raw
            .iter()
            .copied()
            .chain(raw.iter().map(|x| x * x))
            .chain([1. * 21., 2. * 22.])
            .collect::<Vec<_>>();

        assert_eq!(features.row(1).to_vec(), expected);
        assert_eq!(labels.to_vec(), vec![12., 13.]);
    }

    #[test]
    fn inference_uses_the_last_hours_of_a_record() {
        let builder = tiny_builder();
        let records = tiny_tensor().slice(s![.., .., ..3]).to_owned();

        let features = builder.build_inference(&records).unwrap();
        let (training, _) = builder.build_training(&tiny_tensor()).unwrap();

        assert_eq!(features.dim(), (1, 10));
        assert_eq!(features.row(0), training.row(1));
        assert_eq!(features[[0, 0]], 1.);
    }

    #[test]
    fn rejects_missing_channels_and_short_series() {
        let builder = FeatureBuilder::new(FeatureConfig::default()).unwrap();

        let too_few_channels = Array3::<f64>::zeros((1, 9, 480));
        assert!(matches!(
            builder.build_training(&too_few_channels),
            Err(Error::ShapeMismatch { .. })
        ));

        let too_short = Array3::<f64>::zeros((1, 18, 9));
        assert!(matches!(
            builder.build_training(&too_short),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(builder.build_inference(&too_short).is_ok());
    }

    #[test]
    fn rejects_cross_pair_outside_selection() {
        let config = FeatureConfig {
            cross_pair: (0, 10),
            ..FeatureConfig::default()
        };

        assert!(matches!(
            FeatureBuilder::new(config),
            Err(Error::InvalidConfig(_))
        ));
    }
}
