//! Rolling feature derivation over the recent gas readings.
//!
//! The window holds the last `WINDOW_CAPACITY` raw MQ values; every incoming
//! sample is appended first and the nine features are derived from the
//! post-append window. The classifier and outlier model were trained on
//! exactly this feature set, in the order recorded in the model bundle.

use crate::state::SensorSample;
use std::collections::VecDeque;

pub const WINDOW_CAPACITY: usize = 10;

/// Guards the `gas_diff_norm` division when `mq == 0`.
const GAS_DIFF_EPSILON: f64 = 1e-5;

pub const FEATURE_NAMES: [&str; 9] = [
    "gas_norm",
    "rolling_mean_10",
    "rolling_std_10",
    "gas_diff",
    "gas_diff_norm",
    "hum_adjusted_gas",
    "temp_hum",
    "temp_gas",
    "hum_gas",
];

/// Bounded FIFO buffer of recent raw MQ readings. Length never exceeds
/// `WINDOW_CAPACITY`; the oldest value is evicted on overflow.
#[derive(Debug, Clone, Default)]
pub struct GasWindow {
    values: VecDeque<f64>,
}

impl GasWindow {
    pub fn new() -> Self {
        Self {
            values: VecDeque::with_capacity(WINDOW_CAPACITY),
        }
    }

    pub fn push(&mut self, mq: f64) {
        if self.values.len() == WINDOW_CAPACITY {
            self.values.pop_front();
        }
        self.values.push_back(mq);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Population standard deviation (divide by N, not N-1), matching the
    /// statistics the models were trained against.
    fn population_std(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .values
            .iter()
            .map(|v| {
                let d = v - mean;
                d * d
            })
            .sum::<f64>()
            / self.values.len() as f64;
        variance.sqrt()
    }

    /// Difference between the two most recent values, 0.0 with fewer than two.
    fn last_diff(&self) -> f64 {
        let len = self.values.len();
        if len < 2 {
            return 0.0;
        }
        self.values[len - 1] - self.values[len - 2]
    }
}

/// The fixed nine-feature representation consumed by both models. Ephemeral:
/// created per sample and discarded after the record is sunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub gas_norm: f64,
    pub rolling_mean_10: f64,
    pub rolling_std_10: f64,
    pub gas_diff: f64,
    pub gas_diff_norm: f64,
    pub hum_adjusted_gas: f64,
    pub temp_hum: f64,
    pub temp_gas: f64,
    pub hum_gas: f64,
}

impl FeatureVector {
    /// Looks a feature up by its trained name. Model input assembly goes
    /// through this so the bundle's recorded feature order decides the
    /// layout, not this struct.
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "gas_norm" => Some(self.gas_norm),
            "rolling_mean_10" => Some(self.rolling_mean_10),
            "rolling_std_10" => Some(self.rolling_std_10),
            "gas_diff" => Some(self.gas_diff),
            "gas_diff_norm" => Some(self.gas_diff_norm),
            "hum_adjusted_gas" => Some(self.hum_adjusted_gas),
            "temp_hum" => Some(self.temp_hum),
            "temp_gas" => Some(self.temp_gas),
            "hum_gas" => Some(self.hum_gas),
            _ => None,
        }
    }

    /// All nine features with their names, in the canonical order.
    pub fn named(&self) -> [(&'static str, f64); 9] {
        [
            ("gas_norm", self.gas_norm),
            ("rolling_mean_10", self.rolling_mean_10),
            ("rolling_std_10", self.rolling_std_10),
            ("gas_diff", self.gas_diff),
            ("gas_diff_norm", self.gas_diff_norm),
            ("hum_adjusted_gas", self.hum_adjusted_gas),
            ("temp_hum", self.temp_hum),
            ("temp_gas", self.temp_gas),
            ("hum_gas", self.hum_gas),
        ]
    }
}

/// Appends `sample.mq` to the window (evicting the oldest value beyond
/// capacity) and derives the feature vector from the post-append window.
pub fn extract(window: &mut GasWindow, sample: &SensorSample) -> FeatureVector {
    window.push(sample.mq);

    let rolling_mean = window.mean();
    let rolling_std = window.population_std();
    let gas_diff = window.last_diff();

    FeatureVector {
        gas_norm: sample.mq / (sample.temp * sample.hum + 1.0),
        rolling_mean_10: rolling_mean,
        rolling_std_10: rolling_std,
        gas_diff,
        gas_diff_norm: gas_diff / (sample.mq + GAS_DIFF_EPSILON),
        hum_adjusted_gas: sample.mq * (1.0 + sample.hum / 100.0),
        temp_hum: sample.temp * sample.hum,
        temp_gas: sample.temp * sample.mq,
        hum_gas: sample.hum * sample.mq,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(temp: f64, hum: f64, mq: f64) -> SensorSample {
        SensorSample { temp, hum, mq }
    }

    #[test]
    fn window_never_exceeds_capacity_and_evicts_fifo() {
        let mut window = GasWindow::new();
        for i in 0..15 {
            window.push(i as f64);
            assert!(window.len() <= WINDOW_CAPACITY);
        }

        assert_eq!(window.len(), WINDOW_CAPACITY);
        let values: Vec<f64> = window.values().collect();
        assert_eq!(
            values,
            vec![5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0]
        );
    }

    #[test]
    fn first_sample_has_zero_diff_and_zero_std() {
        let mut window = GasWindow::new();

        let features = extract(&mut window, &sample(25.0, 60.0, 200.0));

        assert_eq!(features.gas_diff, 0.0);
        assert_eq!(features.gas_diff_norm, 0.0);
        assert_eq!(features.rolling_std_10, 0.0);
        assert_eq!(features.rolling_mean_10, 200.0);
        assert_eq!(features.gas_norm, 200.0 / 1501.0);
    }

    #[test]
    fn second_sample_diff_and_mean() {
        let mut window = GasWindow::new();
        let _ = extract(&mut window, &sample(25.0, 60.0, 200.0));

        let features = extract(&mut window, &sample(25.0, 60.0, 210.0));

        assert_eq!(features.gas_diff, 10.0);
        assert_eq!(features.rolling_mean_10, 205.0);
        assert_eq!(features.gas_diff_norm, 10.0 / (210.0 + 1e-5));
    }

    #[test]
    fn identical_values_have_zero_std() {
        let mut window = GasWindow::new();
        for _ in 0..WINDOW_CAPACITY {
            window.push(42.0);
        }

        let features = extract(&mut window, &sample(20.0, 50.0, 42.0));

        assert_eq!(features.rolling_std_10, 0.0);
        assert_eq!(features.rolling_mean_10, 42.0);
    }

    #[test]
    fn population_std_divides_by_n() {
        let mut window = GasWindow::new();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            window.push(v);
        }

        // mean 5, population variance 4
        assert_eq!(window.mean(), 5.0);
        assert_eq!(window.population_std(), 2.0);
    }

    #[test]
    fn zero_mq_is_guarded_by_epsilon() {
        let mut window = GasWindow::new();
        let _ = extract(&mut window, &sample(25.0, 60.0, 100.0));

        let features = extract(&mut window, &sample(25.0, 60.0, 0.0));

        assert!(features.gas_diff_norm.is_finite());
        assert_eq!(features.gas_diff, -100.0);
        assert_eq!(features.gas_diff_norm, -100.0 / 1e-5);
    }

    #[test]
    fn all_nine_features_are_present_and_finite() {
        let mut window = GasWindow::new();
        let features = extract(&mut window, &sample(25.0, 60.0, 200.0));

        let named = features.named();
        assert_eq!(named.len(), FEATURE_NAMES.len());
        for ((name, value), expected_name) in named.iter().zip(FEATURE_NAMES.iter()) {
            assert_eq!(name, expected_name);
            assert!(value.is_finite(), "feature {name} not finite");
        }
        for name in FEATURE_NAMES {
            assert!(features.get(name).is_some(), "missing feature {name}");
        }
        assert_eq!(features.get("unknown_feature"), None);
    }

    #[test]
    fn window_of_ten_tracks_rolling_statistics_after_eviction() {
        let mut window = GasWindow::new();
        // Fill past capacity so the first two values are evicted.
        for mq in 0..12 {
            let _ = extract(&mut window, &sample(25.0, 60.0, 100.0 + mq as f64));
        }

        // Window now holds 102..=111, mean 106.5.
        let features = extract(&mut window, &sample(25.0, 60.0, 112.0));
        // Window now holds 103..=112, mean 107.5.
        assert_eq!(features.rolling_mean_10, 107.5);
        assert_eq!(features.gas_diff, 1.0);
    }
}
