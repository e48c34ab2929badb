use serde::Deserialize;

/// Z-score scaler with statistics captured at training time.
///
/// The training job writes the fitted mean and scale per feature; zero
/// variance features already carry a scale of 1.0 in the artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Transforms an input of the trained dimensionality. The bundle loader
    /// verifies the dimensions up front.
    pub fn transform(&self, input: &[f64]) -> Vec<f64> {
        input
            .iter()
            .zip(self.mean.iter())
            .zip(self.scale.iter())
            .map(|((x, mean), scale)| (x - mean) / scale)
            .collect()
    }
}
