use crate::updater::Updater;
use symtensor_core::error::{Error, Result};

/// How a [`Trainer`](crate::Trainer) maps batches onto a graph and updates
/// its parameters.
///
/// Mappings are positional: the `i`-th feature array of a batch is bound to
/// the placeholder named `feature_mapping[i]`, and likewise for labels and
/// masks.
#[derive(Clone, Debug)]
pub struct TrainingConfig {
    updater: Box<dyn Updater>,
    l1: f64,
    l2: f64,
    minimize: bool,
    feature_mapping: Vec<String>,
    label_mapping: Vec<String>,
    feature_mask_mapping: Vec<String>,
    label_mask_mapping: Vec<String>,
    trainable_params: Option<Vec<String>>,
    loss_variables: Vec<String>,
}

impl TrainingConfig {
    pub fn builder() -> TrainingConfigBuilder {
        TrainingConfigBuilder::default()
    }

    pub fn updater(&self) -> &dyn Updater {
        self.updater.as_ref()
    }

    pub fn l1(&self) -> f64 {
        self.l1
    }

    pub fn l2(&self) -> f64 {
        self.l2
    }

    pub fn minimize(&self) -> bool {
        self.minimize
    }

    pub fn feature_mapping(&self) -> &[String] {
        &self.feature_mapping
    }

    pub fn label_mapping(&self) -> &[String] {
        &self.label_mapping
    }

    pub fn feature_mask_mapping(&self) -> &[String] {
        &self.feature_mask_mapping
    }

    pub fn label_mask_mapping(&self) -> &[String] {
        &self.label_mask_mapping
    }

    /// Explicit trainable parameters, if any were configured.
    pub fn trainable_params(&self) -> Option<&[String]> {
        self.trainable_params.as_deref()
    }

    pub fn loss_variables(&self) -> &[String] {
        &self.loss_variables
    }

    /// True if `name` is bound from batch data.
    pub fn is_mapped(&self, name: &str) -> bool {
        [
            &self.feature_mapping,
            &self.label_mapping,
            &self.feature_mask_mapping,
            &self.label_mask_mapping,
        ]
        .iter()
        .any(|names| names.iter().any(|n| n == name))
    }
}

#[derive(Debug)]
pub struct TrainingConfigBuilder {
    updater: Option<Box<dyn Updater>>,
    l1: f64,
    l2: f64,
    minimize: bool,
    feature_mapping: Vec<String>,
    label_mapping: Vec<String>,
    feature_mask_mapping: Vec<String>,
    label_mask_mapping: Vec<String>,
    trainable_params: Option<Vec<String>>,
    loss_variables: Vec<String>,
}

impl Default for TrainingConfigBuilder {
    fn default() -> Self {
        Self {
            updater: None,
            l1: 0.0,
            l2: 0.0,
            minimize: true,
            feature_mapping: Vec::new(),
            label_mapping: Vec::new(),
            feature_mask_mapping: Vec::new(),
            label_mask_mapping: Vec::new(),
            trainable_params: None,
            loss_variables: Vec::new(),
        }
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

impl TrainingConfigBuilder {
    pub fn updater(mut self, updater: impl Updater + 'static) -> Self {
        self.updater = Some(Box::new(updater));
        self
    }

    pub fn l1(mut self, l1: f64) -> Self {
        self.l1 = l1;
        self
    }

    pub fn l2(mut self, l2: f64) -> Self {
        self.l2 = l2;
        self
    }

    pub fn minimize(mut self, minimize: bool) -> Self {
        self.minimize = minimize;
        self
    }

    pub fn feature_mapping(mut self, names: &[&str]) -> Self {
        self.feature_mapping = owned(names);
        self
    }

    pub fn label_mapping(mut self, names: &[&str]) -> Self {
        self.label_mapping = owned(names);
        self
    }

    pub fn feature_mask_mapping(mut self, names: &[&str]) -> Self {
        self.feature_mask_mapping = owned(names);
        self
    }

    pub fn label_mask_mapping(mut self, names: &[&str]) -> Self {
        self.label_mask_mapping = owned(names);
        self
    }

    pub fn trainable_params(mut self, names: &[&str]) -> Self {
        self.trainable_params = Some(owned(names));
        self
    }

    pub fn loss_variables(mut self, names: &[&str]) -> Self {
        self.loss_variables = owned(names);
        self
    }

    pub fn build(self) -> Result<TrainingConfig> {
        let updater = self
            .updater
            .ok_or_else(|| Error::Configuration("no updater was configured".to_string()))?;
        if self.feature_mapping.is_empty() {
            return Err(Error::Configuration(
                "no feature placeholders were configured".to_string(),
            ));
        }
        if self.l1 < 0.0 || self.l2 < 0.0 {
            return Err(Error::Configuration(format!(
                "regularization coefficients must be non-negative, got l1 = {} and l2 = {}",
                self.l1, self.l2
            )));
        }

        Ok(TrainingConfig {
            updater,
            l1: self.l1,
            l2: self.l2,
            minimize: self.minimize,
            feature_mapping: self.feature_mapping,
            label_mapping: self.label_mapping,
            feature_mask_mapping: self.feature_mask_mapping,
            label_mask_mapping: self.label_mask_mapping,
            trainable_params: self.trainable_params,
            loss_variables: self.loss_variables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updaters::Sgd;

    #[test]
    fn defaults() -> Result<()> {
        let config = TrainingConfig::builder()
            .updater(Sgd::new(0.1))
            .feature_mapping(&["x"])
            .label_mapping(&["y"])
            .build()?;

        assert!(config.minimize());
        assert_eq!((config.l1(), config.l2()), (0.0, 0.0));
        assert!(config.trainable_params().is_none());
        assert!(config.is_mapped("y"));
        assert!(!config.is_mapped("w"));
        Ok(())
    }

    #[test]
    fn missing_pieces() {
        let no_updater = TrainingConfig::builder().feature_mapping(&["x"]).build();
        assert!(matches!(no_updater, Err(Error::Configuration(_))));

        let no_features = TrainingConfig::builder().updater(Sgd::new(0.1)).build();
        assert!(matches!(no_features, Err(Error::Configuration(_))));

        let negative = TrainingConfig::builder()
            .updater(Sgd::new(0.1))
            .feature_mapping(&["x"])
            .l2(-1.0)
            .build();
        assert!(matches!(negative, Err(Error::Configuration(_))));
    }
}
