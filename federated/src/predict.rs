use std::io::{BufRead, Write};

use machine_learning::{
    arch::Model,
    preprocessing::{LabelEncoder, StandardScaler},
};

use crate::{FederatedErr, Result};

/// The message shown when a value isn't a number.
pub const INVALID_INPUT: &str = "Invalid input! Please provide numerical values for all fields.";

/// Predicts the class of raw samples with a trained model, preprocessing them the same way
/// the training samples were.
pub struct Predictor<M: Model> {
    model: M,
    scaler: StandardScaler,
    encoder: LabelEncoder,
    feature_names: Vec<String>,
    label_name: String,
}

impl<M: Model> Predictor<M> {
    /// Creates a new `Predictor`. The model is set in evaluation mode.
    pub fn new(
        mut model: M,
        scaler: StandardScaler,
        encoder: LabelEncoder,
        feature_names: Vec<String>,
        label_name: String,
    ) -> Self {
        model.eval_mode();

        Self {
            model,
            scaler,
            encoder,
            feature_names,
            label_name,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Predicts the label of a single raw sample.
    pub fn predict(&mut self, sample: &[f32]) -> Result<String> {
        if sample.len() != self.feature_names.len() {
            return Err(FederatedErr::Configuration(format!(
                "expected {} features, got {}",
                self.feature_names.len(),
                sample.len()
            )));
        }

        let x = self.scaler.transform_row(sample)?;
        let class = self
            .model
            .predict(x.view())?
            .first()
            .copied()
            .ok_or_else(|| FederatedErr::Configuration("the model predicted nothing".into()))?;

        Ok(self.encoder.decode(class)?.to_string())
    }

    /// Asks for every feature on `output` and reads their values from `input`, starting
    /// over whenever a value isn't a number.
    ///
    /// # Returns
    /// The predicted label, or `None` if `input` ended first.
    pub fn prompt<R, W>(&mut self, input: &mut R, output: &mut W) -> Result<Option<String>>
    where
        R: BufRead,
        W: Write,
    {
        writeln!(
            output,
            "\nEnter the following details to predict {}:",
            self.label_name
        )?;

        'sample: loop {
            let mut sample = Vec::with_capacity(self.feature_names.len());

            for name in &self.feature_names {
                write!(output, "{name}: ")?;
                output.flush()?;

                let mut line = String::new();
                if input.read_line(&mut line)? == 0 {
                    return Ok(None);
                }

                match line.trim().parse::<f32>() {
                    Ok(value) if value.is_finite() => sample.push(value),
                    _ => {
                        writeln!(output, "{INVALID_INPUT}")?;
                        continue 'sample;
                    }
                }
            }

            let label = self.predict(&sample)?;
            writeln!(output, "\nPredicted {}: {label}", self.label_name)?;
            return Ok(Some(label));
        }
    }
}
