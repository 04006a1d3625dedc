use crate::{MlErr, Result};

/// A `ParamGen` generates values for the initial state of the model's parameters.
pub trait ParamGen {
    /// Should sample at most `n` parameters.
    ///
    /// # Arguments
    /// * `n` - The upper limit of samples to generate.
    ///
    /// # Returns
    /// An option whether the generator is exhausted.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;

    /// Fills the entire `out` buffer with generated values.
    ///
    /// # Arguments
    /// * `out` - The buffer to write the samples to.
    ///
    /// # Returns
    /// An error if the generator got exhausted before filling the buffer.
    fn fill(&mut self, out: &mut [f32]) -> Result<()> {
        let mut filled = 0;

        while filled < out.len() {
            let Some(sample) = self.sample(out.len() - filled) else {
                return Err(MlErr::SizeMismatch {
                    what: "generated parameters",
                    got: filled,
                    expected: out.len(),
                });
            };

            out[filled..filled + sample.len()].copy_from_slice(&sample);
            filled += sample.len();
        }

        Ok(())
    }
}
