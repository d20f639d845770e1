use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const KERNEL_SPREAD: f32 = 0.2;
const BIAS_SPREAD: f32 = 0.1;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyntheticWeights {
    pub kernel: Vec<f32>,
    pub bias: Vec<f32>,
}

/// Seeded source of placeholder weights for layers whose real values could
/// not be recovered.
pub struct SyntheticGenerator {
    rng: ChaCha8Rng,
    max_kernel: usize,
    max_bias: usize,
}

impl SyntheticGenerator {
    pub fn new(seed: u64, max_kernel: usize, max_bias: usize) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            max_kernel,
            max_bias,
        }
    }

    /// Kernel values uniform in ±0.1, one per parameter up to the cap; bias
    /// values uniform in ±0.05, one per output unit up to the cap. No bias is
    /// produced when the output dimension is unknown.
    pub fn generate(&mut self, num_parameters: u64, out_dim: Option<usize>) -> SyntheticWeights {
        let kernel_len = usize::try_from(num_parameters).unwrap_or(usize::MAX).min(self.max_kernel);
        let bias_len = out_dim.unwrap_or(0).min(self.max_bias);

        SyntheticWeights {
            kernel: self.uniform(kernel_len, KERNEL_SPREAD),
            bias: self.uniform(bias_len, BIAS_SPREAD),
        }
    }

    fn uniform(&mut self, len: usize, spread: f32) -> Vec<f32> {
        (0..len).map(|_| (self.rng.gen::<f32>() - 0.5) * spread).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caps_and_ranges() {
        let mut gen = SyntheticGenerator::new(42, 10_000, 1_000);

        let w = gen.generate(100_480, Some(128));

        assert_eq!(w.kernel.len(), 10_000);
        assert_eq!(w.bias.len(), 128);
        assert!(w.kernel.iter().all(|v| (-0.1..=0.1).contains(v)));
        assert!(w.bias.iter().all(|v| (-0.05..=0.05).contains(v)));

        let big = gen.generate(10, Some(5_000));
        assert_eq!(big.kernel.len(), 10);
        assert_eq!(big.bias.len(), 1_000);
    }

    #[test]
    fn test_unknown_output_dim_skips_bias() {
        let mut gen = SyntheticGenerator::new(1, 100, 100);
        let w = gen.generate(12, None);
        assert_eq!(w.kernel.len(), 12);
        assert!(w.bias.is_empty());
    }

    #[test]
    fn test_same_seed_same_values() {
        let a = SyntheticGenerator::new(7, 50, 50).generate(50, Some(5));
        let b = SyntheticGenerator::new(7, 50, 50).generate(50, Some(5));
        assert_eq!(a, b);
    }
}
