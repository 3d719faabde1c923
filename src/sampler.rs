//! Sampler
//!
//! Strategies for sampling rows: the stratified train/validation split used
//! before fitting candidates, and the bootstrap drawn for every forest tree.
use crate::errors::{Result, RiskError};
use crate::utils::validate_float_parameter;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

// A sampler splits an index into the samples chosen and the samples excluded.
pub trait Sampler {
    /// Sample the data, returning a tuple, where the first item is the samples
    /// chosen for training, and the second are the samples excluded.
    fn sample(&mut self, rng: &mut StdRng, index: &[usize]) -> (Vec<usize>, Vec<usize>);
}

/// Holds out a fraction of every class, so both parts keep the class balance.
pub struct StratifiedSampler<'a> {
    labels: &'a [u8],
    test_fraction: f64,
}

impl<'a> StratifiedSampler<'a> {
    /// Every class present in `labels` needs at least two members.
    pub fn new(labels: &'a [u8], test_fraction: f64) -> Result<Self> {
        validate_float_parameter(test_fraction, 0.0, 0.5, "test_fraction")?;
        for class in [0u8, 1u8] {
            let count = labels.iter().filter(|&&l| l == class).count();
            if count == 1 {
                return Err(RiskError::InsufficientClassMembers(format!(
                    "class {} has a single member",
                    class
                )));
            }
        }
        Ok(StratifiedSampler { labels, test_fraction })
    }
}

impl Sampler for StratifiedSampler<'_> {
    fn sample(&mut self, rng: &mut StdRng, index: &[usize]) -> (Vec<usize>, Vec<usize>) {
        let mut chosen = Vec::with_capacity(index.len());
        let mut excluded = Vec::new();
        for class in [0u8, 1u8] {
            let mut members: Vec<usize> = index.iter().copied().filter(|&i| self.labels[i] == class).collect();
            if members.is_empty() {
                continue;
            }
            members.shuffle(rng);
            let n = members.len();
            let n_test = if n < 2 || self.test_fraction == 0.0 {
                0
            } else {
                ((n as f64 * self.test_fraction).round() as usize).clamp(1, n - 1)
            };
            excluded.extend_from_slice(&members[..n_test]);
            chosen.extend_from_slice(&members[n_test..]);
        }
        chosen.shuffle(rng);
        excluded.shuffle(rng);
        (chosen, excluded)
    }
}

/// Draws `index.len()` rows with replacement; the excluded rows are out of bag.
pub struct BootstrapSampler;

impl Sampler for BootstrapSampler {
    fn sample(&mut self, rng: &mut StdRng, index: &[usize]) -> (Vec<usize>, Vec<usize>) {
        if index.is_empty() {
            return (Vec::new(), Vec::new());
        }
        let mut drawn_mask = vec![false; index.len()];
        let chosen: Vec<usize> = (0..index.len())
            .map(|_| {
                let k = rng.gen_range(0..index.len());
                drawn_mask[k] = true;
                index[k]
            })
            .collect();
        let excluded = index
            .iter()
            .zip(drawn_mask)
            .filter(|(_, drawn)| !drawn)
            .map(|(i, _)| *i)
            .collect();
        (chosen, excluded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_stratified_sampler_keeps_balance() {
        let mut labels = vec![0u8; 80];
        labels.extend(vec![1u8; 20]);
        let index: Vec<usize> = (0..labels.len()).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let mut sampler = StratifiedSampler::new(&labels, 0.2).unwrap();
        let (train, valid) = sampler.sample(&mut rng, &index);

        assert_eq!(train.len(), 80);
        assert_eq!(valid.len(), 20);
        assert_eq!(valid.iter().filter(|&&i| labels[i] == 1).count(), 4);
        assert_eq!(train.iter().filter(|&&i| labels[i] == 1).count(), 16);
        let mut all: Vec<usize> = train.iter().chain(valid.iter()).copied().collect();
        all.sort();
        assert_eq!(all, index);
    }

    #[test]
    fn test_stratified_sampler_is_seeded() {
        let labels: Vec<u8> = (0..50).map(|i| (i % 3 == 0) as u8).collect();
        let index: Vec<usize> = (0..labels.len()).collect();
        let split = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            StratifiedSampler::new(&labels, 0.2).unwrap().sample(&mut rng, &index)
        };
        assert_eq!(split(7), split(7));
    }

    #[test]
    fn test_stratified_sampler_small_class() {
        let labels = vec![0, 0, 0, 0, 1, 1];
        let index: Vec<usize> = (0..labels.len()).collect();
        let mut rng = StdRng::seed_from_u64(0);
        let (_, valid) = StratifiedSampler::new(&labels, 0.2).unwrap().sample(&mut rng, &index);
        assert_eq!(valid.iter().filter(|&&i| labels[i] == 1).count(), 1);

        let single = vec![0, 0, 0, 1];
        assert!(matches!(
            StratifiedSampler::new(&single, 0.2),
            Err(RiskError::InsufficientClassMembers(_))
        ));
    }

    #[test]
    fn test_bootstrap_sampler() {
        let mut rng = StdRng::seed_from_u64(42);
        let index: Vec<usize> = (0..10).collect();
        let (chosen, excluded) = BootstrapSampler.sample(&mut rng, &index);
        assert_eq!(chosen.len(), index.len());
        for i in &excluded {
            assert!(!chosen.contains(i));
        }
        for i in &index {
            assert!(chosen.contains(i) || excluded.contains(i));
        }
    }
}
