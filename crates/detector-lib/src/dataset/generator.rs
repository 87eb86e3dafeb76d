//! Synthetic dataset generation
//!
//! Each record draws a label first, then samples every feature from a
//! class-conditional mixture of integer ranges. Fake accounts get bimodal,
//! extreme distributions; real accounts get wider, smoother ones. A final pass
//! makes a slice of real accounts look suspicious so the two classes overlap.

use crate::error::{DetectorError, Result};
use crate::models::{Dataset, DatasetRecord, FeatureVector, Label};
use rand::distributions::{Bernoulli, Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use std::ops::Range;
use tracing::{debug, info};

/// Share of generated accounts labeled fake
pub const DEFAULT_FAKE_RATE: f64 = 0.3;

/// Standard deviation of the noise added to the engagement ratio
pub const DEFAULT_ENGAGEMENT_NOISE_STD: f64 = 0.01;

/// Decimal places kept on the engagement ratio
const ENGAGEMENT_DECIMALS: i32 = 4;

/// Rates of the real-account overlap pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapConfig {
    /// Fraction of real accounts picked for perturbation
    pub subset_fraction: f64,
    /// Probability that a picked account gets a low post count
    pub low_posts_probability: f64,
    /// Probability that a picked account loses its bio
    pub drop_bio_probability: f64,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            subset_fraction: 0.1,
            low_posts_probability: 0.5,
            drop_bio_probability: 0.3,
        }
    }
}

/// Dataset generator configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorConfig {
    pub fake_rate: f64,
    pub engagement_noise_std: f64,
    pub overlap: OverlapConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            fake_rate: DEFAULT_FAKE_RATE,
            engagement_noise_std: DEFAULT_ENGAGEMENT_NOISE_STD,
            overlap: OverlapConfig::default(),
        }
    }
}

/// Weighted mixture of half-open integer ranges
#[derive(Debug, Clone)]
struct Mixture {
    components: Vec<Range<i64>>,
    index: WeightedIndex<f64>,
}

impl Mixture {
    fn new(components: &[(Range<i64>, f64)]) -> Result<Self> {
        let index = WeightedIndex::new(components.iter().map(|(_, w)| *w))
            .map_err(|e| DetectorError::training(format!("invalid mixture weights: {}", e)))?;
        Ok(Self {
            components: components.iter().map(|(r, _)| r.clone()).collect(),
            index,
        })
    }

    fn uniform(range: Range<i64>) -> Result<Self> {
        Self::new(&[(range, 1.0)])
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let component = &self.components[self.index.sample(rng)];
        rng.gen_range(component.clone()) as f64
    }
}

fn bernoulli(p: f64) -> Result<Bernoulli> {
    Bernoulli::new(p).map_err(|e| DetectorError::training(format!("invalid probability {}: {}", p, e)))
}

/// Per-class feature distributions
#[derive(Debug, Clone)]
struct ClassProfile {
    username_length: Mixture,
    num_posts: Mixture,
    num_followers: Mixture,
    num_following: Mixture,
    account_age_days: Mixture,
    has_profile_picture: Bernoulli,
    has_bio: Bernoulli,
    is_verified: Bernoulli,
}

impl ClassProfile {
    fn fake() -> Result<Self> {
        Ok(Self {
            username_length: Mixture::new(&[(3..8, 0.3), (15..30, 0.7)])?,
            num_posts: Mixture::new(&[(0..10, 0.8), (10..50, 0.2)])?,
            num_followers: Mixture::new(&[(0..100, 0.6), (1000..10000, 0.4)])?,
            num_following: Mixture::uniform(100..5000)?,
            account_age_days: Mixture::new(&[(1..30, 0.7), (30..365, 0.3)])?,
            has_profile_picture: bernoulli(0.4)?,
            has_bio: bernoulli(0.3)?,
            is_verified: bernoulli(0.01)?,
        })
    }

    fn real() -> Result<Self> {
        Ok(Self {
            username_length: Mixture::uniform(5..20)?,
            num_posts: Mixture::new(&[(0..100, 0.4), (100..2000, 0.6)])?,
            num_followers: Mixture::new(&[(10..500, 0.7), (500..5000, 0.25), (5000..50000, 0.05)])?,
            num_following: Mixture::uniform(50..1000)?,
            account_age_days: Mixture::uniform(30..3650)?,
            has_profile_picture: bernoulli(0.8)?,
            has_bio: bernoulli(0.7)?,
            is_verified: bernoulli(0.05)?,
        })
    }

    /// Sample every feature except the derived engagement ratio
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> FeatureVector {
        FeatureVector {
            username_length: self.username_length.sample(rng),
            num_posts: self.num_posts.sample(rng),
            num_followers: self.num_followers.sample(rng),
            num_following: self.num_following.sample(rng),
            account_age_days: self.account_age_days.sample(rng),
            has_profile_picture: flag(self.has_profile_picture.sample(rng)),
            has_bio: flag(self.has_bio.sample(rng)),
            engagement_ratio: 0.0,
            is_verified: flag(self.is_verified.sample(rng)),
        }
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Generates labeled synthetic account data
#[derive(Debug, Clone)]
pub struct DatasetGenerator {
    config: GeneratorConfig,
    label: Bernoulli,
    fake: ClassProfile,
    real: ClassProfile,
    engagement_noise: Normal<f64>,
    low_posts: Bernoulli,
    drop_bio: Bernoulli,
}

impl DatasetGenerator {
    /// Build a generator, rejecting out-of-range probabilities
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.overlap.subset_fraction) {
            return Err(DetectorError::training(format!(
                "overlap subset fraction {} outside [0, 1]",
                config.overlap.subset_fraction
            )));
        }

        let engagement_noise = Normal::new(0.0, config.engagement_noise_std).map_err(|e| {
            DetectorError::training(format!("invalid engagement noise: {}", e))
        })?;

        Ok(Self {
            label: bernoulli(config.fake_rate)?,
            fake: ClassProfile::fake()?,
            real: ClassProfile::real()?,
            engagement_noise,
            low_posts: bernoulli(config.overlap.low_posts_probability)?,
            drop_bio: bernoulli(config.overlap.drop_bio_probability)?,
            config,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate `n` records with a generator seeded from `seed`
    pub fn generate_seeded(&self, n: usize, seed: u64) -> Result<Dataset> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.generate(n, &mut rng)
    }

    /// Generate `n` records drawing all randomness from `rng`
    pub fn generate<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Dataset> {
        if n == 0 {
            return Err(DetectorError::training("dataset size must be positive"));
        }

        let mut dataset = Dataset::new(Vec::with_capacity(n));
        for _ in 0..n {
            dataset.push(self.sample_record(rng));
        }

        let perturbed = self.inject_overlap(&mut dataset, rng);
        debug!(perturbed, "Applied real-account overlap pass");

        info!(
            records = dataset.len(),
            fake = dataset.fake_count(),
            real = dataset.real_count(),
            fake_pct = dataset.fake_fraction() * 100.0,
            "Generated synthetic dataset"
        );

        Ok(dataset)
    }

    fn sample_record<R: Rng + ?Sized>(&self, rng: &mut R) -> DatasetRecord {
        let label = if self.label.sample(rng) {
            Label::Fake
        } else {
            Label::Real
        };

        let profile = match label {
            Label::Fake => &self.fake,
            Label::Real => &self.real,
        };
        let mut features = profile.sample(rng);
        features.engagement_ratio = self.engagement_ratio(&features, rng);

        DatasetRecord { features, label }
    }

    /// Posts per follower (raw post count without followers) plus noise, never negative
    fn engagement_ratio<R: Rng + ?Sized>(&self, features: &FeatureVector, rng: &mut R) -> f64 {
        let ratio = if features.num_followers > 0.0 {
            features.num_posts / features.num_followers
        } else {
            features.num_posts
        };
        let noisy = (ratio + self.engagement_noise.sample(rng)).max(0.0);
        round_to(noisy, ENGAGEMENT_DECIMALS)
    }

    /// Perturb a random subset of real accounts. Picks are drawn with
    /// replacement, so the same account can be hit twice.
    fn inject_overlap<R: Rng + ?Sized>(&self, dataset: &mut Dataset, rng: &mut R) -> usize {
        let real_indices: Vec<usize> = dataset
            .records()
            .iter()
            .enumerate()
            .filter(|(_, r)| r.label == Label::Real)
            .map(|(i, _)| i)
            .collect();

        if real_indices.is_empty() {
            return 0;
        }

        let picks = (self.config.overlap.subset_fraction * real_indices.len() as f64) as usize;
        let records = dataset.records_mut();
        for _ in 0..picks {
            let idx = real_indices[rng.gen_range(0..real_indices.len())];
            let record = &mut records[idx];
            if self.low_posts.sample(rng) {
                record.features.num_posts = rng.gen_range(0..10) as f64;
            }
            if self.drop_bio.sample(rng) {
                record.features.has_bio = 0.0;
            }
        }
        picks
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
