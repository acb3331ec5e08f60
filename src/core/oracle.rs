/// Fixed numeric oracle behind every generator.
///
/// Two affine layers around a ReLU, squashed by a sigmoid and scaled to
/// [0, 10]. Weights are drawn once from a per-kind seed, so a given kind
/// and input always produce the same output. Nothing is trained.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::features::{FeatureVector, FEATURE_LEN};

const HIDDEN: usize = 32;
pub const OUTPUT_SCALE: f32 = 10.0;

/// The generator families, each with its own weights and output width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorKind {
    Mob,
    Item,
    Boss,
    Lore,
    Shop,
    Layout,
    Trap,
    Ui,
    Chapter,
}

impl GeneratorKind {
    pub const ALL: [GeneratorKind; 9] = [
        GeneratorKind::Mob,
        GeneratorKind::Item,
        GeneratorKind::Boss,
        GeneratorKind::Lore,
        GeneratorKind::Shop,
        GeneratorKind::Layout,
        GeneratorKind::Trap,
        GeneratorKind::Ui,
        GeneratorKind::Chapter,
    ];

    pub fn output_len(&self) -> usize {
        match self {
            Self::Mob => 6,
            Self::Item => 4,
            Self::Boss => 3,
            Self::Lore => 1,
            Self::Shop => 5,
            Self::Layout => 3,
            Self::Trap => 2,
            Self::Ui => 3,
            Self::Chapter => 9,
        }
    }

    fn seed(&self) -> u64 {
        0x0A5E_0000 + *self as u64
    }
}

#[derive(Debug, Clone)]
pub struct Oracle {
    kind: GeneratorKind,
    w1: Vec<[f32; FEATURE_LEN]>,
    b1: Vec<f32>,
    w2: Vec<Vec<f32>>,
    b2: Vec<f32>,
}

impl Oracle {
    pub fn new(kind: GeneratorKind) -> Self {
        let mut rng = StdRng::seed_from_u64(kind.seed());
        let mut w1 = Vec::with_capacity(HIDDEN);
        for _ in 0..HIDDEN {
            let mut row = [0.0f32; FEATURE_LEN];
            for w in row.iter_mut() {
                *w = rng.gen_range(-1.0..1.0);
            }
            w1.push(row);
        }
        let b1 = (0..HIDDEN).map(|_| rng.gen_range(-0.1..0.1)).collect();
        let w2 = (0..kind.output_len())
            .map(|_| (0..HIDDEN).map(|_| rng.gen_range(-0.6..0.6)).collect())
            .collect();
        let b2 = (0..kind.output_len()).map(|_| rng.gen_range(-0.1..0.1)).collect();
        Self { kind, w1, b1, w2, b2 }
    }

    pub fn kind(&self) -> GeneratorKind {
        self.kind
    }

    /// Score a feature vector. Every output lies in [0, 10].
    pub fn score(&self, features: &FeatureVector) -> Vec<f32> {
        let input = features.as_slice();
        let hidden: Vec<f32> = self
            .w1
            .iter()
            .zip(&self.b1)
            .map(|(row, bias)| {
                let z: f32 = row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + bias;
                z.max(0.0)
            })
            .collect();

        self.w2
            .iter()
            .zip(&self.b2)
            .map(|(row, bias)| {
                let z: f32 = row.iter().zip(&hidden).map(|(w, h)| w * h).sum::<f32>() + bias;
                let out = sigmoid(z) * OUTPUT_SCALE;
                if out.is_finite() {
                    out.clamp(0.0, OUTPUT_SCALE)
                } else {
                    OUTPUT_SCALE / 2.0
                }
            })
            .collect()
    }
}

fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

/// One oracle per generator kind, built once per content generator.
#[derive(Debug, Clone)]
pub struct OracleSet {
    oracles: Vec<Oracle>,
}

impl Default for OracleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl OracleSet {
    pub fn new() -> Self {
        Self {
            oracles: GeneratorKind::ALL.iter().map(|k| Oracle::new(*k)).collect(),
        }
    }

    pub fn score(&self, kind: GeneratorKind, features: &FeatureVector) -> Vec<f32> {
        match self.oracles.iter().find(|o| o.kind == kind) {
            Some(oracle) => oracle.score(features),
            None => Oracle::new(kind).score(features),
        }
    }

    /// Output `index` of `kind`, or the midpoint if the index is out of range.
    pub fn output(&self, kind: GeneratorKind, features: &FeatureVector, index: usize) -> f32 {
        self.score(kind, features)
            .get(index)
            .copied()
            .unwrap_or(OUTPUT_SCALE / 2.0)
    }
}
