//! # 파라미터 초기화 필러
//!
//! 설정(`FillerParameter`)에 따라 센터 행렬을 채우는 전략들입니다.
//! `seed` 가 주어지면 같은 값을 재현하고, 없으면 엔트로피로 시드합니다.

use ndarray::Array2;
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{FillerParameter, VarianceNorm};
use crate::error::{LossError, Result};

pub trait Filler: Send + Sync {
    fn fill(&self, blob: &mut Array2<f32>);
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

fn require_finite(filler: &str, field: &str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(LossError::Configuration(format!(
            "{} filler needs a finite {}, got {}",
            filler, field, value
        )))
    }
}

/// `[K, D]` 블롭에서 fan_in = D, fan_out = K
fn fan(shape: (usize, usize), norm: VarianceNorm) -> f32 {
    let (rows, cols) = shape;
    let (fan_in, fan_out) = (cols as f32, rows as f32);
    match norm {
        VarianceNorm::FanIn => fan_in,
        VarianceNorm::FanOut => fan_out,
        VarianceNorm::Average => (fan_in + fan_out) / 2.0,
    }
}

pub struct ConstantFiller {
    pub value: f32,
}

impl Filler for ConstantFiller {
    fn fill(&self, blob: &mut Array2<f32>) {
        blob.fill(self.value);
    }
}

pub struct UniformFiller {
    dist: Uniform<f32>,
    seed: Option<u64>,
}

impl UniformFiller {
    pub fn new(min: f32, max: f32, seed: Option<u64>) -> Result<Self> {
        require_finite("uniform", "min", min)?;
        require_finite("uniform", "max", max)?;
        // 구간 폭이 f32 범위를 넘으면 샘플러가 패닉한다
        require_finite("uniform", "max - min", max - min)?;
        if !(min < max) {
            return Err(LossError::Configuration(format!(
                "uniform filler needs min < max, got [{}, {}]",
                min, max
            )));
        }
        Ok(Self {
            dist: Uniform::new(min, max),
            seed,
        })
    }
}

impl Filler for UniformFiller {
    fn fill(&self, blob: &mut Array2<f32>) {
        let mut rng = make_rng(self.seed);
        *blob = Array2::random_using(blob.dim(), self.dist, &mut rng);
    }
}

pub struct GaussianFiller {
    dist: Normal<f32>,
    seed: Option<u64>,
}

impl GaussianFiller {
    pub fn new(mean: f32, std: f32, seed: Option<u64>) -> Result<Self> {
        require_finite("gaussian", "mean", mean)?;
        require_finite("gaussian", "std", std)?;
        if !(std > 0.0) {
            return Err(LossError::Configuration(format!(
                "gaussian filler needs std > 0, got {}",
                std
            )));
        }
        let dist = Normal::new(mean, std)
            .map_err(|e| LossError::Configuration(format!("gaussian filler: {}", e)))?;
        Ok(Self { dist, seed })
    }
}

impl Filler for GaussianFiller {
    fn fill(&self, blob: &mut Array2<f32>) {
        let mut rng = make_rng(self.seed);
        *blob = Array2::random_using(blob.dim(), self.dist, &mut rng);
    }
}

/// U(-sqrt(3/n), sqrt(3/n))
pub struct XavierFiller {
    pub variance_norm: VarianceNorm,
    pub seed: Option<u64>,
}

impl Filler for XavierFiller {
    fn fill(&self, blob: &mut Array2<f32>) {
        let n = fan(blob.dim(), self.variance_norm).max(1.0);
        let bound = (3.0 / n).sqrt();
        let mut rng = make_rng(self.seed);
        *blob = Array2::random_using(blob.dim(), Uniform::new_inclusive(-bound, bound), &mut rng);
    }
}

/// N(0, sqrt(2/n))
pub struct MsraFiller {
    pub variance_norm: VarianceNorm,
    pub seed: Option<u64>,
}

impl Filler for MsraFiller {
    fn fill(&self, blob: &mut Array2<f32>) {
        let n = fan(blob.dim(), self.variance_norm).max(1.0);
        let std = (2.0 / n).sqrt();
        let mut rng = make_rng(self.seed);
        // std > 0 이므로 실패하지 않음
        if let Ok(dist) = Normal::new(0.0, std) {
            *blob = Array2::random_using(blob.dim(), dist, &mut rng);
        }
    }
}

/// 설정의 `type` 문자열로 필러를 고릅니다.
pub fn get_filler(param: &FillerParameter) -> Result<Box<dyn Filler>> {
    match param.filler_type.as_str() {
        "constant" => {
            require_finite("constant", "value", param.value)?;
            Ok(Box::new(ConstantFiller { value: param.value }))
        }
        "uniform" => Ok(Box::new(UniformFiller::new(param.min, param.max, param.seed)?)),
        "gaussian" => Ok(Box::new(GaussianFiller::new(param.mean, param.std, param.seed)?)),
        "xavier" => Ok(Box::new(XavierFiller {
            variance_norm: param.variance_norm,
            seed: param.seed,
        })),
        "msra" => Ok(Box::new(MsraFiller {
            variance_norm: param.variance_norm,
            seed: param.seed,
        })),
        other => Err(LossError::Configuration(format!("unknown filler type '{}'", other))),
    }
}
