//! # 레이어 설정
//!
//! 프레임워크의 레이어 정의를 JSON 으로 옮긴 형태입니다.
//!
//! ```json
//! {
//!   "name": "coloss",
//!   "type": "COLoss",
//!   "loss_weight": [1.0, 0.01],
//!   "co_loss_param": {
//!     "num_output": 10,
//!     "cutoff": 0.0,
//!     "delta": 2.0,
//!     "center_filler": { "type": "xavier" }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{LossError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VarianceNorm {
    #[default]
    FanIn,
    FanOut,
    Average,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillerParameter {
    #[serde(rename = "type")]
    pub filler_type: String,
    pub value: f32,
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub std: f32,
    pub variance_norm: VarianceNorm,
    pub seed: Option<u64>,
}

impl Default for FillerParameter {
    fn default() -> Self {
        Self {
            filler_type: "constant".to_string(),
            value: 0.0,
            min: 0.0,
            max: 1.0,
            mean: 0.0,
            std: 1.0,
            variance_norm: VarianceNorm::FanIn,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoLossParameter {
    /// 클래스(센터) 수 K
    pub num_output: usize,
    /// 클래스 내 유사도의 하한
    #[serde(default)]
    pub cutoff: f32,
    /// 역수 계산의 안정화 항
    #[serde(default)]
    pub delta: f32,
    #[serde(default)]
    pub center_filler: FillerParameter,
}

impl CoLossParameter {
    pub fn new(num_output: usize, cutoff: f32, delta: f32) -> Self {
        Self {
            num_output,
            cutoff,
            delta,
            center_filler: FillerParameter::default(),
        }
    }

    pub fn with_filler(mut self, filler: FillerParameter) -> Self {
        self.center_filler = filler;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_output == 0 {
            return Err(LossError::Configuration("num_output must be positive".into()));
        }
        if !self.cutoff.is_finite() {
            return Err(LossError::Configuration(format!(
                "cutoff must be finite, got {}",
                self.cutoff
            )));
        }
        if !self.delta.is_finite() || self.delta < 0.0 {
            return Err(LossError::Configuration(format!(
                "delta must be finite and non-negative, got {}",
                self.delta
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub layer_type: String,
    /// top 별 손실 가중치. 비어 있으면 첫 top 만 1
    #[serde(default)]
    pub loss_weight: Vec<f32>,
    pub co_loss_param: CoLossParameter,
}

impl LayerParameter {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// `num_tops` 개로 맞춘 손실 가중치
    pub fn loss_weights(&self, num_tops: usize) -> Vec<f32> {
        (0..num_tops)
            .map(|k| match self.loss_weight.get(k) {
                Some(&w) => w,
                None if self.loss_weight.is_empty() && k == 0 => 1.0,
                None => 0.0,
            })
            .collect()
    }
}
