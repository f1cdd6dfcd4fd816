pub mod co_loss;

#[cfg(test)]
mod __test__;

pub use self::co_loss::{COLossLayer, COLossOutput};

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::error::Result;

/// backward 에서 계산할 기울기 선택
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagateDown {
    /// 학습 파라미터(센터) 기울기
    pub param: bool,
    /// 입력 특징 기울기
    pub input: bool,
}

impl PropagateDown {
    pub const ALL: Self = Self { param: true, input: true };
    pub const NONE: Self = Self { param: false, input: false };
    pub const PARAM_ONLY: Self = Self { param: true, input: false };
    pub const INPUT_ONLY: Self = Self { param: false, input: true };
}

impl Default for PropagateDown {
    fn default() -> Self {
        Self::ALL
    }
}

/// 레지스트리가 만들어 내는 손실 레이어의 공통 인터페이스
pub trait LossLayer: Send {
    fn layer_type(&self) -> &'static str;
    fn name(&self) -> &str;
    fn num_tops(&self) -> usize;
    fn loss_weights(&self) -> &[f32];

    fn setup(&mut self, features_shape: &[usize], labels_shape: &[usize]) -> Result<()>;

    /// top 마다 스칼라 하나
    fn forward(&mut self, features: &ArrayView2<f32>, labels: &ArrayView1<i64>) -> Result<Vec<f32>>;

    fn backward(
        &mut self,
        top_diff: &[f32],
        features: &ArrayView2<f32>,
        labels: &ArrayView1<i64>,
        propagate: PropagateDown,
    ) -> Result<Option<Array2<f32>>>;

    fn export_params(&self) -> Result<Vec<Array2<f32>>>;
    fn import_params(&mut self, params: Vec<Array2<f32>>) -> Result<()>;

    /// 가중 합산 손실
    fn weighted_loss(&self, tops: &[f32]) -> f32 {
        tops.iter()
            .zip(self.loss_weights())
            .map(|(top, weight)| top * weight)
            .sum()
    }

    /// 손실 레이어는 가중치 자체가 상류 기울기가 된다
    fn top_diffs(&self) -> Vec<f32> {
        self.loss_weights().to_vec()
    }
}
