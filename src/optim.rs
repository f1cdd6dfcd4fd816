//! 센터 행렬용 모멘텀 SGD
//!
//! ```text
//! v = momentum * v + dC
//! C = C - lr * v
//! ```
//!
//! 레이어는 기울기만 만들고 파라미터 갱신은 여기서 합니다.

use ndarray::{Array2, Zip};

use crate::error::{LossError, Result};
use crate::layers::COLossLayer;

pub struct Sgd {
    pub lr: f32,
    pub momentum: f32,
    velocity: Option<Array2<f32>>,
}

impl Sgd {
    pub fn new(lr: f32, momentum: f32) -> Result<Self> {
        if !(lr > 0.0) || !(0.0..1.0).contains(&momentum) {
            return Err(LossError::Configuration(format!(
                "sgd needs lr > 0 and 0 <= momentum < 1, got lr={} momentum={}",
                lr, momentum
            )));
        }
        Ok(Self {
            lr,
            momentum,
            velocity: None,
        })
    }

    pub fn step(&mut self, layer: &mut COLossLayer) -> Result<()> {
        let (center, diff) = layer.center_and_diff_mut()?;
        let velocity = self
            .velocity
            .get_or_insert_with(|| Array2::zeros(diff.raw_dim()));
        if velocity.dim() != diff.dim() {
            *velocity = Array2::zeros(diff.raw_dim());
        }
        let (lr, momentum) = (self.lr, self.momentum);
        Zip::from(center)
            .and(&mut *velocity)
            .and(diff)
            .for_each(|c, v, &g| {
                *v = momentum * *v + g;
                *c -= lr * *v;
            });
        Ok(())
    }
}
