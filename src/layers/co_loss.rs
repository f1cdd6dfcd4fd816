//! # CO 손실 레이어 (Cluster + Ortho)
//!
//! 특징 벡터 `X [N, D]` 와 레이블 `Y [N]` 에 대해 클래스별 센터 `C [K, D]` 를 학습합니다.
//!
//! ```text
//! S = X · Cᵗ                                   [N, K]
//! T[i,j] = 1  if j != Y[i] and S[i,j] > 0      [N, K]
//! R[i]   = 1 / (max(S[i,Y[i]], cutoff) + delta) [N]
//!
//! cluster_loss = Σ R / N
//! ortho_loss   = Σ |T ⊙ S| / 2N
//! ```
//!
//! 두 손실은 따로 출력되며 가중치는 바깥에서 정합니다.
//! backward 는 직전 forward 가 채운 `T`, `R` 버퍼를 그대로 읽습니다.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use tracing::{debug, info, warn};

use super::{LossLayer, PropagateDown};
use crate::config::{CoLossParameter, LayerParameter};
use crate::error::{LossError, Result};
use crate::ops::blas;
use crate::ops::filler::get_filler;

pub const LAYER_TYPE: &str = "COLoss";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct COLossOutput {
    pub cluster_loss: f32,
    pub ortho_loss: f32,
}

pub struct COLossLayer {
    name: String,
    param: CoLossParameter,
    loss_weight: Vec<f32>,

    num_vec: usize,
    dim_vec: usize,
    num_output: usize,

    /// 학습 파라미터 (값, 기울기)
    center: Option<Array2<f32>>,
    center_diff: Array2<f32>,

    ip_vec: Array2<f32>,
    trigger: Array2<f32>,
    ortho_loss: Array2<f32>,
    cluster_loss: Array1<f32>,

    /// 마지막 forward 에서 검증된 레이블
    labels: Array1<usize>,
    has_forward: bool,
}

impl COLossLayer {
    pub fn new(name: impl Into<String>, param: CoLossParameter) -> Result<Self> {
        param.validate()?;
        // 필러 설정 오류도 생성 시점에 드러나도록 미리 한 번 만든다
        get_filler(&param.center_filler)?;
        if param.cutoff + param.delta <= 0.0 {
            warn!(
                cutoff = param.cutoff,
                delta = param.delta,
                "cutoff + delta <= 0, cluster term can diverge for non-positive similarities"
            );
        }
        let num_output = param.num_output;
        Ok(Self {
            name: name.into(),
            param,
            loss_weight: vec![1.0, 0.0],
            num_vec: 0,
            dim_vec: 0,
            num_output,
            center: None,
            center_diff: Array2::zeros((0, 0)),
            ip_vec: Array2::zeros((0, 0)),
            trigger: Array2::zeros((0, 0)),
            ortho_loss: Array2::zeros((0, 0)),
            cluster_loss: Array1::zeros(0),
            labels: Array1::zeros(0),
            has_forward: false,
        })
    }

    pub fn from_param(layer: &LayerParameter) -> Result<Self> {
        let mut this = Self::new(layer.name.clone(), layer.co_loss_param.clone())?;
        this.loss_weight = layer.loss_weights(2);
        Ok(this)
    }

    pub fn num_output(&self) -> usize {
        self.num_output
    }

    pub fn dim(&self) -> usize {
        self.dim_vec
    }

    pub fn batch_size(&self) -> usize {
        self.num_vec
    }

    pub fn is_set_up(&self) -> bool {
        self.dim_vec > 0
    }

    pub fn centers(&self) -> Option<&Array2<f32>> {
        self.center.as_ref()
    }

    pub fn center_diff(&self) -> &Array2<f32> {
        &self.center_diff
    }

    /// 옵티마이저가 쓰는 (값, 기울기) 쌍
    pub fn center_and_diff_mut(&mut self) -> Result<(&mut Array2<f32>, &Array2<f32>)> {
        match self.center.as_mut() {
            Some(center) => Ok((center, &self.center_diff)),
            None => Err(LossError::NotSetUp(self.name.clone())),
        }
    }

    pub fn trigger(&self) -> &Array2<f32> {
        &self.trigger
    }

    pub fn similarity(&self) -> &Array2<f32> {
        &self.ip_vec
    }

    pub fn inverse_similarity(&self) -> &Array1<f32> {
        &self.cluster_loss
    }

    /// 센터를 직접 넣습니다. setup 전이면 setup 이 초기화를 건너뜁니다.
    pub fn set_centers(&mut self, centers: Array2<f32>) -> Result<()> {
        if centers.nrows() != self.num_output {
            return Err(LossError::shape(
                "center rows",
                &[self.num_output, centers.ncols()],
                centers.shape(),
            ));
        }
        if self.is_set_up() && centers.ncols() != self.dim_vec {
            return Err(LossError::shape(
                "center columns",
                &[self.num_output, self.dim_vec],
                centers.shape(),
            ));
        }
        self.center = Some(centers);
        self.has_forward = false;
        Ok(())
    }

    /// 입력 형태를 보고 센터와 임시 버퍼를 준비합니다.
    ///
    /// 특징은 `[N, d1, d2, ...]` 를 `[N, D]` 로 보고, 레이블은 `[N]` 또는 `[N, 1, ...]` 이어야 합니다.
    pub fn layer_setup(&mut self, features_shape: &[usize], labels_shape: &[usize]) -> Result<()> {
        if features_shape.len() < 2 {
            return Err(LossError::shape("features rank", &[0, 0], features_shape));
        }
        let num_vec = features_shape[0];
        let dim_vec: usize = features_shape[1..].iter().product();
        if dim_vec == 0 {
            return Err(LossError::Configuration(format!(
                "feature dimension must be positive, got shape {:?}",
                features_shape
            )));
        }
        if labels_shape.is_empty()
            || labels_shape[0] != num_vec
            || labels_shape[1..].iter().any(|&d| d != 1)
        {
            return Err(LossError::shape("labels", &[num_vec], labels_shape));
        }

        match &self.center {
            Some(center) => {
                if center.dim() != (self.num_output, dim_vec) {
                    return Err(LossError::shape(
                        "existing centers",
                        &[self.num_output, dim_vec],
                        center.shape(),
                    ));
                }
                info!(layer = %self.name, "Skipping parameter initialization");
            }
            None => {
                let mut center = Array2::zeros((self.num_output, dim_vec));
                get_filler(&self.param.center_filler)?.fill(&mut center);
                self.center = Some(center);
            }
        }
        self.dim_vec = dim_vec;
        self.center_diff = Array2::zeros((self.num_output, dim_vec));
        self.reshape(num_vec);
        Ok(())
    }

    fn reshape(&mut self, num_vec: usize) {
        debug!(
            layer = %self.name,
            num_vec,
            dim_vec = self.dim_vec,
            num_output = self.num_output,
            "reshaping buffers"
        );
        self.num_vec = num_vec;
        self.ip_vec = Array2::zeros((num_vec, self.num_output));
        self.trigger = Array2::zeros((num_vec, self.num_output));
        self.ortho_loss = Array2::zeros((num_vec, self.num_output));
        self.cluster_loss = Array1::zeros(num_vec);
        self.labels = Array1::zeros(num_vec);
        self.has_forward = false;
    }

    fn check_batch(&self, features: &ArrayView2<f32>, labels: &ArrayView1<i64>) -> Result<()> {
        if !self.is_set_up() {
            return Err(LossError::NotSetUp(self.name.clone()));
        }
        if features.ncols() != self.dim_vec {
            return Err(LossError::shape(
                "features",
                &[features.nrows(), self.dim_vec],
                features.shape(),
            ));
        }
        if labels.len() != features.nrows() {
            return Err(LossError::shape("labels", &[features.nrows()], labels.shape()));
        }
        if features.nrows() == 0 {
            return Err(LossError::EmptyBatch);
        }
        Ok(())
    }

    fn validate_labels(&self, labels: &ArrayView1<i64>) -> Result<Array1<usize>> {
        let num_output = self.num_output;
        labels
            .iter()
            .enumerate()
            .map(|(index, &label)| {
                if label < 0 || label as usize >= num_output {
                    Err(LossError::OutOfRangeLabel {
                        index,
                        label,
                        num_output,
                    })
                } else {
                    Ok(label as usize)
                }
            })
            .collect::<Result<Vec<_>>>()
            .map(Array1::from)
    }

    pub fn forward(
        &mut self,
        features: &ArrayView2<f32>,
        labels: &ArrayView1<i64>,
    ) -> Result<COLossOutput> {
        self.check_batch(features, labels)?;
        let validated = self.validate_labels(labels)?;
        if features.nrows() != self.num_vec {
            self.reshape(features.nrows());
        }
        let center = self
            .center
            .as_ref()
            .ok_or_else(|| LossError::NotSetUp(self.name.clone()))?;
        self.labels = validated;

        // 유사도
        blas::gemm(1.0, features, &center.t(), 0.0, &mut self.ip_vec)?;

        // 직교 손실: 자기 클래스가 아닌 양의 유사도만 남긴다
        Zip::from(self.trigger.rows_mut())
            .and(self.ortho_loss.rows_mut())
            .and(self.ip_vec.rows())
            .and(&self.labels)
            .par_for_each(|mut trigger, mut ortho, sim, &label| {
                for (j, ((t, o), &s)) in trigger
                    .iter_mut()
                    .zip(ortho.iter_mut())
                    .zip(sim.iter())
                    .enumerate()
                {
                    if j != label && s > 0.0 {
                        *t = 1.0;
                        *o = s;
                    } else {
                        *t = 0.0;
                        *o = 0.0;
                    }
                }
            });
        let ortho_loss = blas::asum(&self.ortho_loss);

        // 군집 손실
        let (cutoff, delta) = (self.param.cutoff, self.param.delta);
        Zip::from(&mut self.cluster_loss)
            .and(self.ip_vec.rows())
            .and(&self.labels)
            .for_each(|r, sim, &label| {
                let mut dot = sim[label];
                if dot <= cutoff {
                    dot = cutoff;
                }
                *r = 1.0 / (dot + delta);
            });
        let cluster_loss = blas::asum(&self.cluster_loss);

        // 이전 배치의 센터 기울기는 이 배치에 유효하지 않음
        blas::set(0.0, &mut self.center_diff);
        self.has_forward = true;
        let num = self.num_vec as f32;
        Ok(COLossOutput {
            cluster_loss: cluster_loss / num,
            ortho_loss: ortho_loss / (2.0 * num),
        })
    }

    /// 요청된 기울기만 계산합니다.
    ///
    /// 센터 기울기는 `center_diff()` 에 쓰이고, 입력 기울기는 반환값으로 나옵니다.
    /// 직교 항의 센터 기울기는 클래스 j 마다 `1 / (1 + Σ_i T[i,j])` 로 줄입니다.
    pub fn backward(
        &mut self,
        cluster_diff: f32,
        ortho_diff: f32,
        features: &ArrayView2<f32>,
        labels: &ArrayView1<i64>,
        propagate: PropagateDown,
    ) -> Result<Option<Array2<f32>>> {
        self.check_batch(features, labels)?;
        if !self.has_forward
            || features.nrows() != self.num_vec
            || labels
                .iter()
                .zip(self.labels.iter())
                .any(|(&given, &cached)| given != cached as i64)
        {
            return Err(LossError::MissingForward);
        }
        let center = self
            .center
            .as_ref()
            .ok_or_else(|| LossError::NotSetUp(self.name.clone()))?;
        let num = self.num_vec as f32;
        let alpha1 = ortho_diff / num;
        let alpha2 = cluster_diff / num;

        if propagate.param {
            blas::set(0.0, &mut self.center_diff);

            // ortho_loss
            blas::gemm(alpha1, &self.trigger.t(), features, 1.0, &mut self.center_diff)?;
            let counts = self.trigger.sum_axis(Axis(0));
            Zip::from(self.center_diff.rows_mut())
                .and(&counts)
                .for_each(|mut row, &count| blas::scale(1.0 / (1.0 + count), &mut row));

            // cluster_loss
            for (i, &label) in self.labels.iter().enumerate() {
                let r = self.cluster_loss[i];
                blas::axpby(
                    -alpha2 * r * r,
                    &features.row(i),
                    1.0,
                    &mut self.center_diff.row_mut(label),
                );
            }
        }

        if !propagate.input {
            return Ok(None);
        }

        // ortho_loss
        let mut data_diff = Array2::zeros((self.num_vec, self.dim_vec));
        blas::gemm(alpha1, &self.trigger.view(), &center.view(), 0.0, &mut data_diff)?;

        // cluster_loss
        for (i, &label) in self.labels.iter().enumerate() {
            let r = self.cluster_loss[i];
            blas::axpby(-alpha2 * r * r, &center.row(label), 1.0, &mut data_diff.row_mut(i));
        }
        Ok(Some(data_diff))
    }
}

impl LossLayer for COLossLayer {
    fn layer_type(&self) -> &'static str {
        LAYER_TYPE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn num_tops(&self) -> usize {
        2
    }

    fn loss_weights(&self) -> &[f32] {
        &self.loss_weight
    }

    fn setup(&mut self, features_shape: &[usize], labels_shape: &[usize]) -> Result<()> {
        self.layer_setup(features_shape, labels_shape)
    }

    fn forward(&mut self, features: &ArrayView2<f32>, labels: &ArrayView1<i64>) -> Result<Vec<f32>> {
        let out = COLossLayer::forward(self, features, labels)?;
        Ok(vec![out.cluster_loss, out.ortho_loss])
    }

    fn backward(
        &mut self,
        top_diff: &[f32],
        features: &ArrayView2<f32>,
        labels: &ArrayView1<i64>,
        propagate: PropagateDown,
    ) -> Result<Option<Array2<f32>>> {
        if top_diff.len() != 2 {
            return Err(LossError::shape("top diffs", &[2], &[top_diff.len()]));
        }
        COLossLayer::backward(self, top_diff[0], top_diff[1], features, labels, propagate)
    }

    fn export_params(&self) -> Result<Vec<Array2<f32>>> {
        match &self.center {
            Some(center) => Ok(vec![center.clone()]),
            None => Err(LossError::NotSetUp(self.name.clone())),
        }
    }

    fn import_params(&mut self, mut params: Vec<Array2<f32>>) -> Result<()> {
        if params.len() != 1 {
            return Err(LossError::Checkpoint(format!(
                "layer '{}' expects 1 parameter blob, got {}",
                self.name,
                params.len()
            )));
        }
        self.set_centers(params.remove(0))
    }
}
