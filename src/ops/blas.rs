use ndarray::{linalg::general_mat_mul, Array2, ArrayBase, ArrayView1, ArrayView2, ArrayViewD, ArrayViewMut1, Axis, Data, Dimension, Ix1, Ix2, Zip};

use crate::error::{LossError, Result};

/// `c = alpha * a · b + beta * c`
///
/// 전치는 호출 측에서 `.t()` 뷰로 넘깁니다. 형태가 맞지 않으면 패닉 대신 에러를 돌려줍니다.
pub fn gemm(
    alpha: f32,
    a: &ArrayView2<f32>,
    b: &ArrayView2<f32>,
    beta: f32,
    c: &mut Array2<f32>,
) -> Result<()> {
    let (m, k) = a.dim();
    let (k2, n) = b.dim();
    if k != k2 {
        return Err(LossError::shape("gemm inner dimension", &[m, k], &[k2, n]));
    }
    if c.dim() != (m, n) {
        return Err(LossError::shape("gemm output", &[m, n], c.shape()));
    }
    general_mat_mul(alpha, a, b, beta, c);
    Ok(())
}

/// 절댓값의 합
pub fn asum<S, D>(x: &ArrayBase<S, D>) -> f32
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    x.iter().map(|v| v.abs()).sum()
}

/// `y = alpha * x + beta * y`
pub fn axpby(alpha: f32, x: &ArrayView1<f32>, beta: f32, y: &mut ArrayViewMut1<f32>) {
    Zip::from(y).and(x).for_each(|y, &x| *y = alpha * x + beta * *y);
}

pub fn scale(alpha: f32, y: &mut ArrayViewMut1<f32>) {
    y.mapv_inplace(|v| v * alpha);
}

pub fn set<S>(value: f32, y: &mut ArrayBase<S, Ix2>)
where
    S: ndarray::DataMut<Elem = f32>,
{
    y.fill(value);
}

/// `[N, d1, d2, ...]` 입력을 `[N, d1*d2*...]` 로 펼칩니다.
pub fn flatten_batch<'a>(x: ArrayViewD<'a, f32>) -> Result<ArrayView2<'a, f32>> {
    if x.ndim() < 2 {
        return Err(LossError::shape("features rank", &[0, 0], x.shape()));
    }
    let num = x.shape()[0];
    let dim: usize = x.shape()[1..].iter().product();
    let actual = x.shape().to_vec();
    x.into_shape((num, dim))
        .map_err(|_| LossError::shape("features layout (expected contiguous)", &[num, dim], &actual))
}

/// `[N]` 또는 `[N, 1, ...]` 레이블을 `[N]` 으로 펼칩니다.
pub fn flatten_labels<'a>(y: ArrayViewD<'a, i64>) -> Result<ArrayView1<'a, i64>> {
    if y.ndim() == 0 || y.shape()[1..].iter().any(|&d| d != 1) {
        let num = y.shape().first().copied().unwrap_or(0);
        return Err(LossError::shape("labels", &[num], y.shape()));
    }
    let num = y.shape()[0];
    let actual = y.shape().to_vec();
    // 길이 1 축만 걷어내므로 메모리 배치와 무관
    let mut y = y;
    while y.ndim() > 1 {
        y = y.index_axis_move(Axis(1), 0);
    }
    y.into_dimensionality::<Ix1>()
        .map_err(|_| LossError::shape("labels", &[num], &actual))
}
