//! 레이어 전체에서 공유하는 에러 타입

use thiserror::Error;

/// CO 손실 레이어의 에러.
///
/// 모두 상위 코드의 설정/프로그래밍 실수를 나타내므로 재시도하지 않고 그대로 전파합니다.
#[derive(Debug, Error)]
pub enum LossError {
    /// `num_output`, `delta`, 필러 파라미터 등이 잘못됨.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// 입력 텐서의 형태가 맞지 않음.
    #[error("Shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// 레이블이 `[0, num_output)` 범위를 벗어남.
    #[error("Label {label} at index {index} is outside [0, {num_output})")]
    OutOfRangeLabel {
        index: usize,
        label: i64,
        num_output: usize,
    },

    #[error("Empty batch: the loss is averaged over N and N must be positive")]
    EmptyBatch,

    #[error("Layer '{0}' used before setup")]
    NotSetUp(String),

    /// backward 가 직전 forward 와 다른 배치로 호출됨.
    #[error("Backward called without a matching forward pass")]
    MissingForward,

    #[error("Unknown layer type: {0}")]
    UnknownLayerType(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LossError>;

impl LossError {
    pub(crate) fn shape(context: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        LossError::ShapeMismatch {
            context,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}
