//! # co_loss
//!
//! 특징 벡터를 자기 클래스 센터 쪽으로 모으고(cluster) 다른 클래스 센터와는
//! 직교하도록 미는(ortho) 손실 레이어입니다. forward 는 두 스칼라 손실을,
//! backward 는 센터와 입력 특징에 대한 해석적 기울기를 냅니다.
//!
//! ```rust,no_run
//! use co_loss::{CoLossParameter, COLossLayer, PropagateDown};
//! use ndarray::{arr1, arr2};
//!
//! let mut layer = COLossLayer::new("coloss", CoLossParameter::new(2, 0.0, 1.0))?;
//! layer.layer_setup(&[2, 2], &[2])?;
//!
//! let x = arr2(&[[1.0f32, 0.0], [0.0, 1.0]]);
//! let y = arr1(&[0i64, 1]);
//! let out = layer.forward(&x.view(), &y.view())?;
//! let grad_x = layer.backward(1.0, 0.01, &x.view(), &y.view(), PropagateDown::ALL)?;
//! # let _ = (out, grad_x);
//! # Ok::<(), co_loss::LossError>(())
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod layers;
pub mod ops;
pub mod optim;
pub mod registry;

#[cfg(feature = "python")]
mod bindings;

pub use checkpoint::Checkpoint;
pub use config::{CoLossParameter, FillerParameter, LayerParameter, VarianceNorm};
pub use error::{LossError, Result};
pub use layers::{COLossLayer, COLossOutput, LossLayer, PropagateDown};
pub use optim::Sgd;
pub use registry::LayerRegistry;
