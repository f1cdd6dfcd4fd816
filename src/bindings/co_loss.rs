// src/bindings/co_loss.rs

//! # COLossLayer 를 위한 Python 바인딩

use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2, PyReadonlyArrayDyn, ToPyArray};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::LayerParameter;
use crate::error::LossError;
use crate::layers::{COLossLayer as RustCOLossLayer, PropagateDown};
use crate::ops::blas::{flatten_batch, flatten_labels};

impl From<LossError> for PyErr {
    fn from(err: LossError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[pyclass(name = "COLoss", module = "co_loss")]
pub struct PyCOLoss {
    inner: RustCOLossLayer,
}

#[pymethods]
impl PyCOLoss {
    /// `config` 는 레이어 정의 JSON
    #[new]
    fn new(config: &str) -> PyResult<Self> {
        let param = LayerParameter::from_json(config)?;
        Ok(Self {
            inner: RustCOLossLayer::from_param(&param)?,
        })
    }

    fn setup(&mut self, features_shape: Vec<usize>, labels_shape: Vec<usize>) -> PyResult<()> {
        Ok(self.inner.layer_setup(&features_shape, &labels_shape)?)
    }

    /// `(cluster_loss, ortho_loss)`
    fn forward(
        &mut self,
        features: PyReadonlyArrayDyn<f32>,
        labels: PyReadonlyArrayDyn<i64>,
    ) -> PyResult<(f32, f32)> {
        let x = flatten_batch(features.as_array())?;
        let y = flatten_labels(labels.as_array())?;
        let out = self.inner.forward(&x, &y)?;
        Ok((out.cluster_loss, out.ortho_loss))
    }

    #[pyo3(signature = (cluster_diff, ortho_diff, features, labels, propagate_param=true, propagate_input=true))]
    fn backward<'py>(
        &mut self,
        py: Python<'py>,
        cluster_diff: f32,
        ortho_diff: f32,
        features: PyReadonlyArrayDyn<f32>,
        labels: PyReadonlyArrayDyn<i64>,
        propagate_param: bool,
        propagate_input: bool,
    ) -> PyResult<Option<&'py PyArray2<f32>>> {
        let x = flatten_batch(features.as_array())?;
        let y = flatten_labels(labels.as_array())?;
        let propagate = PropagateDown {
            param: propagate_param,
            input: propagate_input,
        };
        let grad = self
            .inner
            .backward(cluster_diff, ortho_diff, &x, &y, propagate)?;
        Ok(grad.map(|g| g.into_pyarray(py)))
    }

    #[getter]
    fn get_centers<'py>(&self, py: Python<'py>) -> Option<&'py PyArray2<f32>> {
        self.inner.centers().map(|c| c.to_pyarray(py))
    }

    /// warm start 용
    #[setter]
    fn set_centers(&mut self, centers: PyReadonlyArray2<f32>) -> PyResult<()> {
        Ok(self.inner.set_centers(centers.as_array().to_owned())?)
    }

    #[getter]
    fn get_center_diff<'py>(&self, py: Python<'py>) -> &'py PyArray2<f32> {
        self.inner.center_diff().to_pyarray(py)
    }

    #[getter]
    fn num_output(&self) -> usize {
        self.inner.num_output()
    }
}
