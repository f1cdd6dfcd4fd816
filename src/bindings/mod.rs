mod co_loss;

pub use co_loss::*;

use pyo3::prelude::*;
use pyo3::types::PyModule;

#[pymodule]
pub fn co_loss(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_class::<co_loss::PyCOLoss>()?;
    Ok(())
}
