//! Python bindings

use crate::config::ExposureConfig;
use crate::core::exposure_table::percentage_exposed as pct_exposed;
use crate::core::masking::mask_array;
use crate::pipeline::run_pipeline;
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::prelude::*;

fn runtime_error(e: impl std::fmt::Display) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e))
}

/// Run a configured batch and return the output table path
#[pyfunction]
fn run_config(config_path: String) -> PyResult<String> {
    let config = ExposureConfig::load(&config_path).map_err(runtime_error)?;
    let output = run_pipeline(&config).map_err(runtime_error)?;
    Ok(output.table_path.to_string_lossy().into_owned())
}

/// Keep exposure values where the hazard is flooded; NaN elsewhere
#[pyfunction]
fn mask_by_hazard<'py>(
    py: Python<'py>,
    exposure: PyReadonlyArray2<f32>,
    hazard: PyReadonlyArray2<f32>,
) -> PyResult<&'py PyArray2<f32>> {
    let exposure = exposure.as_array();
    let hazard = hazard.as_array();
    if exposure.dim() != hazard.dim() {
        return Err(PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
            "Shape mismatch: exposure {:?} vs hazard {:?}",
            exposure.dim(),
            hazard.dim()
        )));
    }
    Ok(mask_array(exposure, hazard).into_pyarray(py))
}

/// Share of the total that is exposed, in percent with two decimals
#[pyfunction]
fn percentage_exposed(total: Option<f64>, exposed: Option<f64>) -> f64 {
    pct_exposed(total, exposed)
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(run_config, m)?)?;
    m.add_function(wrap_pyfunction!(mask_by_hazard, m)?)?;
    m.add_function(wrap_pyfunction!(percentage_exposed, m)?)?;
    Ok(())
}
