//! Line-of-sight visibility between objects near a spherical body.
//!
//! Given state histories of sensors and targets, computes the visibility
//! function of every sensor/target pair over time and extracts the time
//! windows during which each pair has line of sight.
//!
//! The JSON entry point `vis_history_from_json` accepts a JSON string
//! (`VisHistParams`) and returns a JSON string (`VisHistResult`). With the
//! `python` feature it is also exposed to Python as `vis_history_json`.

pub mod error;
pub mod interval;
pub mod schedule;
pub mod types;
pub mod vis_history;
pub mod visibility;
pub mod window_list;

pub use error::{VisError, VisResult};
pub use interval::{Interval, IntervalSet};
pub use schedule::Schedule;
pub use types::{ObjectId, ObjectRecord, PairTag, VisHistParams, VisHistResult};
pub use vis_history::{get_vis_hist, get_vis_hist_with, VisHistOptions};
pub use visibility::{is_vis, visibility_func, zero_crossing_fit, zero_crossing_fit_with};
pub use window_list::{int_tree_to_window_list, pad_schedule_list, WindowList};

/// Run a visibility-history batch.
///
/// Takes a JSON string matching `VisHistParams` and returns a JSON string
/// matching `VisHistResult`.
pub fn vis_history_from_json(params_json: &str) -> VisResult<String> {
    let params: VisHistParams = serde_json::from_str(params_json)?;
    let result = params.run()?;
    Ok(serde_json::to_string(&result)?)
}

#[cfg(feature = "python")]
mod python {
    use pyo3::prelude::*;

    /// Run a visibility-history batch from Python.
    #[pyfunction]
    fn vis_history_json(params_json: &str) -> PyResult<String> {
        super::vis_history_from_json(params_json).map_err(|e| {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
                "Visibility history failed: {e}"
            ))
        })
    }

    /// satvis Rust engine, importable from Python.
    #[pymodule]
    fn satvis(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(vis_history_json, m)?)?;
        Ok(())
    }
}
