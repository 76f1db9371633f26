mod bindings;

pub use bindings::{
    calc_error, calc_error_batch, error_pair, PyEntityMatcherAddRemove, PyExactEntityMatcher,
    PyGenericEntityMatcher, PyLookup, PyMissingTokenEntityMatcher,
};

use pyo3::prelude::*;

/// Fuzzy entity extraction over token streams, with Python bindings.
///
/// - Exact matching of multi-token entities through a token trie
/// - Window matchers tolerating missing tokens, scored by likelihood models
/// - Segment matcher tolerating inserted and deleted tokens, scored in parallel
/// - Span error evaluation as a minimum-cost assignment
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyLookup>()?;
    m.add_class::<PyExactEntityMatcher>()?;
    m.add_class::<PyGenericEntityMatcher>()?;
    m.add_class::<PyMissingTokenEntityMatcher>()?;
    m.add_class::<PyEntityMatcherAddRemove>()?;
    m.add_function(wrap_pyfunction!(error_pair, m)?)?;
    m.add_function(wrap_pyfunction!(calc_error, m)?)?;
    m.add_function(wrap_pyfunction!(calc_error_batch, m)?)?;
    m.add("MAX_SEGMENT_POSITIONS", crate::core::MAX_SEGMENT_POSITIONS)?;
    Ok(())
}
