//! # Output Reconciler
//!
//! Multi output routines may write fewer values per row than the model has
//! output groups, for instance when only the index of the best class is
//! requested. The prediction loop still reserves `num_output_group` slots per
//! row, so the buffer has to be compacted afterwards.

use tracing::debug;
use crate::error::{ConfigurationError, Result};

/// Compact `out` from a row stride of `num_output_group` down to
/// `observed / num_row`, in place.
///
/// Returns the new row stride. `observed` has to be an exact multiple of
/// `num_row`, and the resulting stride strictly between zero and
/// `num_output_group`.
pub fn reconcile(
    out: &mut [f32],
    num_row: usize,
    num_output_group: usize,
    observed: usize,
) -> Result<usize> {
    let reshape_error = |reason: &'static str| ConfigurationError::Reshape {
        observed,
        num_row,
        num_output_group,
        reason,
    };

    if num_output_group <= 1 {
        return Err(reshape_error("only multi output models are reshaped").into());
    }
    if num_row == 0 || observed % num_row != 0 {
        return Err(reshape_error("result size is not a multiple of the row count").into());
    }
    let stride = observed / num_row;
    if stride == 0 || stride >= num_output_group {
        return Err(reshape_error("per-row result size must be between zero and the group count").into());
    }
    if out.len() < num_row * num_output_group {
        return Err(reshape_error("output buffer is shorter than the reserved result").into());
    }

    // destination never runs ahead of the source, so a forward pass is safe
    for row in 1..num_row {
        let src = row * num_output_group;
        out.copy_within(src..src + stride, row * stride);
    }

    debug!(from = num_output_group, to = stride, num_row, "reshaped prediction output");
    Ok(stride)
}
