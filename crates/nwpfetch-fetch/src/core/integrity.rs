use crate::error::AttemptFailure;

/// Minimum-size heuristic applied to a finished transfer.
///
/// `actual` is the size of the staged file, `None` when the retriever
/// reported success without writing anything. This is not a checksum: a
/// corrupt file above the threshold passes.
pub fn check_min_size(actual: Option<u64>, minimum: u64) -> Result<u64, AttemptFailure> {
    let actual = actual.unwrap_or(0);
    if actual < minimum {
        return Err(AttemptFailure::Integrity { actual, minimum });
    }
    Ok(actual)
}
