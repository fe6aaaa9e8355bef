use crate::backend::DisplayBackend;
use crate::diagnostics::Diagnostics;
use crate::error::BackendError;
use crate::resolution::Resolution;
use std::cmp::Reverse;
use std::collections::HashSet;

pub(crate) type ResolutionSet = HashSet<Resolution>;

const FALLBACK_RESOLUTIONS: [Resolution; 2] =
    [Resolution::new(800, 600), Resolution::new(640, 480)];

/// Resolutions supported by `display`, or a conservative default when the
/// backend reports none.
pub(crate) fn resolutions_for(
    backend: &dyn DisplayBackend,
    display: &str,
    diagnostics: &mut Diagnostics,
) -> Result<ResolutionSet, BackendError> {
    let resolutions = backend.supported_resolutions(display)?;
    log::debug!("resolutions of {display} = {resolutions:?}");

    if resolutions.is_empty() {
        diagnostics.warn(format!(
            "no resolutions found for display {display}, falling back to default"
        ));
        return Ok(FALLBACK_RESOLUTIONS.into_iter().collect());
    }

    Ok(resolutions)
}

/// One resolution set per display, in display order.
pub(crate) fn resolution_sets(
    backend: &dyn DisplayBackend,
    displays: &[String],
    diagnostics: &mut Diagnostics,
) -> Result<Vec<ResolutionSet>, BackendError> {
    displays
        .iter()
        .map(|display| resolutions_for(backend, display, diagnostics))
        .collect()
}

/// Resolutions shared by every set, most pixels first.
///
/// # Panics
///
/// Panics if `sets` is empty: there is no meaningful intersection of zero sets.
pub(crate) fn common_resolutions(sets: Vec<ResolutionSet>) -> Vec<Resolution> {
    let common = sets
        .into_iter()
        .reduce(|mut acc, set| {
            acc.retain(|resolution| set.contains(resolution));
            acc
        })
        .expect("common_resolutions needs at least one resolution set");

    sorted_by_pixel_count(common)
}

/// Sorts by pixel count, descending. Equal pixel counts are ordered by width
/// so that output is reproducible.
pub(crate) fn sorted_by_pixel_count(
    resolutions: impl IntoIterator<Item = Resolution>,
) -> Vec<Resolution> {
    let mut resolutions: Vec<_> = resolutions.into_iter().collect();
    resolutions.sort_by_key(|resolution| {
        Reverse((resolution.pixel_count(), resolution.width, resolution.height))
    });
    resolutions
}
