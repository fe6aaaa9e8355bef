use crate::error::BackendError;
use crate::negotiate::ResolutionSet;
use crate::resolution::Resolution;
use clap::ValueEnum;

#[cfg(test)]
pub(crate) mod fake;
#[cfg(feature = "randr")]
mod randr;
#[cfg(feature = "sway")]
mod sway;
mod utils;
#[cfg(feature = "xrandr")]
mod xrandr;

/// Queries and reconfigures the attached displays.
///
/// Every call blocks until the underlying tool or server has answered.
pub(crate) trait DisplayBackend {
    /// Connected displays, in the order the backend reports them.
    fn list_displays(&self) -> Result<Vec<String>, BackendError>;

    fn primary_display(&self) -> Result<String, BackendError>;

    /// A human-readable description of `display`.
    fn display_name(&self, display: &str) -> Result<String, BackendError>;

    fn supported_resolutions(&self, display: &str) -> Result<ResolutionSet, BackendError>;

    /// Shows the same picture on all of `displays` at `resolution` and turns
    /// off every other display.
    fn switch_to_clone(&self, resolution: Resolution, displays: &[String])
    -> Result<(), BackendError>;
}

/// Variants are listed in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum BackendKind {
    #[cfg(feature = "sway")]
    Sway,
    #[cfg(feature = "randr")]
    Randr,
    #[cfg(feature = "xrandr")]
    Xrandr,
}

impl BackendKind {
    /// Picks a backend for the running session: sway when `SWAYSOCK` is set,
    /// X11 otherwise.
    pub(crate) fn detect(swaysock: Option<&str>) -> Option<BackendKind> {
        let sway_session = swaysock.is_some_and(|sock| !sock.is_empty());
        BackendKind::value_variants()
            .iter()
            .copied()
            .find(|kind| kind.suits(sway_session))
    }

    fn suits(self, sway_session: bool) -> bool {
        match self {
            #[cfg(feature = "sway")]
            BackendKind::Sway => sway_session,
            #[allow(unreachable_patterns)]
            _ => true,
        }
    }

    pub(crate) fn connect(self) -> Result<Box<dyn DisplayBackend>, BackendError> {
        log::debug!("using {self:?} backend");
        match self {
            #[cfg(feature = "xrandr")]
            BackendKind::Xrandr => Ok(Box::new(xrandr::Xrandr)),
            #[cfg(feature = "sway")]
            BackendKind::Sway => Ok(Box::new(sway::Sway)),
            #[cfg(feature = "randr")]
            BackendKind::Randr => Ok(Box::new(randr::Randr::connect()?)),
        }
    }
}

/// Which of the known outputs to turn off and which to clone, in clone order.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ClonePlan<'a> {
    pub(crate) outputs_to_disable: Vec<&'a str>,
    pub(crate) outputs_to_enable: Vec<&'a str>,
}

/// Builds a clone plan from the names of the currently enabled outputs and
/// the displays the user wants cloned.
pub(crate) fn build_clone_plan<'a>(
    enabled_outputs: impl IntoIterator<Item = &'a str>,
    displays: &'a [String],
) -> Result<ClonePlan<'a>, BackendError> {
    if displays.is_empty() {
        return Err(BackendError::NothingToClone);
    }

    let mut outputs_to_enable: Vec<&str> = Vec::with_capacity(displays.len());
    for display in displays {
        if !outputs_to_enable.contains(&display.as_str()) {
            outputs_to_enable.push(display);
        }
    }

    Ok(ClonePlan {
        outputs_to_disable: enabled_outputs
            .into_iter()
            .filter(|output| !outputs_to_enable.contains(output))
            .collect(),
        outputs_to_enable,
    })
}
