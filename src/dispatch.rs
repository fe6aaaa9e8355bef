use crate::backend::DisplayBackend;
use crate::diagnostics::Diagnostics;
use crate::error::{BackendError, Error};
use crate::negotiate::{
    common_resolutions, resolution_sets, resolutions_for, sorted_by_pixel_count,
};
use crate::resolution::{ParseResolutionError, Resolution};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    List,
    Single,
    Clone,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::List => "list",
            Action::Single => "single",
            Action::Clone => "clone",
        })
    }
}

/// Picks the single requested action. `Ok(None)` means nothing was requested.
pub(crate) fn select_action(requested: &[Action]) -> Result<Option<Action>, Error> {
    match requested {
        [] => Ok(None),
        [action] => Ok(Some(*action)),
        actions => Err(Error::Usage(format!(
            "conflicting actions, please specify exactly one action: {}",
            actions
                .iter()
                .map(Action::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DisplaySelection {
    Auto,
    Explicit(Vec<String>),
}

impl FromStr for DisplaySelection {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "auto" {
            return Ok(DisplaySelection::Auto);
        }
        Ok(DisplaySelection::Explicit(
            s.split(',').map(|display| display.trim().to_string()).collect(),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResolutionChoice {
    Auto,
    Fixed(Resolution),
}

impl FromStr for ResolutionChoice {
    type Err = ParseResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "auto" {
            Ok(ResolutionChoice::Auto)
        } else {
            s.parse().map(ResolutionChoice::Fixed)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Request {
    pub(crate) action: Action,
    pub(crate) displays: DisplaySelection,
    pub(crate) resolution: ResolutionChoice,
}

/// One display as shown by `--list`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct DisplayListing {
    pub(crate) display: String,
    pub(crate) name: String,
    /// Most pixels first.
    pub(crate) resolutions: Vec<Resolution>,
}

impl fmt::Display for DisplayListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "display {}: {}", self.display, self.name)?;
        write!(
            f,
            " resolutions: {}",
            self.resolutions
                .iter()
                .map(Resolution::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Listed(Vec<DisplayListing>),
    Cloned {
        resolution: Resolution,
        displays: Vec<String>,
    },
}

/// What is left to do once `single` has been folded into `clone`.
enum Plan {
    List,
    Clone,
}

pub(crate) fn dispatch(
    request: &Request,
    backend: &dyn DisplayBackend,
    diagnostics: &mut Diagnostics,
) -> Result<Outcome, Error> {
    let (plan, displays) = match request.action {
        Action::Single => (
            Plan::Clone,
            single_displays(request, backend, diagnostics)?,
        ),
        Action::List => (
            Plan::List,
            resolve_displays(&request.displays, backend, diagnostics)?,
        ),
        Action::Clone => (
            Plan::Clone,
            resolve_displays(&request.displays, backend, diagnostics)?,
        ),
    };

    match plan {
        Plan::List => list(backend, displays, diagnostics),
        Plan::Clone => clone(backend, displays, request.resolution, diagnostics),
    }
}

fn single_displays(
    request: &Request,
    backend: &dyn DisplayBackend,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<String>, Error> {
    let primary = backend.primary_display()?;
    match &request.displays {
        DisplaySelection::Auto => {
            diagnostics.info(&format!("primary display: {primary}"));
            Ok(vec![primary])
        }
        DisplaySelection::Explicit(displays) => {
            if displays.as_slice() != [primary.as_str()] {
                diagnostics.warn(
                    "cloning specified displays instead of selecting primary display only"
                        .to_string(),
                );
            }
            resolve_displays(&request.displays, backend, diagnostics)
        }
    }
}

fn resolve_displays(
    selection: &DisplaySelection,
    backend: &dyn DisplayBackend,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<String>, Error> {
    match selection {
        DisplaySelection::Auto => {
            let displays = backend.list_displays()?;
            if displays.is_empty() {
                return Err(BackendError::NoDisplays.into());
            }
            diagnostics.info(&format!("auto-detected displays: {}", displays.join(", ")));
            Ok(displays)
        }
        DisplaySelection::Explicit(displays) => {
            diagnostics.info(&format!("using specified displays: {}", displays.join(", ")));
            Ok(displays.clone())
        }
    }
}

fn list(
    backend: &dyn DisplayBackend,
    displays: Vec<String>,
    diagnostics: &mut Diagnostics,
) -> Result<Outcome, Error> {
    let listings = displays
        .into_iter()
        .map(|display| -> Result<DisplayListing, Error> {
            let resolutions =
                sorted_by_pixel_count(resolutions_for(backend, &display, diagnostics)?);
            let name = backend.display_name(&display)?;
            Ok(DisplayListing {
                display,
                name,
                resolutions,
            })
        })
        .collect::<Result<_, Error>>()?;

    Ok(Outcome::Listed(listings))
}

fn clone(
    backend: &dyn DisplayBackend,
    displays: Vec<String>,
    resolution: ResolutionChoice,
    diagnostics: &mut Diagnostics,
) -> Result<Outcome, Error> {
    let resolution = match resolution {
        ResolutionChoice::Fixed(resolution) => resolution,
        ResolutionChoice::Auto => {
            let sets = resolution_sets(backend, &displays, diagnostics)?;
            let common = common_resolutions(sets);
            log::debug!("common resolutions = {common:?}");
            *common.first().ok_or(Error::NoCommonResolution)?
        }
    };
    diagnostics.info(&format!(
        "cloning {} at {resolution}",
        displays.join(", ")
    ));

    backend.switch_to_clone(resolution, &displays)?;

    Ok(Outcome::Cloned {
        resolution,
        displays,
    })
}
