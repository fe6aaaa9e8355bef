use super::DisplayBackend;
use crate::error::BackendError;
use crate::negotiate::ResolutionSet;
use crate::resolution::Resolution;
use std::cell::RefCell;

struct FakeDisplay {
    id: String,
    name: String,
    resolutions: Vec<Resolution>,
}

/// In-memory backend that records every clone request it receives.
#[derive(Default)]
pub(crate) struct FakeBackend {
    displays: Vec<FakeDisplay>,
    primary: Option<String>,
    pub(crate) clones: RefCell<Vec<(Resolution, Vec<String>)>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn display(mut self, id: &str, resolutions: &[&str]) -> Self {
        self.displays.push(FakeDisplay {
            id: id.to_string(),
            name: format!("Monitor {id}"),
            resolutions: resolutions
                .iter()
                .map(|s| s.parse().expect("bad test resolution"))
                .collect(),
        });
        self
    }

    pub(crate) fn primary(mut self, id: &str) -> Self {
        self.primary = Some(id.to_string());
        self
    }

    fn find(&self, display: &str) -> Result<&FakeDisplay, BackendError> {
        self.displays
            .iter()
            .find(|fake| fake.id == display)
            .ok_or_else(|| BackendError::UnknownDisplay(display.to_string()))
    }
}

impl DisplayBackend for FakeBackend {
    fn list_displays(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.displays.iter().map(|fake| fake.id.clone()).collect())
    }

    fn primary_display(&self) -> Result<String, BackendError> {
        self.primary
            .clone()
            .or_else(|| self.displays.first().map(|fake| fake.id.clone()))
            .ok_or(BackendError::NoDisplays)
    }

    fn display_name(&self, display: &str) -> Result<String, BackendError> {
        Ok(self.find(display)?.name.clone())
    }

    fn supported_resolutions(&self, display: &str) -> Result<ResolutionSet, BackendError> {
        Ok(self.find(display)?.resolutions.iter().copied().collect())
    }

    fn switch_to_clone(
        &self,
        resolution: Resolution,
        displays: &[String],
    ) -> Result<(), BackendError> {
        for display in displays {
            self.find(display)?;
        }
        self.clones
            .borrow_mut()
            .push((resolution, displays.to_vec()));
        Ok(())
    }
}
