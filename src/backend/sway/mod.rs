use std::process;

use crate::error::BackendError;
use crate::negotiate::ResolutionSet;
use crate::resolution::Resolution;

use super::utils::run;
use super::{ClonePlan, DisplayBackend, build_clone_plan};
use parsing::SwayOutput;

mod parsing;

struct Swaymsg {
    command: process::Command,
}

impl Swaymsg {
    fn new() -> Self {
        Self {
            command: process::Command::new("swaymsg"),
        }
    }

    fn get_outputs(mut self) -> Self {
        self.command.arg("-t").arg("get_outputs");
        self
    }

    fn disable(mut self, output_name: &str) -> Self {
        self.command.arg(format!("output \"{output_name}\" disable"));
        self
    }

    fn enable(mut self, output_name: &str, resolution: Resolution) -> Self {
        self.command.arg(format!(
            "output \"{output_name}\" enable position 0 0 mode \"{resolution}\""
        ));
        self
    }

    fn command(self) -> process::Command {
        self.command
    }
}

/// Talks to a running sway compositor through `swaymsg`.
pub(super) struct Sway;

impl Sway {
    fn outputs(&self) -> Result<Vec<SwayOutput>, BackendError> {
        let outputs = parsing::parse(&run(Swaymsg::new().get_outputs().command())?.stdout)?;
        log::trace!("outputs = {outputs:?}");
        Ok(outputs)
    }

    fn output(&self, display: &str) -> Result<SwayOutput, BackendError> {
        self.outputs()?
            .into_iter()
            .find(|output| output.name == display)
            .ok_or_else(|| BackendError::UnknownDisplay(display.to_string()))
    }
}

impl DisplayBackend for Sway {
    fn list_displays(&self) -> Result<Vec<String>, BackendError> {
        Ok(self
            .outputs()?
            .into_iter()
            .map(|output| output.name)
            .collect())
    }

    /// Sway has no notion of a primary output; the focused one stands in.
    fn primary_display(&self) -> Result<String, BackendError> {
        let outputs = self.outputs()?;
        outputs
            .iter()
            .find(|output| output.focused)
            .or_else(|| outputs.first())
            .map(|output| output.name.clone())
            .ok_or(BackendError::NoDisplays)
    }

    fn display_name(&self, display: &str) -> Result<String, BackendError> {
        Ok(describe_output(&self.output(display)?))
    }

    fn supported_resolutions(&self, display: &str) -> Result<ResolutionSet, BackendError> {
        Ok(self.output(display)?.resolutions.into_iter().collect())
    }

    fn switch_to_clone(
        &self,
        resolution: Resolution,
        displays: &[String],
    ) -> Result<(), BackendError> {
        let outputs = self.outputs()?;
        let clone_plan = build_clone_plan(
            outputs
                .iter()
                .filter(|output| output.active)
                .map(|output| output.name.as_str()),
            displays,
        )?;
        log::debug!("clone_plan = {clone_plan:?}");

        for command in build_clone_commands(&clone_plan, resolution) {
            run(command)?;
        }
        Ok(())
    }
}

fn describe_output(output: &SwayOutput) -> String {
    let name = format!("{} {}", output.make, output.model);
    let name = name.trim();
    if name.is_empty() {
        output.name.clone()
    } else {
        name.to_string()
    }
}

fn build_clone_commands(clone_plan: &ClonePlan, resolution: Resolution) -> Vec<process::Command> {
    let disable_commands = clone_plan
        .outputs_to_disable
        .iter()
        .map(|output| Swaymsg::new().disable(output).command());

    let enable_commands = clone_plan
        .outputs_to_enable
        .iter()
        .map(|output| Swaymsg::new().enable(output, resolution).command());

    disable_commands.chain(enable_commands).collect()
}
