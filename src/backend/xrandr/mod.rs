use super::utils::{run, run_for_stdout};
use super::{ClonePlan, DisplayBackend, build_clone_plan};
use crate::error::BackendError;
use crate::negotiate::ResolutionSet;
use crate::resolution::Resolution;
use parsing::XrandrOutput;
use std::process;

mod parsing;

struct XrandrCommand {
    command: process::Command,
}

impl XrandrCommand {
    fn new() -> Self {
        let command = process::Command::new("xrandr");
        Self { command }
    }

    fn query(mut self) -> Self {
        self.command.arg("--query");
        self
    }

    fn output(mut self, output_name: &str) -> Self {
        self.command.arg("--output").arg(output_name);
        self
    }

    fn mode(mut self, resolution: Resolution) -> Self {
        self.command.arg("--mode").arg(resolution.to_string());
        self
    }

    fn origin(mut self) -> Self {
        self.command.arg("--pos").arg("0x0");
        self
    }

    fn same_as(mut self, output_name: &str) -> Self {
        self.command.arg("--same-as").arg(output_name);
        self
    }

    fn off(mut self) -> Self {
        self.command.arg("--off");
        self
    }

    fn command(self) -> process::Command {
        self.command
    }
}

/// Drives the `xrandr` command line tool.
pub(super) struct Xrandr;

impl Xrandr {
    fn outputs(&self) -> Result<Vec<XrandrOutput>, BackendError> {
        let stdout = run_for_stdout(XrandrCommand::new().query().command())?;
        let outputs = parsing::parse(&stdout);
        log::trace!("outputs = {outputs:?}");
        Ok(outputs)
    }

    fn output(&self, display: &str) -> Result<XrandrOutput, BackendError> {
        self.outputs()?
            .into_iter()
            .find(|output| output.name == display)
            .ok_or_else(|| BackendError::UnknownDisplay(display.to_string()))
    }
}

impl DisplayBackend for Xrandr {
    fn list_displays(&self) -> Result<Vec<String>, BackendError> {
        Ok(self
            .outputs()?
            .into_iter()
            .filter(|output| output.connected)
            .map(|output| output.name)
            .collect())
    }

    fn primary_display(&self) -> Result<String, BackendError> {
        let connected: Vec<_> = self
            .outputs()?
            .into_iter()
            .filter(|output| output.connected)
            .collect();

        connected
            .iter()
            .find(|output| output.primary)
            .or_else(|| connected.first())
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
                .filter(|output| output.enabled)
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

fn describe_output(output: &XrandrOutput) -> String {
    match output.size_mm {
        Some((width, height)) => format!("{} ({width}mm x {height}mm)", output.name),
        None => output.name.clone(),
    }
}

fn build_clone_commands(clone_plan: &ClonePlan, resolution: Resolution) -> Vec<process::Command> {
    let disable_commands = clone_plan
        .outputs_to_disable
        .iter()
        .map(|output| XrandrCommand::new().output(output).off().command());

    let enable_commands = clone_plan
        .outputs_to_enable
        .split_first()
        .map(|(first, other)| {
            let first_command = XrandrCommand::new()
                .output(first)
                .mode(resolution)
                .origin()
                .command();

            let other_commands = other.iter().map(|output| {
                XrandrCommand::new()
                    .output(output)
                    .mode(resolution)
                    .same_as(first)
                    .command()
            });

            std::iter::once(first_command).chain(other_commands)
        })
        .into_iter()
        .flatten();

    disable_commands.chain(enable_commands).collect()
}
