use crate::error::BackendError;
use std::process;

pub(super) fn run(mut command: process::Command) -> Result<process::Output, BackendError> {
    log::debug!("Running {command:?}");
    let output = command.output().map_err(|source| BackendError::Spawn {
        command: describe(&command),
        source,
    })?;

    log::trace!("Output: {output:?}");

    if !output.status.success() {
        return Err(BackendError::CommandFailed {
            command: describe(&command),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

pub(super) fn run_for_stdout(command: process::Command) -> Result<String, BackendError> {
    let description = describe(&command);
    let output = run(command)?;
    String::from_utf8(output.stdout).map_err(|_| BackendError::InvalidOutput {
        command: description,
        reason: "stdout is not valid utf-8".to_string(),
    })
}

fn describe(command: &process::Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
pub(super) fn assert_command_eq(
    actual: &std::process::Command,
    expected_program: &str,
    expected_args: &[&str],
) {
    assert_eq!(
        actual
            .get_program()
            .to_str()
            .expect("program name is not valid utf-8"),
        expected_program
    );

    let actual_args: Vec<&str> = actual
        .get_args()
        .map(|arg| arg.to_str().expect("argument is not valid utf-8"))
        .collect();

    assert_eq!(actual_args, expected_args);
}
