use crate::error::BackendError;
use crate::resolution::Resolution;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RpcOutput {
    name: String,
    active: bool,
    #[serde(default)]
    focused: bool,
    #[serde(default)]
    make: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    modes: Vec<RpcMode>,
}

#[derive(Debug, Deserialize)]
struct RpcMode {
    width: u32,
    height: u32,
}

/// An output as reported by `swaymsg -t get_outputs`. Sway only reports
/// connected outputs.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct SwayOutput {
    pub(super) name: String,
    pub(super) active: bool,
    pub(super) focused: bool,
    pub(super) make: String,
    pub(super) model: String,
    pub(super) resolutions: Vec<Resolution>,
}

pub(super) fn parse(swaymsg_output: &[u8]) -> Result<Vec<SwayOutput>, BackendError> {
    let rpc_outputs: Vec<RpcOutput> =
        serde_json::from_slice(swaymsg_output).map_err(|err| BackendError::InvalidOutput {
            command: "swaymsg -t get_outputs".to_string(),
            reason: err.to_string(),
        })?;

    Ok(rpc_outputs
        .into_iter()
        .map(|rpc_output| SwayOutput {
            name: rpc_output.name,
            active: rpc_output.active,
            focused: rpc_output.focused,
            make: rpc_output.make,
            model: rpc_output.model,
            resolutions: rpc_output
                .modes
                .iter()
                .map(|rpc_mode| Resolution::new(rpc_mode.width, rpc_mode.height))
                .collect(),
        })
        .collect())
}
