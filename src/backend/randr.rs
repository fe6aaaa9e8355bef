use super::{ClonePlan, DisplayBackend, build_clone_plan};
use crate::error::BackendError;
use crate::negotiate::ResolutionSet;
use crate::resolution::Resolution;
use std::collections::HashMap;
use x11rb::CURRENT_TIME;
use x11rb::connection::Connection;
use x11rb::protocol::randr::{self, ConnectionExt};
use x11rb::protocol::xproto::Window;
use x11rb::rust_connection::RustConnection;

type Modes<'a> = HashMap<randr::Mode, &'a randr::ModeInfo>;
type Outputs = HashMap<randr::Output, randr::GetOutputInfoReply>;
type Crtcs = HashMap<randr::Crtc, randr::GetCrtcInfoReply>;

/// Speaks the RandR extension directly to the X server.
pub(super) struct Randr {
    conn: RustConnection,
    root: Window,
}

impl Randr {
    pub(super) fn connect() -> Result<Self, BackendError> {
        let (conn, screen_num) = RustConnection::connect(None)?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| BackendError::X11(format!("no such screen: {screen_num}")))?;
        Ok(Self { conn, root })
    }

    fn screen_resources(&self) -> Result<randr::GetScreenResourcesReply, BackendError> {
        let screen_resources = self.conn.randr_get_screen_resources(self.root)?.reply()?;
        log::trace!("screen_resources = {screen_resources:?}");
        Ok(screen_resources)
    }

    /// Output infos in the order the server lists the outputs.
    fn output_infos(
        &self,
        screen_resources: &randr::GetScreenResourcesReply,
    ) -> Result<Vec<(randr::Output, randr::GetOutputInfoReply)>, BackendError> {
        screen_resources
            .outputs
            .iter()
            .map(|&output_id| {
                let output = self
                    .conn
                    .randr_get_output_info(output_id, screen_resources.config_timestamp)?
                    .reply()?;
                log::trace!("output = {output:?}");
                Ok((output_id, output))
            })
            .collect()
    }

    fn crtc_infos(
        &self,
        screen_resources: &randr::GetScreenResourcesReply,
    ) -> Result<Crtcs, BackendError> {
        screen_resources
            .crtcs
            .iter()
            .map(|&crtc_id| {
                let crtc = self
                    .conn
                    .randr_get_crtc_info(crtc_id, screen_resources.config_timestamp)?
                    .reply()?;
                Ok((crtc_id, crtc))
            })
            .collect()
    }

    fn connected_outputs(&self) -> Result<Vec<randr::GetOutputInfoReply>, BackendError> {
        let screen_resources = self.screen_resources()?;
        Ok(self
            .output_infos(&screen_resources)?
            .into_iter()
            .map(|(_, output)| output)
            .filter(|output| output.connection == randr::Connection::CONNECTED)
            .collect())
    }

    fn set_crtc(
        &self,
        config_timestamp: x11rb::protocol::xproto::Timestamp,
        crtc_id: randr::Crtc,
        crtc: &randr::GetCrtcInfoReply,
    ) -> Result<(), BackendError> {
        log::trace!("crtc_id = {crtc_id} crtc_config = {crtc:?}");
        let reply = self
            .conn
            .randr_set_crtc_config(
                crtc_id,
                CURRENT_TIME,
                config_timestamp,
                crtc.x,
                crtc.y,
                crtc.mode,
                crtc.rotation,
                &crtc.outputs,
            )?
            .reply()?;
        if reply.status != randr::SetConfig::SUCCESS {
            return Err(BackendError::X11(format!(
                "setting crtc {crtc_id} failed with {:?}",
                reply.status
            )));
        }
        Ok(())
    }
}

impl DisplayBackend for Randr {
    fn list_displays(&self) -> Result<Vec<String>, BackendError> {
        Ok(self
            .connected_outputs()?
            .iter()
            .map(|output| output_name(output))
            .collect())
    }

    fn primary_display(&self) -> Result<String, BackendError> {
        let primary = self.conn.randr_get_output_primary(self.root)?.reply()?.output;
        if primary != 0 {
            let screen_resources = self.screen_resources()?;
            let output = self
                .conn
                .randr_get_output_info(primary, screen_resources.config_timestamp)?
                .reply()?;
            if output.connection == randr::Connection::CONNECTED {
                return Ok(output_name(&output));
            }
        }

        self.connected_outputs()?
            .first()
            .map(output_name)
            .ok_or(BackendError::NoDisplays)
    }

    fn display_name(&self, display: &str) -> Result<String, BackendError> {
        let screen_resources = self.screen_resources()?;
        let outputs = self.output_infos(&screen_resources)?;
        let (_, output) =
            find_output(outputs.iter().map(|(id, output)| (id, output)), display)?;

        Ok(if output.mm_width != 0 && output.mm_height != 0 {
            format!(
                "{display} ({}mm x {}mm)",
                output.mm_width, output.mm_height
            )
        } else {
            display.to_string()
        })
    }

    fn supported_resolutions(&self, display: &str) -> Result<ResolutionSet, BackendError> {
        let screen_resources = self.screen_resources()?;
        let modes = index_modes(&screen_resources.modes);
        let outputs = self.output_infos(&screen_resources)?;
        let (_, output) =
            find_output(outputs.iter().map(|(id, output)| (id, output)), display)?;

        Ok(mode_ids_to_modes(&output.modes, &modes)
            .filter(|mode| is_admissible(mode))
            .map(randr_mode_to_resolution)
            .collect())
    }

    fn switch_to_clone(
        &self,
        resolution: Resolution,
        displays: &[String],
    ) -> Result<(), BackendError> {
        let screen_resources = self.screen_resources()?;
        let modes = index_modes(&screen_resources.modes);
        let outputs: Outputs = self.output_infos(&screen_resources)?.into_iter().collect();
        let current_crtcs = self.crtc_infos(&screen_resources)?;

        let enabled_outputs: Vec<String> = outputs
            .values()
            .filter(|output| output.crtc != 0)
            .map(output_name)
            .collect();
        let clone_plan =
            build_clone_plan(enabled_outputs.iter().map(String::as_str), displays)?;
        log::debug!("clone_plan = {clone_plan:?}");

        let mut crtcs = current_crtcs.clone();
        update_crtcs(&clone_plan, resolution, &modes, &outputs, &mut crtcs)?;

        let mut changed: Vec<_> = crtcs
            .iter()
            .filter(|&(crtc_id, crtc)| current_crtcs.get(crtc_id) != Some(crtc))
            .collect();
        changed.sort_by_key(|&(crtc_id, _)| *crtc_id);

        let disabled = randr::GetCrtcInfoReply {
            rotation: randr::Rotation::ROTATE0,
            ..Default::default()
        };
        for &(&crtc_id, _) in &changed {
            self.set_crtc(screen_resources.config_timestamp, crtc_id, &disabled)?;
        }

        if let Some(screen_size) = compute_screen_size(&modes, &outputs, &crtcs)? {
            log::trace!("screen_size = {screen_size:?}");
            self.conn
                .randr_set_screen_size(
                    self.root,
                    screen_size.width,
                    screen_size.height,
                    screen_size.mm_width,
                    screen_size.mm_height,
                )?
                .check()?;
        }

        for &(&crtc_id, crtc) in changed.iter().filter(|(_, crtc)| crtc.mode != 0) {
            self.set_crtc(screen_resources.config_timestamp, crtc_id, crtc)?;
        }
        Ok(())
    }
}

fn output_name(output: &randr::GetOutputInfoReply) -> String {
    String::from_utf8_lossy(&output.name).into_owned()
}

fn find_output<'a>(
    mut outputs: impl Iterator<Item = (&'a randr::Output, &'a randr::GetOutputInfoReply)>,
    name: &str,
) -> Result<(randr::Output, &'a randr::GetOutputInfoReply), BackendError> {
    outputs
        .find(|(_, output)| output.name == name.as_bytes())
        .map(|(&output_id, output)| (output_id, output))
        .ok_or_else(|| BackendError::UnknownDisplay(name.to_string()))
}

fn index_modes(modes: &[randr::ModeInfo]) -> Modes<'_> {
    modes.iter().map(|mode| (mode.id, mode)).collect()
}

fn mode_ids_to_modes<'a>(
    mode_ids: &[randr::Mode],
    modes: &Modes<'a>,
) -> impl Iterator<Item = &'a randr::ModeInfo> {
    mode_ids
        .iter()
        .filter_map(|mode_id| modes.get(mode_id).copied())
}

fn is_admissible(mode: &randr::ModeInfo) -> bool {
    !mode.mode_flags.contains(randr::ModeFlag::DOUBLE_SCAN)
}

fn randr_mode_to_resolution(mode: &randr::ModeInfo) -> Resolution {
    Resolution::new(u32::from(mode.width), u32::from(mode.height))
}

fn compute_refresh_rate(mode: &randr::ModeInfo) -> u64 {
    if mode.htotal > 0 && mode.vtotal > 0 {
        u64::from(mode.dot_clock) * 1000 / (u64::from(mode.htotal) * u64::from(mode.vtotal))
    } else {
        0
    }
}

/// The admissible mode of `output` with the given size: preferred modes
/// first, then the highest refresh rate.
fn choose_mode(
    output: &randr::GetOutputInfoReply,
    modes: &Modes,
    resolution: Resolution,
) -> Option<randr::Mode> {
    mode_ids_to_modes(&output.modes, modes)
        .enumerate()
        .filter(|(_, mode)| is_admissible(mode))
        .filter(|(_, mode)| randr_mode_to_resolution(mode) == resolution)
        .max_by_key(|&(i, mode)| {
            (
                i < usize::from(output.num_preferred),
                compute_refresh_rate(mode),
            )
        })
        .map(|(_, mode)| mode.id)
}

fn update_crtcs(
    clone_plan: &ClonePlan,
    resolution: Resolution,
    modes: &Modes,
    outputs: &Outputs,
    crtcs: &mut Crtcs,
) -> Result<(), BackendError> {
    for name in &clone_plan.outputs_to_disable {
        let (output_id, output) = find_output(outputs.iter(), name)?;
        if let Some(crtc) = crtcs.get_mut(&output.crtc) {
            crtc.outputs.retain(|&id| id != output_id);
            if crtc.outputs.is_empty() {
                crtc.mode = 0;
            }
        }
    }

    for name in &clone_plan.outputs_to_enable {
        let (output_id, output) = find_output(outputs.iter(), name)?;

        let mode = choose_mode(output, modes, resolution).ok_or_else(|| {
            BackendError::UnsupportedResolution {
                display: name.to_string(),
                resolution: resolution.to_string(),
            }
        })?;

        let crtc_id = if crtcs
            .get(&output.crtc)
            .is_some_and(|crtc| crtc.outputs.contains(&output_id))
        {
            output.crtc
        } else {
            let crtc_id = output
                .crtcs
                .iter()
                .copied()
                .find(|crtc_id| {
                    crtcs
                        .get(crtc_id)
                        .is_some_and(|crtc| crtc.outputs.is_empty())
                })
                .ok_or_else(|| BackendError::NoFreeCrtc(name.to_string()))?;
            if let Some(crtc) = crtcs.get_mut(&crtc_id) {
                crtc.outputs.push(output_id);
            }
            crtc_id
        };

        if let Some(crtc) = crtcs.get_mut(&crtc_id) {
            crtc.x = 0;
            crtc.y = 0;
            crtc.mode = mode;
            crtc.rotation = randr::Rotation::ROTATE0;
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
struct ScreenSize {
    width: u16,
    height: u16,
    mm_width: u32,
    mm_height: u32,
}

fn compute_screen_size(
    modes: &Modes,
    outputs: &Outputs,
    crtcs: &Crtcs,
) -> Result<Option<ScreenSize>, BackendError> {
    let bboxes: Vec<_> = crtcs
        .values()
        .filter(|crtc| crtc.mode != 0)
        .filter_map(|crtc| {
            let mode = modes.get(&crtc.mode)?;
            Some((
                i32::from(crtc.x),
                i32::from(crtc.y),
                i32::from(crtc.x) + i32::from(mode.width),
                i32::from(crtc.y) + i32::from(mode.height),
            ))
        })
        .collect();

    let min_x = bboxes.iter().map(|bbox| bbox.0).min();
    let min_y = bboxes.iter().map(|bbox| bbox.1).min();
    let max_x = bboxes.iter().map(|bbox| bbox.2).max();
    let max_y = bboxes.iter().map(|bbox| bbox.3).max();

    let (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) = (min_x, min_y, max_x, max_y) else {
        return Ok(None);
    };

    let too_large = || BackendError::X11("screen would be too large".to_string());
    let width = u16::try_from(max_x - min_x).map_err(|_| too_large())?;
    let height = u16::try_from(max_y - min_y).map_err(|_| too_large())?;

    let (mm_width, mm_height) = crtcs
        .values()
        .filter(|crtc| crtc.mode != 0)
        .flat_map(|crtc| crtc.outputs.iter())
        .filter_map(|output_id| outputs.get(output_id))
        .map(|output| (output.mm_width, output.mm_height))
        .filter(|(w, h)| *w != 0 && *h != 0)
        .max_by_key(|(w, h)| u64::from(*w) * u64::from(*h))
        .unwrap_or_else(|| (px_to_mm(width), px_to_mm(height)));

    Ok(Some(ScreenSize {
        width,
        height,
        mm_width,
        mm_height,
    }))
}

fn px_to_mm(px: u16) -> u32 {
    const DPI: f32 = 96.0;
    const MM_PER_INCH: f32 = 25.4;

    (f32::from(px) * (MM_PER_INCH / DPI)).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    use maplit::hashmap;

    fn mode_info(id: randr::Mode, width: u16, height: u16) -> randr::ModeInfo {
        randr::ModeInfo {
            id,
            width,
            height,
            ..Default::default()
        }
    }

    fn output_info(
        name: &str,
        crtc: randr::Crtc,
        mode_ids: Vec<randr::Mode>,
    ) -> randr::GetOutputInfoReply {
        randr::GetOutputInfoReply {
            name: name.as_bytes().to_vec(),
            connection: randr::Connection::CONNECTED,
            crtc,
            crtcs: vec![20, 21, 22],
            modes: mode_ids,
            ..Default::default()
        }
    }

    #[test]
    #[ignore = "needs X11, manual"]
    fn list_displays_smoke_test() {
        // Arrange
        let randr = Randr::connect().expect("unable to connect to X11 display");

        // Act
        let displays = randr.list_displays().expect("list_displays failed");

        // Assert
        assert!(!displays.is_empty());
        let primary = randr.primary_display().expect("primary_display failed");
        assert!(displays.contains(&primary));
    }

    #[test]
    fn choose_mode_prefers_preferred_then_refresh_rate() {
        // Arrange
        let fast = randr::ModeInfo {
            dot_clock: 148_500_000,
            htotal: 2200,
            vtotal: 1125,
            ..mode_info(1, 1920, 1080)
        };
        let slow = randr::ModeInfo {
            dot_clock: 74_250_000,
            htotal: 2200,
            vtotal: 1125,
            ..mode_info(2, 1920, 1080)
        };
        let other = mode_info(3, 1280, 1024);
        let modes = hashmap! { 1 => &fast, 2 => &slow, 3 => &other };
        let mut output = output_info("HDMI-1", 0, vec![2, 1, 3]);

        // Act
        let unpreferred = choose_mode(&output, &modes, Resolution::new(1920, 1080));
        output.num_preferred = 1;
        let preferred = choose_mode(&output, &modes, Resolution::new(1920, 1080));
        let missing = choose_mode(&output, &modes, Resolution::new(800, 600));

        // Assert
        assert_eq!(unpreferred, Some(1));
        assert_eq!(preferred, Some(2));
        assert_eq!(missing, None);
    }

    #[test]
    fn choose_mode_skips_double_scan_modes() {
        // Arrange
        let double_scan = randr::ModeInfo {
            mode_flags: randr::ModeFlag::DOUBLE_SCAN,
            ..mode_info(1, 320, 240)
        };
        let modes = hashmap! { 1 => &double_scan };
        let mut output = output_info("VGA-1", 0, vec![1]);
        output.num_preferred = 1;

        // Act
        let chosen = choose_mode(&output, &modes, Resolution::new(320, 240));

        // Assert
        assert_eq!(chosen, None);
    }

    #[test]
    fn update_crtcs_moves_clone_targets_to_origin_and_detaches_others() {
        // Arrange
        let big = mode_info(1, 1920, 1080);
        let shared = mode_info(2, 1280, 1024);
        let modes = hashmap! { 1 => &big, 2 => &shared };
        let outputs = hashmap! {
            10 => output_info("eDP-1", 20, vec![1, 2]),
            11 => output_info("HDMI-1", 0, vec![2]),
            12 => output_info("DP-1", 21, vec![1]),
        };
        let mut crtcs = hashmap! {
            20 => randr::GetCrtcInfoReply { x: 0, y: 0, mode: 1, outputs: vec![10], ..Default::default() },
            21 => randr::GetCrtcInfoReply { x: 1920, y: 0, mode: 1, outputs: vec![12], ..Default::default() },
            22 => randr::GetCrtcInfoReply { ..Default::default() },
        };
        let clone_plan = ClonePlan {
            outputs_to_disable: vec!["DP-1"],
            outputs_to_enable: vec!["eDP-1", "HDMI-1"],
        };

        // Act
        let result = update_crtcs(
            &clone_plan,
            Resolution::new(1280, 1024),
            &modes,
            &outputs,
            &mut crtcs,
        );

        // Assert
        assert!(result.is_ok());
        assert_eq!(crtcs[&20].outputs, [10]);
        assert_eq!(crtcs[&20].mode, 2);
        assert_eq!((crtcs[&20].x, crtcs[&20].y), (0, 0));
        assert_eq!(crtcs[&21].outputs, [11]);
        assert_eq!(crtcs[&21].mode, 2);
        assert_eq!((crtcs[&21].x, crtcs[&21].y), (0, 0));
        assert!(crtcs[&22].outputs.is_empty());
        assert_eq!(crtcs[&22].mode, 0);
    }

    #[test]
    fn update_crtcs_rejects_unsupported_resolution() {
        // Arrange
        let big = mode_info(1, 1920, 1080);
        let modes = hashmap! { 1 => &big };
        let outputs = hashmap! { 10 => output_info("eDP-1", 0, vec![1]) };
        let mut crtcs = hashmap! { 20 => randr::GetCrtcInfoReply { ..Default::default() } };
        let clone_plan = ClonePlan {
            outputs_to_disable: Vec::new(),
            outputs_to_enable: vec!["eDP-1"],
        };

        // Act
        let result = update_crtcs(
            &clone_plan,
            Resolution::new(640, 480),
            &modes,
            &outputs,
            &mut crtcs,
        );

        // Assert
        assert!(matches!(
            result,
            Err(BackendError::UnsupportedResolution { display, resolution })
                if display == "eDP-1" && resolution == "640x480"
        ));
    }

    #[test]
    fn update_crtcs_rejects_unknown_outputs() {
        // Arrange
        let modes = HashMap::new();
        let outputs = HashMap::new();
        let mut crtcs = HashMap::new();
        let clone_plan = ClonePlan {
            outputs_to_disable: Vec::new(),
            outputs_to_enable: vec!["VGA-1"],
        };

        // Act
        let result = update_crtcs(
            &clone_plan,
            Resolution::new(640, 480),
            &modes,
            &outputs,
            &mut crtcs,
        );

        // Assert
        assert!(matches!(result, Err(BackendError::UnknownDisplay(name)) if name == "VGA-1"));
    }

    #[test]
    fn update_crtcs_fails_without_free_crtc() {
        // Arrange
        let small = mode_info(1, 640, 480);
        let modes = hashmap! { 1 => &small };
        let outputs = hashmap! {
            10 => output_info("eDP-1", 20, vec![1]),
            11 => randr::GetOutputInfoReply { crtcs: vec![20], ..output_info("HDMI-1", 0, vec![1]) },
        };
        let mut crtcs = hashmap! {
            20 => randr::GetCrtcInfoReply { mode: 1, outputs: vec![10], ..Default::default() },
        };
        let clone_plan = ClonePlan {
            outputs_to_disable: Vec::new(),
            outputs_to_enable: vec!["eDP-1", "HDMI-1"],
        };

        // Act
        let result = update_crtcs(
            &clone_plan,
            Resolution::new(640, 480),
            &modes,
            &outputs,
            &mut crtcs,
        );

        // Assert
        assert!(matches!(result, Err(BackendError::NoFreeCrtc(name)) if name == "HDMI-1"));
    }

    #[test]
    fn when_no_crtcs_compute_screen_size_returns_none() {
        // Arrange
        let modes = HashMap::new();
        let outputs = HashMap::new();
        let crtcs = HashMap::new();

        // Act
        let size = compute_screen_size(&modes, &outputs, &crtcs);

        // Assert
        assert_eq!(size.ok(), Some(None));
    }

    #[test]
    fn when_crtcs_enabled_compute_screen_size_returns_bbox_size_and_estimated_mm_size() {
        // Arrange
        let mode = mode_info(1, 640, 480);
        let modes = hashmap! {
            1 => &mode
        };
        let outputs = hashmap! {
            10 => randr::GetOutputInfoReply { ..Default::default() },
            11 => randr::GetOutputInfoReply { ..Default::default() },
        };
        let crtcs = hashmap! {
            20 => randr::GetCrtcInfoReply { x: 0, y: 0, mode: 1, outputs: vec!{10}, ..Default::default() },
            21 => randr::GetCrtcInfoReply { x: -10, y: 10, mode: 1, outputs: vec!{11}, ..Default::default() },
        };

        // Act
        let size = compute_screen_size(&modes, &outputs, &crtcs);

        // Assert
        assert_eq!(
            size.ok(),
            Some(Some(ScreenSize {
                width: 650,
                height: 490,
                mm_width: px_to_mm(650),
                mm_height: px_to_mm(490)
            }))
        );
    }

    #[test]
    fn cloned_crtcs_use_largest_physical_size() {
        // Arrange
        let mode = mode_info(1, 1280, 1024);
        let modes = hashmap! {
            1 => &mode
        };
        let outputs = hashmap! {
            10 => randr::GetOutputInfoReply { mm_width: 100, mm_height: 400, ..Default::default() },
            11 => randr::GetOutputInfoReply { mm_width: 200, mm_height: 300, ..Default::default() },
        };
        let crtcs = hashmap! {
            20 => randr::GetCrtcInfoReply { x: 0, y: 0, mode: 1, outputs: vec!{10}, ..Default::default() },
            21 => randr::GetCrtcInfoReply { x: 0, y: 0, mode: 1, outputs: vec!{11}, ..Default::default() },
        };

        // Act
        let size = compute_screen_size(&modes, &outputs, &crtcs);

        // Assert
        assert_eq!(
            size.ok(),
            Some(Some(ScreenSize {
                width: 1280,
                height: 1024,
                mm_width: 200,
                mm_height: 300,
            }))
        );
    }

    #[test]
    fn px_to_mm_test() {
        assert_eq!(px_to_mm(0), 0);
        assert_eq!(px_to_mm(u16::MAX), 17339);
    }
}
