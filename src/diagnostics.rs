/// Warnings and progress notes raised while dispatching an action.
///
/// Everything is forwarded to the `log` facade. Test builds also keep the
/// warnings, so tests can check them without capturing log output.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    #[cfg(test)]
    warnings: Vec<String>,
}

impl Diagnostics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn warn(&mut self, message: String) {
        log::warn!("{message}");
        #[cfg(test)]
        self.warnings.push(message);
    }

    pub(crate) fn info(&self, message: &str) {
        log::info!("{message}");
    }

    #[cfg(test)]
    pub(crate) fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
