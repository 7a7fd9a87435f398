use log::error;

/// "Operation in progress" flag
///
/// Set on entry to every state-changing engine operation and cleared on
/// exit; a nested entry fails with `InvalidState`.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: bool,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, operation: &str) -> crate::Result<()> {
        if self.entered {
            error!("reentrant call into {}", operation);
            return Err(crate::Error::InvalidState(format!(
                "reentrant call into {}",
                operation
            )));
        }
        self.entered = true;
        Ok(())
    }

    pub fn exit(&mut self) {
        self.entered = false;
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }
}
