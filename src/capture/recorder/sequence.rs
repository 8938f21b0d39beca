use crate::capture::errors::RecorderError;

/// Configuration stages in the order a recorder accepts them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigStage {
    Camera,
    Sources,
    Format,
    Output,
    Encoding,
    Preview,
}

/// Tracks how far a recorder's configuration has progressed and refuses calls
/// that would go back to an earlier stage.
#[derive(Debug, Clone, Default)]
pub struct ConfigSequence {
    stage: Option<ConfigStage>,
    output_file_set: bool,
}

impl ConfigSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Option<ConfigStage> {
        self.stage
    }

    pub fn advance(&mut self, stage: ConfigStage, call: &str) -> Result<(), RecorderError> {
        if let Some(current) = self.stage {
            if stage < current {
                return Err(RecorderError::IllegalState(format!(
                    "{} called after {:?} stage",
                    call, current
                )));
            }
        }

        let reached = self.stage.unwrap_or(ConfigStage::Camera);
        if stage == ConfigStage::Format && reached < ConfigStage::Sources {
            return Err(RecorderError::IllegalState(format!(
                "{} called before sources were set",
                call
            )));
        }
        if stage > ConfigStage::Format && reached < ConfigStage::Format {
            return Err(RecorderError::IllegalState(format!(
                "{} called before output format",
                call
            )));
        }

        self.stage = Some(stage);
        Ok(())
    }

    pub fn mark_output_file(&mut self) {
        self.output_file_set = true;
    }

    /// Checks that everything `prepare` needs is in place.
    pub fn check_ready(&self) -> Result<(), RecorderError> {
        if !self.output_file_set {
            return Err(RecorderError::IllegalState("output file not set".to_string()));
        }
        match self.stage {
            Some(stage) if stage >= ConfigStage::Encoding => Ok(()),
            _ => Err(RecorderError::IllegalState(
                "encoder parameters not set".to_string(),
            )),
        }
    }
}
