use std::fmt;

use thiserror::Error;

/// The step of the per-frame state machine that failed. Every step is
/// fatal; the stage only makes the failure point explicit in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    FenceWait,
    Acquire,
    Record,
    Submit,
    Present,
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameStage::FenceWait => "fence wait",
            FrameStage::Acquire => "acquire",
            FrameStage::Record => "record",
            FrameStage::Submit => "submit",
            FrameStage::Present => "present",
        };
        f.write_str(name)
    }
}

/// Top-level failure taxonomy. Nothing is retried or recovered locally:
/// both kinds propagate to the application handler, get logged once, and
/// terminate the process.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("setup failed: {cause:#}")]
    Setup { cause: anyhow::Error },

    #[error("frame failed during {stage}: {cause:#}")]
    Frame {
        stage: FrameStage,
        cause: anyhow::Error,
    },
}

impl FatalError {
    pub fn setup(cause: anyhow::Error) -> Self {
        FatalError::Setup { cause }
    }

    pub fn frame(stage: FrameStage, cause: anyhow::Error) -> Self {
        FatalError::Frame { stage, cause }
    }
}

/// Tags every error in a fallible frame step with its stage.
pub trait FrameStageExt<T> {
    fn stage(self, stage: FrameStage) -> Result<T, FatalError>;
}

impl<T> FrameStageExt<T> for anyhow::Result<T> {
    fn stage(self, stage: FrameStage) -> Result<T, FatalError> {
        self.map_err(|e| FatalError::frame(stage, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_and_frame_errors_are_distinguishable() {
        let setup = FatalError::setup(anyhow::anyhow!("no suitable device"));
        let frame = FatalError::frame(FrameStage::Acquire, anyhow::anyhow!("device lost"));

        assert!(setup.to_string().starts_with("setup failed"));
        assert!(frame.to_string().contains("during acquire"));
    }

    #[test]
    fn frame_stage_names_every_step() {
        let stages = [
            FrameStage::FenceWait,
            FrameStage::Acquire,
            FrameStage::Record,
            FrameStage::Submit,
            FrameStage::Present,
        ];
        let names: Vec<String> = stages.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            ["fence wait", "acquire", "record", "submit", "present"]
        );
    }

    #[test]
    fn stage_ext_tags_errors() {
        let res: anyhow::Result<()> = Err(anyhow::anyhow!("timeout"));
        let err = res.stage(FrameStage::Present).unwrap_err();
        match err {
            FatalError::Frame { stage, .. } => assert_eq!(stage, FrameStage::Present),
            _ => panic!("expected frame error"),
        }
    }
}
