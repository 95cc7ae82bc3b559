//! Lifecycle enumerations of a scheduler job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, not evaluated yet.
    #[default]
    Idle,
    /// Being evaluated by the scheduler.
    Evaluation,
    /// Has a start time.
    Scheduled,
    /// Running.
    Busy,
    /// Failed and needs a reset.
    Error,
    /// Stopped by a transient problem, eligible again.
    Aborted,
    /// Misconfigured and needs a reset.
    Invalid,
    /// Done.
    Complete,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Idle => "Idle",
            JobStatus::Evaluation => "Evaluating",
            JobStatus::Scheduled => "Scheduled",
            JobStatus::Busy => "Running",
            JobStatus::Error => "Error",
            JobStatus::Aborted => "Aborted",
            JobStatus::Invalid => "Invalid",
            JobStatus::Complete => "Complete",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a busy job. Only meaningful while the status is [`JobStatus::Busy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    #[default]
    Idle,
    Slewing,
    SlewComplete,
    Focusing,
    FocusComplete,
    Aligning,
    AlignComplete,
    Reslewing,
    ReslewingComplete,
    PostAlignFocusing,
    PostAlignFocusingComplete,
    Guiding,
    GuidingComplete,
    Capturing,
    Complete,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Idle => "Idle",
            JobStage::Slewing => "Slewing",
            JobStage::SlewComplete => "Slew complete",
            JobStage::Focusing | JobStage::PostAlignFocusing => "Focusing",
            JobStage::FocusComplete | JobStage::PostAlignFocusingComplete => "Focus complete",
            JobStage::Aligning => "Aligning",
            JobStage::AlignComplete => "Align complete",
            JobStage::Reslewing => "Repositioning",
            JobStage::ReslewingComplete => "Repositioning complete",
            JobStage::Guiding => "Guiding",
            JobStage::GuidingComplete => "Guiding complete",
            JobStage::Capturing => "Capturing",
            JobStage::Complete => "Complete",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a job may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupCondition {
    /// As soon as constraints allow.
    #[default]
    Asap,
    /// At the job's startup time.
    At,
}

impl fmt::Display for StartupCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StartupCondition::Asap => "ASAP",
            StartupCondition::At => "AT",
        })
    }
}

/// When a job is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionCondition {
    /// After one pass of the capture sequence.
    #[default]
    Sequence,
    /// After a fixed number of sequence repeats.
    Repeat,
    /// Never, until stopped.
    Loop,
    /// At the job's completion time.
    At,
}

impl fmt::Display for CompletionCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompletionCondition::Sequence => "FINISH",
            CompletionCondition::Repeat => "REPEAT",
            CompletionCondition::Loop => "LOOP",
            CompletionCondition::At => "AT",
        })
    }
}

/// One preparation step run before capturing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStep {
    Track,
    Focus,
    Align,
    Guide,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 4] = [
        PipelineStep::Track,
        PipelineStep::Focus,
        PipelineStep::Align,
        PipelineStep::Guide,
    ];

    fn bit(self) -> u8 {
        match self {
            PipelineStep::Track => 1 << 0,
            PipelineStep::Focus => 1 << 1,
            PipelineStep::Align => 1 << 2,
            PipelineStep::Guide => 1 << 3,
        }
    }
}

/// Set of preparation steps of a job.
///
/// Serialised as the list of enabled steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<PipelineStep>", into = "Vec<PipelineStep>")]
pub struct StepPipeline(u8);

impl StepPipeline {
    pub const NONE: StepPipeline = StepPipeline(0);
    pub const TRACK: StepPipeline = StepPipeline(1 << 0);
    pub const FOCUS: StepPipeline = StepPipeline(1 << 1);
    pub const ALIGN: StepPipeline = StepPipeline(1 << 2);
    pub const GUIDE: StepPipeline = StepPipeline(1 << 3);

    pub fn contains(&self, step: PipelineStep) -> bool {
        self.0 & step.bit() != 0
    }

    pub fn insert(&mut self, step: PipelineStep) {
        self.0 |= step.bit();
    }

    pub fn remove(&mut self, step: PipelineStep) {
        self.0 &= !step.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn steps(&self) -> impl Iterator<Item = PipelineStep> + '_ {
        PipelineStep::ALL.into_iter().filter(|s| self.contains(*s))
    }
}

impl BitOr for StepPipeline {
    type Output = StepPipeline;

    fn bitor(self, rhs: Self) -> Self::Output {
        StepPipeline(self.0 | rhs.0)
    }
}

impl BitOrAssign for StepPipeline {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<PipelineStep> for StepPipeline {
    fn from(step: PipelineStep) -> Self {
        StepPipeline(step.bit())
    }
}

impl From<Vec<PipelineStep>> for StepPipeline {
    fn from(steps: Vec<PipelineStep>) -> Self {
        steps
            .into_iter()
            .fold(StepPipeline::NONE, |acc, s| acc | s.into())
    }
}

impl From<StepPipeline> for Vec<PipelineStep> {
    fn from(pipeline: StepPipeline) -> Self {
        pipeline.steps().collect()
    }
}
