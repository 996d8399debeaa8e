//! The fixed sequence of stages every request passes through.

use serde::Serialize;
use std::fmt;

/// One named phase of request processing, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LifecycleStage {
    RequestInit,
    ActionBeanResolution,
    HandlerResolution,
    BindingAndValidation,
    CustomValidation,
    EventHandling,
    ResolutionExecution,
    RequestComplete,
}

impl LifecycleStage {
    pub const ALL: [LifecycleStage; 8] = [
        LifecycleStage::RequestInit,
        LifecycleStage::ActionBeanResolution,
        LifecycleStage::HandlerResolution,
        LifecycleStage::BindingAndValidation,
        LifecycleStage::CustomValidation,
        LifecycleStage::EventHandling,
        LifecycleStage::ResolutionExecution,
        LifecycleStage::RequestComplete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStage::RequestInit => "RequestInit",
            LifecycleStage::ActionBeanResolution => "ActionBeanResolution",
            LifecycleStage::HandlerResolution => "HandlerResolution",
            LifecycleStage::BindingAndValidation => "BindingAndValidation",
            LifecycleStage::CustomValidation => "CustomValidation",
            LifecycleStage::EventHandling => "EventHandling",
            LifecycleStage::ResolutionExecution => "ResolutionExecution",
            LifecycleStage::RequestComplete => "RequestComplete",
        }
    }

    /// The stage that follows this one, `None` after `RequestComplete`.
    pub fn next(&self) -> Option<LifecycleStage> {
        let position = Self::ALL.iter().position(|stage| stage == self)?;
        Self::ALL.get(position + 1).copied()
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
