//! Decompiler configuration and recovery passes.
//!
//! This module provides configuration options for controlling which
//! recovery passes run and how their results are rendered.

use std::collections::HashSet;

use super::stack_slots::DEFAULT_SLOT_PREFIX;

/// Symbol of the stack protector failure routine.
pub const STACK_CHK_FAIL_PLT: &str = "__stack_chk_fail@plt";

/// How many instructions before the guard-failure call are searched for the
/// canary reload.
pub const CANARY_SCAN_WINDOW: usize = 3;

/// Suffix appended to the canary slot's name.
pub const CANARY_SUFFIX: &str = "_canary";

/// Optimization level presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationLevel {
    /// No recovery - raw structured output.
    None,
    /// Condition fusion only.
    Basic,
    /// All recovery passes (default level).
    #[default]
    Standard,
}

impl OptimizationLevel {
    /// Parses an optimization level from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "0" | "o0" => Some(Self::None),
            "basic" | "1" | "o1" => Some(Self::Basic),
            "standard" | "2" | "o2" | "default" => Some(Self::Standard),
            _ => None,
        }
    }

    /// Returns the numeric level (0-2).
    pub fn level(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Basic => 1,
            Self::Standard => 2,
        }
    }
}

/// Recovery passes, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryPass {
    /// Attach comparisons to the conditionals that consume them.
    ConditionFusion,
    /// Name frame-relative locals.
    StackSlots,
    /// Label the stack protector slot.
    CanaryGuard,
}

impl RecoveryPass {
    /// Returns all passes in pipeline order.
    pub fn all() -> &'static [RecoveryPass] {
        use RecoveryPass::*;
        &[ConditionFusion, StackSlots, CanaryGuard]
    }

    /// Returns the name of the pass.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConditionFusion => "condition-fusion",
            Self::StackSlots => "stack-slots",
            Self::CanaryGuard => "canary-guard",
        }
    }

    /// Returns a description of the pass.
    pub fn description(&self) -> &'static str {
        match self {
            Self::ConditionFusion => "Fuse compare instructions into conditionals",
            Self::StackSlots => "Recover stack variables from frame accesses",
            Self::CanaryGuard => "Label the stack protector canary slot",
        }
    }

    /// Parses a pass name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().replace('_', "-").as_str() {
            "condition-fusion" | "fusion" => Some(Self::ConditionFusion),
            "stack-slots" | "slots" => Some(Self::StackSlots),
            "canary-guard" | "canary" => Some(Self::CanaryGuard),
            _ => None,
        }
    }
}

/// Settings of the canary guard pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanaryConfig {
    /// Symbol whose call marks the failed canary check.
    pub guard_symbol: String,
    /// Number of instructions searched backwards from the call.
    pub scan_window: usize,
    /// Suffix appended to the matched slot.
    pub suffix: String,
    /// Also accept `mov reg, [fp - disp]` reloads, not only stores.
    pub match_loads: bool,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            guard_symbol: STACK_CHK_FAIL_PLT.to_string(),
            scan_window: CANARY_SCAN_WINDOW,
            suffix: CANARY_SUFFIX.to_string(),
            match_loads: false,
        }
    }
}

/// Configuration for the decompiler passes and output.
#[derive(Debug, Clone)]
pub struct DecompilerConfig {
    /// The base optimization level.
    pub level: OptimizationLevel,
    /// Explicitly enabled passes (override level).
    pub enabled_passes: HashSet<RecoveryPass>,
    /// Explicitly disabled passes (override level).
    pub disabled_passes: HashSet<RecoveryPass>,
    /// Emit comment nodes and instruction echo comments.
    pub comments: bool,
    /// Color jump targets with ANSI escapes.
    pub colors: bool,
    /// Indentation unit.
    pub indent: String,
    /// Prefix of synthetic slot names.
    pub slot_prefix: String,
    /// Canary guard settings.
    pub canary: CanaryConfig,
}

impl Default for DecompilerConfig {
    fn default() -> Self {
        Self::new(OptimizationLevel::Standard)
    }
}

impl DecompilerConfig {
    /// Creates a new configuration with the specified optimization level.
    pub fn new(level: OptimizationLevel) -> Self {
        Self {
            level,
            enabled_passes: HashSet::new(),
            disabled_passes: HashSet::new(),
            comments: true,
            colors: false,
            indent: "    ".to_string(),
            slot_prefix: DEFAULT_SLOT_PREFIX.to_string(),
            canary: CanaryConfig::default(),
        }
    }

    /// Creates a configuration with no recovery.
    pub fn none() -> Self {
        Self::new(OptimizationLevel::None)
    }

    /// Creates a configuration with condition fusion only.
    pub fn basic() -> Self {
        Self::new(OptimizationLevel::Basic)
    }

    /// Creates a configuration with all recovery passes.
    pub fn standard() -> Self {
        Self::new(OptimizationLevel::Standard)
    }

    /// Explicitly enables a pass.
    pub fn enable_pass(mut self, pass: RecoveryPass) -> Self {
        self.enabled_passes.insert(pass);
        self.disabled_passes.remove(&pass);
        self
    }

    /// Explicitly disables a pass.
    pub fn disable_pass(mut self, pass: RecoveryPass) -> Self {
        self.disabled_passes.insert(pass);
        self.enabled_passes.remove(&pass);
        self
    }

    /// Enables or disables comment output.
    pub fn with_comments(mut self, comments: bool) -> Self {
        self.comments = comments;
        self
    }

    /// Enables or disables colored jump targets.
    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    /// Replaces the canary settings.
    pub fn with_canary(mut self, canary: CanaryConfig) -> Self {
        self.canary = canary;
        self
    }

    /// Checks if a pass is enabled.
    pub fn is_pass_enabled(&self, pass: RecoveryPass) -> bool {
        if self.enabled_passes.contains(&pass) {
            return true;
        }
        if self.disabled_passes.contains(&pass) {
            return false;
        }

        self.pass_enabled_at_level(pass)
    }

    fn pass_enabled_at_level(&self, pass: RecoveryPass) -> bool {
        match self.level {
            OptimizationLevel::None => false,
            OptimizationLevel::Basic => pass == RecoveryPass::ConditionFusion,
            OptimizationLevel::Standard => true,
        }
    }

    /// Returns all enabled passes in the order they run.
    pub fn enabled_passes(&self) -> Vec<RecoveryPass> {
        RecoveryPass::all()
            .iter()
            .copied()
            .filter(|&p| self.is_pass_enabled(p))
            .collect()
    }

    /// Lists all passes with their enabled status.
    pub fn list_passes(&self) -> Vec<(RecoveryPass, bool, &'static str)> {
        RecoveryPass::all()
            .iter()
            .map(|&p| (p, self.is_pass_enabled(p), p.description()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimization_level_parse() {
        assert_eq!(OptimizationLevel::parse("none"), Some(OptimizationLevel::None));
        assert_eq!(OptimizationLevel::parse("0"), Some(OptimizationLevel::None));
        assert_eq!(OptimizationLevel::parse("basic"), Some(OptimizationLevel::Basic));
        assert_eq!(
            OptimizationLevel::parse("standard"),
            Some(OptimizationLevel::Standard)
        );
        assert_eq!(OptimizationLevel::parse("aggressive"), None);
    }

    #[test]
    fn test_config_default() {
        let config = DecompilerConfig::default();
        assert_eq!(config.level, OptimizationLevel::Standard);
        assert_eq!(config.enabled_passes(), RecoveryPass::all().to_vec());
        assert!(config.comments);
        assert!(!config.colors);
        assert_eq!(config.slot_prefix, "var");
        assert_eq!(config.canary.guard_symbol, "__stack_chk_fail@plt");
        assert_eq!(config.canary.scan_window, 3);
        assert_eq!(config.canary.suffix, "_canary");
    }

    #[test]
    fn test_basic_runs_fusion_only() {
        let config = DecompilerConfig::basic();
        assert_eq!(config.enabled_passes(), vec![RecoveryPass::ConditionFusion]);
    }

    #[test]
    fn test_explicit_enable_and_disable() {
        let config = DecompilerConfig::none().enable_pass(RecoveryPass::StackSlots);
        assert_eq!(config.enabled_passes(), vec![RecoveryPass::StackSlots]);

        let config = DecompilerConfig::standard().disable_pass(RecoveryPass::CanaryGuard);
        assert!(!config.is_pass_enabled(RecoveryPass::CanaryGuard));
        assert!(config.is_pass_enabled(RecoveryPass::StackSlots));
    }

    #[test]
    fn test_pass_names_round_trip() {
        for pass in RecoveryPass::all() {
            assert_eq!(RecoveryPass::from_name(pass.name()), Some(*pass));
        }
        assert_eq!(RecoveryPass::from_name("stack_slots"), Some(RecoveryPass::StackSlots));
        assert_eq!(RecoveryPass::from_name("bogus"), None);
    }
}
