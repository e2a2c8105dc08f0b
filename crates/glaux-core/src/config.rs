//! Compiler and VM configuration.
//!
//! Every field has a default, so a partial configuration file only needs to
//! name the values it changes:
//!
//! ```toml
//! [vm]
//! verbosity = 1
//! gc_threshold = 64
//! ```

use serde::Deserialize;

/// Complete configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Code generation limits
    pub compiler: CompilerConfig,
    /// Interpreter and collector settings
    pub vm: VmConfig,
}

/// Limits applied while generating bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Capacity of the instruction buffer
    pub code_capacity: usize,
    /// Maximum slots in one activation record (slot 0 included)
    pub max_frame_slots: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            code_capacity: 65_535,
            max_frame_slots: 255,
        }
    }
}

/// Interpreter and garbage collector settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Tracing level: 1 traces instructions, 2 adds the operand stack,
    /// 3 adds the frame chain
    pub verbosity: u8,
    /// Maximum operand stack depth
    pub max_operand_stack: usize,
    /// Maximum number of nested activation records
    pub max_call_depth: usize,
    /// Live cell count that triggers the first collection
    pub gc_threshold: usize,
    /// Factor applied to the threshold after every collection
    pub gc_growth_factor: usize,
    /// Collect on every frame teardown regardless of the threshold
    pub gc_stress: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            max_operand_stack: 1_255,
            max_call_depth: 4_096,
            gc_threshold: 25,
            gc_growth_factor: 2,
            gc_stress: false,
        }
    }
}

impl VmConfig {
    /// Returns a copy with the given verbosity.
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Returns a copy that collects on every frame teardown.
    pub fn with_gc_stress(mut self, stress: bool) -> Self {
        self.gc_stress = stress;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.compiler.max_frame_slots, 255);
        assert_eq!(config.vm.gc_threshold, 25);
        assert_eq!(config.vm.gc_growth_factor, 2);
        assert!(!config.vm.gc_stress);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "vm": { "verbosity": 2, "gc_stress": true } }"#).unwrap();
        assert_eq!(config.vm.verbosity, 2);
        assert!(config.vm.gc_stress);
        assert_eq!(config.vm.max_operand_stack, 1_255);
        assert_eq!(config.compiler, CompilerConfig::default());
    }
}
