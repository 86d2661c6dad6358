//! Cross-module tests for the knowledge engine.
