//! Cross-module tests for the wire encoding.
