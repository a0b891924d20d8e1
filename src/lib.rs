//! Syncforge - two-camera video sync and finishing pipeline
//!
//! This library crate exposes the controller for integration testing.

pub mod controller;

pub use controller::{BatchRequest, Controller, FileFilter, FilePicker, NoPicker, PresetPicker};
