//! Idea-to-deployment automation for the Cursor editor.
//!
//! autoforge takes a structured application idea, drives a Cursor instance to
//! build it through sentinel-file signaling, tracks what the editor writes,
//! materializes the tracked files into a project directory, and deploys the
//! result to the requested hosting targets. It runs either as a one-shot CLI
//! pipeline or as a long-lived HTTP job service.

pub mod config;
pub mod controller;
pub mod deploy;
pub mod events;
pub mod idea;
pub mod orchestrator;
pub mod prompt;
pub mod service;
pub mod status;
pub mod tracker;
