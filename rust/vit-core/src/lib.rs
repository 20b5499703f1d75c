//! Core types for the ViT image classifier.
//!
//! This crate provides the model configuration and presets, the parameter
//! layout of the classifier, and the adaptation of foreign pretrained
//! checkpoints onto that layout: key renaming, classifier-head shape
//! reconciliation and positional-embedding grid resampling.

mod adapter;
pub mod checkpoint;
mod config;
mod error;
mod init;
mod model;
mod params;
mod reconcile;
mod remap;
mod resample;

pub use adapter::{AdaptReport, CheckpointAdapter, SpecialOutcome, adapt};
pub use config::{Classifier, ModelSummary, Preset, ViTConfig};
pub use error::{Error, Result};
pub use init::{Init, xavier_bound};
pub use model::VisionTransformer;
pub use params::{ParamMap, ParamStore};
pub use reconcile::{
    HEAD_BIAS, HEAD_WEIGHT, Outcome, POS_EMBED, SpecialKey, reconcile_head, reconcile_pos_embed,
};
pub use remap::{KeyRemapper, Remapped, RenamedParams};
pub use resample::{grid_side, resample_pos_embed};
