use crate::pipeline::services::image::DescriptorMethod;
use thiserror::Error;
use uuid::Uuid;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Registry Error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Selector Error: {0}")]
    Selector(#[from] SelectorError),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Coordinator Error: {0}")]
    Coordinator(String),
}

// Scene registration errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Scene {0} has an empty display name")]
    EmptyName(Uuid),
    #[error("Scene {0} has no regions to match against")]
    NoRegions(Uuid),
    #[error("Reference image for scene {0} is empty ({1}x{2})")]
    EmptyReference(Uuid, u32, u32),
    #[error("A default scene is already registered: {0}")]
    DuplicateDefault(Uuid),
    #[error("Unknown scene: {0}")]
    UnknownScene(Uuid),
}

// Pass level errors, these abort a whole classification pass
#[derive(Error, Debug)]
pub enum SelectorError {
    #[error("Captured frame is empty ({0}x{1})")]
    EmptyFrame(u32, u32),
    #[error("Failed to prepare frame: {0}")]
    Preparation(String),
}

// Errors raised inside a single scene's matching task, never escape a pass
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Matching task for scene {0} panicked: {1}")]
    Panicked(Uuid, String),
    #[error("Matching task for scene {0} was cancelled")]
    Cancelled(Uuid),
    #[error("Scene {0} reference was described with {1:?}, the scene asks for {2:?}")]
    DescriptorMismatch(Uuid, DescriptorMethod, DescriptorMethod),
}
