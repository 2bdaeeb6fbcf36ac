/// Action definitions and registration forms
pub mod action;

/// Execution context handed to step handlers
pub mod context;

/// Flow definitions
pub mod flow_definition;

/// Model instances and creation options
pub mod model;

/// Model classes and their flow tables
pub mod model_class;

/// Repository interfaces
pub mod repository;

/// Steps and step handlers
pub mod step;
