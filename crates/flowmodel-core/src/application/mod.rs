/// Action registry
pub mod action_registry;

/// Model class registry
pub mod model_class_registry;

/// Live model instances and their parent/child adjacency
pub mod model_instance_registry;

/// Single-flight cache for flow applications
pub mod apply_flow_cache;

/// Sequential step execution
pub mod flow_execution_service;

/// Engine facade
pub mod flow_engine;
