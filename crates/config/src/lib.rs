//! Flow definition files: schema, loading, and structural checks.
//!
//! Flows are written as `.toml`, `.yaml`/`.yml` or `.json`. Every string may
//! carry `${ENV_VAR}` or `${ENV_VAR:-fallback}` placeholders, expanded before
//! parsing.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{FlowFormat, load_flow, parse_flow},
    schema::{
        ConditionConfig, FlowConfig, ProgressConfig, StepConfig, StepKindConfig,
        TimeoutWarningConfig, TransformConfig, ValidatorConfig,
    },
    validate::{Diagnostic, FlowReport, Severity, check_flow, check_flow_file},
};
