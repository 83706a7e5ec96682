pub mod service;

pub use service::{
    load_result, CancelRunResponse, RunRequest, RunService, RunSnapshot, RunStatus,
};
