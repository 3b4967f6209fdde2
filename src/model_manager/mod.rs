// invokeai-bridge/src/model_manager/mod.rs

pub mod types;
pub mod model_scanner;
pub mod pickle_scan;

pub use types::{
    Model,
    ModelType,
};

pub use model_scanner::{
    list_models,
    get_model,
    matches_wildcard,
};

pub use pickle_scan::{
    ModelVerifier,
    PickleScanVerifier,
    ScanPartition,
    ScanVerdict,
    verify_models_with_pseudo_hash,
};
