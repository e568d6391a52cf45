//! Configuration and on-disk replay bundles

pub mod bundle;
pub mod schema;

pub use bundle::{
    read_manifest, read_raw_capture, read_script, verify_blobs, write_bundle, write_raw_capture,
    BundleError,
};
pub use schema::{ReplayConfig, ReplayManifest};
