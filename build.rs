use anyhow::Result;
use vergen_gix::{BuildBuilder, Emitter, GixBuilder};

// Emits VERGEN_BUILD_TIMESTAMP, VERGEN_GIT_SHA and VERGEN_GIT_BRANCH for `--version`.
// Outside a git checkout vergen falls back to placeholder values instead of failing.
fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=build.rs");

    let build = BuildBuilder::default().build_timestamp(true).build()?;
    let git = GixBuilder::default().sha(true).branch(true).build()?;

    Emitter::default()
        .add_instructions(&build)?
        .add_instructions(&git)?
        .emit()
}
