//! Small helpers shared by the phase modules for the pipeline's atomic-ish
//! JSON artifact reads/writes.

use crate::error::PipelineError;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, PipelineError> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

pub fn write_json(path: &str, value: &impl Serialize) -> Result<(), PipelineError> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}
