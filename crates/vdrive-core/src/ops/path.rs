//! Temp directory handlers

use chrono::{DateTime, Utc};

use super::{FsState, Operation};
use crate::error::{FsError, FsResult};
use crate::path::AbsolutePath;
use crate::watcher::RawChange;

/// Highest counter tried by [`GetTempFileName`].
const MAX_TEMP_INDEX: u32 = 0xFFFF;

fn ensure_temp_dir(state: &mut FsState, now: DateTime<Utc>) -> FsResult<AbsolutePath> {
    let temp = state.temp_dir.clone();
    state.mount_share(&temp, now)?;
    let (id, created) = state.tree.create_directories(temp.navigator(), now)?;
    state.emit_all(created.into_iter().map(|p| RawChange::created(p, true)));
    Ok(state.tree.path_of(id).unwrap_or(temp))
}

/// Temp directory, created on first use.
#[derive(Debug)]
pub(crate) struct GetTempPath;

impl Operation for GetTempPath {
    type Output = AbsolutePath;

    const NAME: &'static str = "get_temp_path";

    fn apply(self, state: &mut FsState, now: DateTime<Utc>) -> FsResult<AbsolutePath> {
        ensure_temp_dir(state, now)
    }
}

/// Create the first free `tmpX.tmp` in the temp directory.
#[derive(Debug)]
pub(crate) struct GetTempFileName;

impl Operation for GetTempFileName {
    type Output = AbsolutePath;

    const NAME: &'static str = "get_temp_file_name";

    fn apply(self, state: &mut FsState, now: DateTime<Utc>) -> FsResult<AbsolutePath> {
        let dir = ensure_temp_dir(state, now)?;
        for index in 0..=MAX_TEMP_INDEX {
            let candidate = dir.child(&format!("tmp{index:X}.tmp"));
            if state.tree.lookup(&candidate).is_some() {
                continue;
            }
            state.tree.get_or_create_file(&candidate, false, now)?;
            state.emit(RawChange::created(candidate.clone(), false));
            return Ok(candidate);
        }
        Err(FsError::file_exists(dir.to_string()))
    }
}
