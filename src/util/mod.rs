// SPDX-License-Identifier: GPL-3.0-or-later
use std::panic;

use tokio::task::JoinError;

/// Collapse the result of a blocking task into a single [Result].
///
/// Panics within the task are resumed on the current thread instead of being turned into errors.
pub(crate) fn flatten_join_result<T, E, F>(
    join_result: Result<Result<T, E>, JoinError>,
) -> Result<T, F>
where
    F: From<E> + From<JoinError>,
{
    match join_result {
        Ok(inner_result) => Ok(inner_result?),
        Err(join_error) => {
            if join_error.is_panic() {
                panic::resume_unwind(join_error.into_panic());
            } else {
                Err(join_error.into())
            }
        }
    }
}
