// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::BoxError;

/// Loads a value from the source of truth when no cache tier or peer has it.
///
/// The returned bytes are owned by the group from then on, so a getter may
/// hand out buffers it no longer needs without copying them.
pub trait Getter: Send + Sync {
    /// Produces the value for `key`.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Bytes, BoxError>>;
}

/// Adapts an async closure into a [`Getter`].
///
/// # Example
///
/// ```
/// use peercache::GetterFn;
///
/// let getter = GetterFn::new(|key: String| async move {
///     Ok::<_, std::io::Error>(format!("value for {key}").into_bytes())
/// });
/// # let _ = getter;
/// ```
#[derive(Clone)]
pub struct GetterFn<F> {
    func: F,
}

impl<F> GetterFn<F> {
    /// Wraps `func`.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for GetterFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetterFn").finish_non_exhaustive()
    }
}

impl<F, Fut, E> Getter for GetterFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<u8>, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Bytes, BoxError>> {
        let load = (self.func)(key.to_owned());
        Box::pin(async move { load.await.map(Bytes::from).map_err(Into::<BoxError>::into) })
    }
}
