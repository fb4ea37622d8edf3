//! Ordered "first non-empty success" evaluation of alternative data sources.

use crate::error::Result;
use futures::future::{BoxFuture, FutureExt};
use log::{debug, warn};
use std::future::Future;

type ProviderFn<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, Result<Vec<T>>> + Send + 'a>;

/// One candidate source. Nothing runs until the chain reaches it.
pub struct Provider<'a, T> {
    label: String,
    run: ProviderFn<'a, T>,
}

impl<'a, T: Send + 'a> Provider<'a, T> {
    pub fn new<F, Fut>(label: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<Vec<T>>> + Send + 'a,
    {
        Self {
            label: label.into(),
            run: Box::new(move || f().boxed()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FallbackOutcome<T> {
    pub items: Vec<T>,
    /// Label of the source that produced `items`, `None` when every source came up empty.
    pub source: Option<String>,
    /// Number of sources actually invoked.
    pub attempts: usize,
}

/// Runs providers strictly in order and returns the first non-empty result.
///
/// Failures and empty results move on to the next provider; errors are
/// logged, never returned.
pub async fn first_non_empty<T: Send>(providers: Vec<Provider<'_, T>>) -> FallbackOutcome<T> {
    let mut attempts = 0;

    for provider in providers {
        attempts += 1;
        let Provider { label, run } = provider;

        match run().await {
            Ok(items) if !items.is_empty() => {
                debug!("Source '{}' returned {} records", label, items.len());
                return FallbackOutcome {
                    items,
                    source: Some(label),
                    attempts,
                };
            }
            Ok(_) => debug!("Source '{}' returned no records, trying next", label),
            Err(e) => warn!("Source '{}' failed: {}", label, e),
        }
    }

    FallbackOutcome {
        items: Vec::new(),
        source: None,
        attempts,
    }
}
