//! An ordered, mutation-free transform chain. Events (or other values) pass through every
//! registered interceptor before they are used; hosts register interceptors to enrich or scrub
//! payloads without touching the core.
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Boxed future returned by interceptors.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A single transform in the chain. Receives the value by ownership and returns the (possibly
/// replaced) value; interceptors never observe each other's intermediate state except through
/// the value itself.
pub trait Interceptor<T>: Send + Sync {
    fn transform(&self, value: T) -> BoxFuture<T>;
}

impl<T, F> Interceptor<T> for F
where
    F: Fn(T) -> BoxFuture<T> + Send + Sync,
{
    fn transform(&self, value: T) -> BoxFuture<T> {
        self(value)
    }
}

/// Handle returned by [`InterceptorPipeline::register`], used to unregister later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorHandle(u64);

/// Ordered chain of interceptors with snapshot isolation.
///
/// `run` executes interceptors strictly in registration order against a snapshot taken when the
/// run starts: registering or unregistering during an in-flight run affects subsequent runs
/// only. Concurrent runs race independently; there is no cross-run ordering guarantee.
pub struct InterceptorPipeline<T> {
    interceptors: RwLock<Vec<(u64, Arc<dyn Interceptor<T>>)>>,
    next_id: AtomicU64,
}

impl<T> Default for InterceptorPipeline<T> {
    fn default() -> Self {
        InterceptorPipeline {
            interceptors: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T: Send + 'static> InterceptorPipeline<T> {
    pub fn new() -> Self {
        InterceptorPipeline::default()
    }

    /// Append an interceptor to the end of the chain.
    pub fn register(&self, interceptor: Arc<dyn Interceptor<T>>) -> InterceptorHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut interceptors = self
            .interceptors
            .write()
            .expect("thread holding interceptor lock should not panic");
        interceptors.push((id, interceptor));
        InterceptorHandle(id)
    }

    /// Convenience for synchronous transforms.
    pub fn register_fn(
        &self,
        f: impl Fn(T) -> T + Send + Sync + 'static,
    ) -> InterceptorHandle {
        self.register(Arc::new(move |value: T| {
            let value = f(value);
            Box::pin(std::future::ready(value)) as BoxFuture<T>
        }))
    }

    /// Remove a previously registered interceptor. Returns `false` if the handle was already
    /// unregistered.
    pub fn unregister(&self, handle: InterceptorHandle) -> bool {
        let mut interceptors = self
            .interceptors
            .write()
            .expect("thread holding interceptor lock should not panic");
        let before = interceptors.len();
        interceptors.retain(|(id, _)| *id != handle.0);
        interceptors.len() != before
    }

    /// Run the value through the chain. With zero interceptors registered, the input is returned
    /// untouched.
    pub async fn run(&self, value: T) -> T {
        let snapshot: Vec<Arc<dyn Interceptor<T>>> = {
            let interceptors = self
                .interceptors
                .read()
                .expect("thread holding interceptor lock should not panic");
            interceptors.iter().map(|(_, i)| Arc::clone(i)).collect()
        };

        let mut value = value;
        for interceptor in snapshot {
            value = interceptor.transform(value).await;
        }
        value
    }
}
