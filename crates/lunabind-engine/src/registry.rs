//! Function registry
//!
//! Registered host functions are owned here and addressed by an opaque
//! [`FunctionHandle`]. The runtime only ever holds handles, captured by the
//! trampolines the bridge installs.
//!
//! Copy-on-write: writers serialize on a mutex, clone the current map,
//! modify the clone and publish it as a new snapshot with an atomic swap.
//! Readers load the current snapshot `Arc` without taking a lock.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::descriptor::TypeDescriptor;
use crate::error::{Error, Result};
use crate::function::{Callable, HostFunction, Invocation};

// ============================================================================
// Names
// ============================================================================

/// Dotted function path: `a.b.c` is `c` inside table `b` inside global `a`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionPath {
    namespace: Vec<String>,
    leaf: String,
}

impl FunctionPath {
    /// Split and validate a dotted name
    pub fn parse(name: &str) -> Result<Self> {
        let mut segments: Vec<String> = name.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(Error::InvalidName(name.to_string()));
        }
        let leaf = segments.pop().ok_or_else(|| Error::InvalidName(name.to_string()))?;
        Ok(Self {
            namespace: segments,
            leaf,
        })
    }

    /// Enclosing tables, outermost first
    pub fn namespace(&self) -> &[String] {
        &self.namespace
    }

    /// Final segment
    pub fn leaf(&self) -> &str {
        &self.leaf
    }
}

impl fmt::Display for FunctionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.namespace {
            write!(f, "{}.", segment)?;
        }
        f.write_str(&self.leaf)
    }
}

/// Opaque identifier of a registered function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionHandle(u64);

impl FunctionHandle {
    /// Raw id
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Descriptors
// ============================================================================

/// A registered function: name, signature and body
pub struct FunctionDescriptor {
    handle: FunctionHandle,
    name: String,
    path: FunctionPath,
    params: Vec<TypeDescriptor>,
    returns: Vec<TypeDescriptor>,
    callable: Callable,
}

impl FunctionDescriptor {
    /// Registry handle
    pub fn handle(&self) -> FunctionHandle {
        self.handle
    }

    /// Full dotted name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enclosing tables
    pub fn namespace(&self) -> &[String] {
        self.path.namespace()
    }

    /// Final name segment
    pub fn leaf(&self) -> &str {
        self.path.leaf()
    }

    /// Parsed path
    pub fn path(&self) -> &FunctionPath {
        &self.path
    }

    /// Parameter descriptors
    pub fn params(&self) -> &[TypeDescriptor] {
        &self.params
    }

    /// Return value descriptors
    pub fn returns(&self) -> &[TypeDescriptor] {
        &self.returns
    }

    /// Declared argument count
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Run the body
    pub fn invoke(&self, invocation: &mut Invocation<'_>) -> Result<()> {
        (self.callable)(invocation)
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// Immutable registry view, keyed by handle
pub type Snapshot = Arc<FxHashMap<FunctionHandle, Arc<FunctionDescriptor>>>;

// ============================================================================
// Registry
// ============================================================================

/// Thread-safe store of registered host functions
pub struct FunctionRegistry {
    /// Last issued handle id; held for the whole write
    writer: Mutex<u64>,
    snapshot: ArcSwap<FxHashMap<FunctionHandle, Arc<FunctionDescriptor>>>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            writer: Mutex::new(0),
            snapshot: ArcSwap::from_pointee(FxHashMap::default()),
        }
    }

    /// Store `function` under the dotted `name`
    pub fn register(&self, name: &str, function: HostFunction) -> Result<FunctionHandle> {
        let path = FunctionPath::parse(name)?;
        if function.is_variadic() {
            return Err(Error::VariadicFunction(name.to_string()));
        }

        let (params, returns, callable) = function.into_parts();
        let mut last_id = self.writer.lock();
        *last_id += 1;
        let handle = FunctionHandle(*last_id);

        let descriptor = FunctionDescriptor {
            handle,
            name: name.to_string(),
            path,
            params,
            returns,
            callable,
        };

        let mut map = (*self.snapshot()).clone();
        map.insert(handle, Arc::new(descriptor));
        self.snapshot.store(Arc::new(map));

        debug!(%handle, name, "registered function");
        Ok(handle)
    }

    /// Descriptor for `handle`
    pub fn get(&self, handle: FunctionHandle) -> Option<Arc<FunctionDescriptor>> {
        self.snapshot.load().get(&handle).cloned()
    }

    /// Drop the function behind `handle`
    pub fn remove(&self, handle: FunctionHandle) -> Option<Arc<FunctionDescriptor>> {
        let _writer = self.writer.lock();
        let current = self.snapshot();
        if !current.contains_key(&handle) {
            return None;
        }
        let mut map = (*current).clone();
        let removed = map.remove(&handle);
        self.snapshot.store(Arc::new(map));
        debug!(%handle, "removed function");
        removed
    }

    /// Most recently registered function named `name`
    pub fn lookup(&self, name: &str) -> Option<Arc<FunctionDescriptor>> {
        self.snapshot()
            .values()
            .filter(|d| d.name() == name)
            .max_by_key(|d| d.handle())
            .cloned()
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    /// Check for an empty registry
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every handle, in registration order
    pub fn handles(&self) -> Vec<FunctionHandle> {
        let mut handles: Vec<_> = self.snapshot().keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    /// Current immutable view of the registry
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.load_full()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.len())
            .finish()
    }
}
