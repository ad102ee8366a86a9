//! Function bridge
//!
//! A [`Bridge`] owns one runtime instance and exposes host functions to it.
//! Each function goes through three states:
//!
//! ```text
//! HostFunction --register--> FunctionDescriptor (registry)
//!              --bind-----> trampoline under its dotted name (runtime)
//! ```
//!
//! The trampoline captures only the function handle and the bridge's shared
//! settings. On every call it looks the handle up, checks the argument
//! count, decodes the arguments against the registered descriptors, runs the
//! body and checks the number of pushed results.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use lunabind_sdk::{native_function, ApiError, LuaApi, LuaType, NativeFunction};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::function::{FromReturns, HostFunction, IntoArguments, IntoHostFunction, Invocation};
use crate::options::{BridgeOptions, DecodeOptions, FieldPolicy};
use crate::registry::{FunctionDescriptor, FunctionHandle, FunctionPath, FunctionRegistry};

/// State shared between a bridge and the trampolines it installed
struct Shared {
    registry: Arc<FunctionRegistry>,
    options: Cell<BridgeOptions>,
}

/// A runtime instance with host functions bound into it
pub struct Bridge<S: LuaApi> {
    state: S,
    shared: Rc<Shared>,
}

impl<S: LuaApi> Bridge<S> {
    /// Wrap `state` with a fresh registry
    pub fn new(state: S) -> Self {
        Self::with_registry(state, Arc::new(FunctionRegistry::new()))
    }

    /// Wrap `state`, resolving handles through a shared `registry`
    pub fn with_registry(state: S, registry: Arc<FunctionRegistry>) -> Self {
        Self {
            state,
            shared: Rc::new(Shared {
                registry,
                options: Cell::new(BridgeOptions::default()),
            }),
        }
    }

    /// Current options
    pub fn options(&self) -> BridgeOptions {
        self.shared.options.get()
    }

    /// Replace the options; applies to every later call, including calls
    /// into functions bound earlier
    pub fn set_options(&mut self, options: BridgeOptions) {
        self.shared.options.set(options);
    }

    /// Switch between strict and lenient struct decoding
    pub fn set_field_policy(&mut self, policy: FieldPolicy) {
        let mut options = self.options();
        options.decode.unknown_fields = policy;
        self.set_options(options);
    }

    /// Registry backing this bridge
    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.shared.registry
    }

    /// The runtime
    pub fn state(&self) -> &S {
        &self.state
    }

    /// The runtime, mutably
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Consume the bridge, returning the runtime. Bound functions keep
    /// working as long as the runtime holds them.
    pub fn into_state(self) -> S {
        self.state
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register `f` under the dotted `name` and bind it into the runtime
    pub fn register_function<M, F>(&mut self, name: &str, f: F) -> Result<FunctionHandle>
    where
        F: IntoHostFunction<M>,
    {
        self.register_host_function(name, HostFunction::wrap(f))
    }

    /// Register an already wrapped function and bind it
    pub fn register_host_function(
        &mut self,
        name: &str,
        function: HostFunction,
    ) -> Result<FunctionHandle> {
        let handle = self.shared.registry.register(name, function)?;
        if let Err(err) = self.bind(handle) {
            self.shared.registry.remove(handle);
            return Err(err);
        }
        Ok(handle)
    }

    /// Register and bind several functions, stopping at the first failure
    pub fn register_functions<I>(&mut self, functions: I) -> Result<Vec<FunctionHandle>>
    where
        I: IntoIterator<Item = (String, HostFunction)>,
    {
        functions
            .into_iter()
            .map(|(name, function)| self.register_host_function(&name, function))
            .collect()
    }

    /// Install the trampoline for `handle` under its registered name,
    /// creating namespace tables as needed
    pub fn bind(&mut self, handle: FunctionHandle) -> Result<()> {
        let descriptor = self
            .shared
            .registry
            .get(handle)
            .ok_or(Error::UnknownFunction(handle.id()))?;
        let trampoline = trampoline(Rc::clone(&self.shared), handle);

        let state: &mut dyn LuaApi = &mut self.state;
        let top = state.get_top();
        let result = install(state, descriptor.path(), trampoline);
        state.set_top(top);

        if result.is_ok() {
            debug!(%handle, name = descriptor.name(), "bound function");
        }
        result
    }

    /// Bind every function in the registry
    pub fn bind_all(&mut self) -> Result<()> {
        for handle in self.shared.registry.handles() {
            self.bind(handle)?;
        }
        Ok(())
    }

    // ========================================================================
    // Calls into the runtime
    // ========================================================================

    /// Call the runtime function at the dotted `name` with `args`.
    ///
    /// Errors raised by the runtime come back verbatim as
    /// [`Error::Script`]. The stack top is restored whatever happens.
    pub fn call_function<R: FromReturns>(&mut self, name: &str, args: impl IntoArguments) -> Result<R> {
        let options = self.options().decode;
        let state: &mut dyn LuaApi = &mut self.state;
        let top = state.get_top();
        let result = call_in_place(state, name, &args, options);
        state.set_top(top);
        result
    }
}

impl<S: LuaApi + Default> Default for Bridge<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

// ============================================================================
// Namespaces
// ============================================================================

/// Store `function` at `path`, leaving intermediate tables on the stack
fn install(state: &mut dyn LuaApi, path: &FunctionPath, function: NativeFunction) -> Result<()> {
    if !state.check_stack(path.namespace().len() + 3) {
        return Err(Error::Api(ApiError::StackOverflow));
    }

    let mut segments = path.namespace().iter();
    let Some(first) = segments.next() else {
        state.push_function(function);
        state.set_global(path.leaf());
        return Ok(());
    };

    match state.get_global(first) {
        LuaType::Table => {}
        LuaType::Nil | LuaType::None => {
            state.set_top(-2);
            state.create_table(0, 1);
            state.push_value(-1);
            state.set_global(first);
        }
        _ => return Err(Error::GlobalNotTable(first.clone())),
    }

    for segment in segments {
        match state.get_field(-1, segment)? {
            LuaType::Table => {}
            LuaType::Nil | LuaType::None => {
                state.set_top(-2);
                state.create_table(0, 1);
                state.push_value(-1);
                state.set_field(-3, segment)?;
            }
            _ => return Err(Error::NamespaceNotTable(segment.clone())),
        }
    }

    state.push_function(function);
    state.set_field(-2, path.leaf())?;
    Ok(())
}

/// Push the value stored at `path`
fn push_path(state: &mut dyn LuaApi, path: &FunctionPath) -> Result<()> {
    if !state.check_stack(path.namespace().len() + 1) {
        return Err(Error::Api(ApiError::StackOverflow));
    }
    let mut segments = path.namespace().iter().map(String::as_str).chain([path.leaf()]);
    if let Some(first) = segments.next() {
        state.get_global(first);
    }
    for segment in segments {
        state.get_field(-1, segment)?;
    }
    Ok(())
}

fn call_in_place<R: FromReturns>(
    state: &mut dyn LuaApi,
    name: &str,
    args: &dyn IntoArguments,
    options: DecodeOptions,
) -> Result<R> {
    let path = FunctionPath::parse(name)?;
    push_path(state, &path)?;
    let nargs = args.push_arguments(state)?;

    trace!(name, nargs, "call");
    state
        .call(nargs as i32, R::COUNT)
        .map_err(|err| Error::Script(err.to_string()))?;

    let base = state.get_top() - R::COUNT + 1;
    R::from_returns(state, base, options)
}

// ============================================================================
// Dispatch
// ============================================================================

fn trampoline(shared: Rc<Shared>, handle: FunctionHandle) -> NativeFunction {
    native_function(move |state| dispatch(&shared, handle, state).map_err(|err| err.to_string()))
}

fn dispatch(shared: &Shared, handle: FunctionHandle, state: &mut dyn LuaApi) -> Result<usize> {
    let Some(descriptor) = shared.registry.get(handle) else {
        error!(%handle, "trampoline refers to an unregistered function");
        return Err(Error::UnknownFunction(handle.id()));
    };

    let got = state.get_top().max(0) as usize;
    if got != descriptor.arity() {
        warn!(name = descriptor.name(), expected = descriptor.arity(), got, "argument count mismatch");
        return Err(Error::ArgumentsNotMatch {
            name: descriptor.name().to_string(),
            expected: descriptor.arity(),
            got,
        });
    }

    trace!(name = descriptor.name(), arguments = got, "dispatch");
    invoke(&descriptor, state, shared.options.get())
}

fn invoke(
    descriptor: &FunctionDescriptor,
    state: &mut dyn LuaApi,
    options: BridgeOptions,
) -> Result<usize> {
    let mut invocation = Invocation::new(state, descriptor.params(), options.decode);
    descriptor.invoke(&mut invocation)?;

    let pushed = invocation.pushed();
    if pushed != descriptor.returns().len() {
        return Err(Error::ReturnsNotMatch {
            name: descriptor.name().to_string(),
            expected: descriptor.returns().len(),
            got: pushed,
        });
    }
    Ok(pushed)
}
