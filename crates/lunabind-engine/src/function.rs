//! Host functions and their typed signatures
//!
//! [`HostFunction::wrap`] turns a plain Rust closure into a type-erased
//! callable plus the descriptors of its parameters and return values. The
//! descriptors are built once, when the function is wrapped; every later
//! invocation decodes arguments against them through an [`Invocation`].
//!
//! ```ignore
//! let add = HostFunction::wrap(|a: i32, b: i32| a + b);
//! assert_eq!(add.arity(), 2);
//! ```

use std::fmt::{self, Display};

use lunabind_sdk::LuaApi;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::decode::{decode_value, decode_value_as};
use crate::descriptor::{Describe, TypeDescriptor};
use crate::encode::encode_value;
use crate::error::{Error, Result};
use crate::options::DecodeOptions;

/// Type-erased host function body
pub type Callable = Box<dyn Fn(&mut Invocation<'_>) -> Result<()> + Send + Sync>;

// ============================================================================
// Invocation
// ============================================================================

/// One call of a host function: its arguments on the runtime stack and the
/// values pushed back so far
pub struct Invocation<'a> {
    state: &'a mut dyn LuaApi,
    params: &'a [TypeDescriptor],
    options: DecodeOptions,
    arguments: usize,
    pushed: usize,
}

impl<'a> Invocation<'a> {
    /// Arguments occupy slots `1..=params.len()` of the current frame
    pub fn new(
        state: &'a mut dyn LuaApi,
        params: &'a [TypeDescriptor],
        options: DecodeOptions,
    ) -> Self {
        let arguments = state.get_top().max(0) as usize;
        Self {
            state,
            params,
            options,
            arguments,
            pushed: 0,
        }
    }

    /// Number of arguments passed by the runtime
    pub fn argument_count(&self) -> usize {
        self.arguments
    }

    /// Decode the argument at zero-based `position` against its declared
    /// descriptor
    pub fn argument<T: DeserializeOwned + 'static>(&mut self, position: usize) -> Result<T> {
        let target = self.params.get(position).ok_or_else(|| {
            Error::Message(format!("no parameter at position {}", position))
        })?;
        decode_value_as(&mut *self.state, position as i32 + 1, target, self.options)
    }

    /// Push one return value
    pub fn push<T: Serialize + 'static>(&mut self, value: &T) -> Result<()> {
        encode_value(&mut *self.state, value)?;
        self.pushed += 1;
        Ok(())
    }

    /// Number of values pushed so far
    pub fn pushed(&self) -> usize {
        self.pushed
    }
}

// ============================================================================
// HostFunction
// ============================================================================

/// A host callable with its signature
pub struct HostFunction {
    params: Vec<TypeDescriptor>,
    returns: Vec<TypeDescriptor>,
    callable: Callable,
}

impl HostFunction {
    /// Wrap a closure or function taking up to eight arguments
    pub fn wrap<M, F: IntoHostFunction<M>>(f: F) -> Self {
        f.into_host_function()
    }

    /// Build from an explicit signature and body
    pub fn from_parts<F>(params: Vec<TypeDescriptor>, returns: Vec<TypeDescriptor>, f: F) -> Self
    where
        F: Fn(&mut Invocation<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            params,
            returns,
            callable: Box::new(f),
        }
    }

    /// Parameter descriptors in call order
    pub fn params(&self) -> &[TypeDescriptor] {
        &self.params
    }

    /// Return value descriptors in push order
    pub fn returns(&self) -> &[TypeDescriptor] {
        &self.returns
    }

    /// Declared argument count
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Whether any parameter is a variadic list
    pub fn is_variadic(&self) -> bool {
        self.params.iter().any(TypeDescriptor::is_variadic)
    }

    /// Run the body
    pub fn invoke(&self, invocation: &mut Invocation<'_>) -> Result<()> {
        (self.callable)(invocation)
    }

    pub(crate) fn into_parts(self) -> (Vec<TypeDescriptor>, Vec<TypeDescriptor>, Callable) {
        (self.params, self.returns, self.callable)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// Conversion of Rust functions into [`HostFunction`]s.
///
/// `Marker` is the function pointer type of the signature; it only keeps the
/// per-arity implementations apart.
pub trait IntoHostFunction<Marker> {
    /// Capture descriptors and erase the type
    fn into_host_function(self) -> HostFunction;
}

macro_rules! impl_into_host_function {
    ($($arg:ident $position:tt),*) => {
        impl<F, R, $($arg,)*> IntoHostFunction<fn($($arg,)*) -> R> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: IntoReturns,
            $($arg: Describe + DeserializeOwned + 'static,)*
        {
            #[allow(unused_variables)]
            fn into_host_function(self) -> HostFunction {
                let params = vec![$(<$arg as Describe>::describe()),*];
                HostFunction::from_parts(params, R::describe_returns(), move |invocation| {
                    // Decode every argument before the body runs
                    let result = self($(invocation.argument::<$arg>($position)?),*);
                    result.push_returns(invocation)
                })
            }
        }
    };
}

impl_into_host_function!();
impl_into_host_function!(A0 0);
impl_into_host_function!(A0 0, A1 1);
impl_into_host_function!(A0 0, A1 1, A2 2);
impl_into_host_function!(A0 0, A1 1, A2 2, A3 3);
impl_into_host_function!(A0 0, A1 1, A2 2, A3 3, A4 4);
impl_into_host_function!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5);
impl_into_host_function!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5, A6 6);
impl_into_host_function!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5, A6 6, A7 7);

// ============================================================================
// Return values
// ============================================================================

/// Values a host function can return to the runtime
pub trait IntoReturns {
    /// Descriptors of the pushed values
    fn describe_returns() -> Vec<TypeDescriptor>;

    /// Push every value in order
    fn push_returns(self, invocation: &mut Invocation<'_>) -> Result<()>;
}

impl IntoReturns for () {
    fn describe_returns() -> Vec<TypeDescriptor> {
        Vec::new()
    }

    fn push_returns(self, _invocation: &mut Invocation<'_>) -> Result<()> {
        Ok(())
    }
}

impl<T: Describe + Serialize + 'static> IntoReturns for T {
    fn describe_returns() -> Vec<TypeDescriptor> {
        vec![T::describe()]
    }

    fn push_returns(self, invocation: &mut Invocation<'_>) -> Result<()> {
        invocation.push(&self)
    }
}

impl<T: IntoReturns, E: Display> IntoReturns for std::result::Result<T, E> {
    fn describe_returns() -> Vec<TypeDescriptor> {
        T::describe_returns()
    }

    fn push_returns(self, invocation: &mut Invocation<'_>) -> Result<()> {
        match self {
            Ok(value) => value.push_returns(invocation),
            Err(err) => Err(Error::host(err)),
        }
    }
}

/// Values read back from a runtime call
pub trait FromReturns: Sized {
    /// Number of results requested from the call
    const COUNT: i32;

    /// Decode `COUNT` results starting at absolute index `base`
    fn from_returns(state: &mut dyn LuaApi, base: i32, options: DecodeOptions) -> Result<Self>;
}

impl FromReturns for () {
    const COUNT: i32 = 0;

    fn from_returns(_state: &mut dyn LuaApi, _base: i32, _options: DecodeOptions) -> Result<()> {
        Ok(())
    }
}

impl<T: Describe + DeserializeOwned + 'static> FromReturns for T {
    const COUNT: i32 = 1;

    fn from_returns(state: &mut dyn LuaApi, base: i32, options: DecodeOptions) -> Result<T> {
        decode_value(state, base, options)
    }
}

/// Arguments pushed for a runtime call
pub trait IntoArguments {
    /// Push every argument in order, returning how many were pushed
    fn push_arguments(&self, state: &mut dyn LuaApi) -> Result<usize>;
}

impl IntoArguments for () {
    fn push_arguments(&self, _state: &mut dyn LuaApi) -> Result<usize> {
        Ok(0)
    }
}

macro_rules! count {
    () => { 0 };
    ($head:ident $($tail:ident)*) => { 1 + count!($($tail)*) };
}

macro_rules! impl_tuples {
    ($($name:ident $position:tt),+) => {
        impl<$($name: Describe + Serialize + 'static),+> IntoReturns for ($($name,)+) {
            fn describe_returns() -> Vec<TypeDescriptor> {
                vec![$(<$name as Describe>::describe()),+]
            }

            fn push_returns(self, invocation: &mut Invocation<'_>) -> Result<()> {
                $(invocation.push(&self.$position)?;)+
                Ok(())
            }
        }

        impl<$($name: Describe + DeserializeOwned + 'static),+> FromReturns for ($($name,)+) {
            const COUNT: i32 = count!($($name)+);

            fn from_returns(
                state: &mut dyn LuaApi,
                base: i32,
                options: DecodeOptions,
            ) -> Result<Self> {
                Ok(($(decode_value::<$name>(&mut *state, base + $position, options)?,)+))
            }
        }

        impl<$($name: Serialize + 'static),+> IntoArguments for ($($name,)+) {
            fn push_arguments(&self, state: &mut dyn LuaApi) -> Result<usize> {
                $(encode_value(&mut *state, &self.$position)?;)+
                Ok(count!($($name)+))
            }
        }
    };
}

impl_tuples!(A0 0);
impl_tuples!(A0 0, A1 1);
impl_tuples!(A0 0, A1 1, A2 2);
impl_tuples!(A0 0, A1 1, A2 2, A3 3);
impl_tuples!(A0 0, A1 1, A2 2, A3 3, A4 4);
impl_tuples!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5);
impl_tuples!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5, A6 6);
impl_tuples!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5, A6 6, A7 7);
