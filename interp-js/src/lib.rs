//! Execution core for a tree-walking JavaScript interpreter.
//!
//! The crate provides:
//! - A mark/sweep slot heap ([`Heap`]) holding strings, objects, scopes and shared property cells
//! - The value model ([`Value`]) with the language's coercion and equality rules
//! - Property descriptors and the ordinary object operations (`get`, `set`, `delete`, key
//!   enumeration) on [`Runtime`]
//! - Scope chains whose bindings are properties of per-scope objects ([`ScopeRecord`])
//! - Closures and the invocation protocol ([`call_closure`])
//! - A suspendable evaluation protocol: every piece of evaluation is a [`Task`] on an explicit
//!   frame stack, so hosts can [`Runtime::step`] through code, [`Runtime::abort`] it, or attach an
//!   [`Instrument`]
//! - Cooperative limits ([`Vm`], [`Budget`], [`InterruptToken`])
//!
//! # Driving evaluation
//!
//! A [`Dispatcher`] turns syntax into tasks. [`TreeDispatcher`] evaluates the syntax tree in
//! [`ast`]; embedders with a different front end supply their own.
//!
//! Tasks never call each other directly. A task that needs a sub-result returns
//! [`Step::Suspend`] and is resumed with the child's outcome once it finishes. Native functions run
//! synchronously and may re-enter script code via [`Runtime::call_function`], which drives a nested
//! section of the same frame stack.
//!
//! # Handles
//!
//! Heap values are referenced by copyable handles ([`GcObject`], [`GcString`], [`GcScope`],
//! [`GcProperty`]). Accessors validate the slot kind and generation and return
//! [`VmError::InvalidHandle`] for a handle of the wrong kind or one whose allocation was collected.
//! Strings are interned, so equal live strings share a handle.
//!
//! The runtime collects garbage at branch boundaries reached from the host (never while a native is
//! running). Frames and the realm are roots; a host that keeps handles of its own across a
//! [`Runtime::run`] registers them with [`Heap::add_root`].

pub mod ast;
mod branch;
mod call;
mod destructure;
mod error;
mod exec;
mod function;
mod handle;
mod heap;
mod interrupt;
mod object_ops;
mod ops;
mod property;
mod realm;
mod runtime;
mod scope;
mod source;
mod string;
mod value;
mod vm;

pub use crate::branch::BranchInfo;
pub use crate::branch::BranchKind;
pub use crate::branch::BranchNode;
pub use crate::branch::BranchOptions;
pub use crate::branch::BranchRequest;
pub use crate::branch::CallRequest;
pub use crate::branch::Completion;
pub use crate::branch::Dispatcher;
pub use crate::branch::Instrument;
pub use crate::branch::Reference;
pub use crate::branch::Step;
pub use crate::branch::Suspension;
pub use crate::branch::Task;
pub use crate::call::call_closure;
pub use crate::call::CallExtra;
pub use crate::call::Invocation;
pub use crate::call::InvocationState;
pub use crate::destructure::resolve_pattern;
pub use crate::error::Termination;
pub use crate::error::TerminationReason;
pub use crate::error::VmError;
pub use crate::exec::TreeDispatcher;
pub use crate::function::ClosureData;
pub use crate::function::NativeCallFn;
pub use crate::function::NativeFunction;
pub use crate::handle::GcObject;
pub use crate::handle::GcProperty;
pub use crate::handle::GcScope;
pub use crate::handle::GcString;
pub use crate::handle::HeapId;
pub use crate::heap::ClassTag;
pub use crate::heap::Heap;
pub use crate::heap::HeapLimits;
pub use crate::heap::RootId;
pub use crate::heap::Tracer;
pub use crate::heap::MAX_PROTOTYPE_CHAIN;
pub use crate::interrupt::InterruptHandle;
pub use crate::interrupt::InterruptToken;
pub use crate::object_ops::ObservableKeys;
pub use crate::ops::number_to_string;
pub use crate::ops::string_to_number;
pub use crate::ops::Hint;
pub use crate::property::PropertyDescriptor;
pub use crate::property::PropertyDescriptorPatch;
pub use crate::property::PropertyKey;
pub use crate::property::PropertyKind;
pub use crate::realm::CommonNames;
pub use crate::realm::Realm;
pub use crate::realm::RealmOptions;
pub use crate::runtime::Runtime;
pub use crate::scope::ScopeRecord;
pub use crate::source::format_stack_trace;
pub use crate::source::StackFrame;
pub use crate::string::JsString;
pub use crate::value::Value;
pub use crate::vm::Budget;
pub use crate::vm::Vm;
pub use crate::vm::VmOptions;
