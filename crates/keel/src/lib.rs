#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "line/column/depth counters fit their targets")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts are range-checked first")]

mod blocks;
mod builtins;
mod error;
mod eval;
mod expand;
mod functions;
mod handler;
mod io;
mod kernel;
mod object;
mod os;
mod registry;
mod repl;
mod resource;
mod run;
mod scan;
mod store;
mod token;

pub use crate::{
    error::{ExprError, HandlerError, RegistryError, StoreError},
    expand::{expand, unescape},
    functions::{FunctionTable, UserFunction},
    io::{CollectIo, NullIo, ShellIo, StdIo},
    kernel::Kernel,
    registry::{Associativity, OperatorDef, OperatorRegistry, OperatorRole, RegisterOutcome},
    repl::{DEFAULT_MODULE_PATH, ReplFlow, STARTUP_SCRIPT, ShellSession},
    resource::{DEFAULT_BLOCK_DEPTH, DEFAULT_EXPR_DEPTH, DEFAULT_SCOPE_DEPTH, Limits, MAX_NAME_LEN, MAX_OPERATOR_LEN},
    run::{LAST_COMMAND_STATUS, LAST_OP_RESULT},
    scan::tokenize,
    store::{ARRAY_INDEX_SEP, GLOBAL_SCOPE_ID, Variable, VariableStore},
    token::{Token, TokenKind},
};
