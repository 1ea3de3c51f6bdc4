//! The handler bridge.
//!
//! Every operator application is a synchronous request/response to a script
//! function: the message is `(operator symbol, evaluated operands…, result
//! holder name)` and the response is whatever the handler published under the
//! result holder. The bridge runs the handler in a transient scope and reads
//! the holder back *before* tearing that scope down, so handlers publish
//! results with a plain `setvar` into their own scope. Mutating the caller's
//! variables works because `setvar` assigns through shadowing.

use smallvec::SmallVec;

use crate::{error::HandlerError, run::Machine};

impl Machine<'_> {
    /// Invokes the script handler `handler` for an application of
    /// `op_symbol` with the given evaluated operands.
    ///
    /// The handler's arity must be exactly `args.len() + 2`: it receives the
    /// operator symbol first, then each operand value, then the result-holder
    /// name last. A handler that publishes nothing yields a synthetic
    /// `HANDLER_NO_RESULT<…>` marker with a warning, which still counts as
    /// success.
    pub(crate) fn invoke_handler(
        &mut self,
        handler: &str,
        op_symbol: &str,
        args: &[String],
        result_holder: &str,
    ) -> Result<String, HandlerError> {
        let Some(func) = self.kernel.functions.get(handler).cloned() else {
            let err = HandlerError::NotFound { name: handler.to_owned() };
            self.io.diag(&err.to_string());
            return Err(err);
        };

        let expected = args.len() + 2;
        if func.params.len() != expected {
            let err = HandlerError::ParamMismatch {
                name: handler.to_owned(),
                expected,
                got: func.params.len(),
            };
            self.io.diag(&err.to_string());
            return Err(err);
        }

        let scope = match self.kernel.store.enter_scope() {
            Ok(scope) => scope,
            Err(store_err) => {
                let err = HandlerError::from(store_err);
                self.io.diag(&err.to_string());
                return Err(err);
            }
        };

        let mut call_values: SmallVec<[&str; 5]> = SmallVec::with_capacity(expected);
        call_values.push(op_symbol);
        call_values.extend(args.iter().map(String::as_str));
        call_values.push(result_holder);
        for (param, value) in func.params.iter().zip(call_values) {
            if let Err(err) = self.kernel.store.set(param, value, false) {
                self.io.diag(&format!("cannot bind handler parameter '{param}': {err}"));
            }
        }

        self.run_body(&func.body);

        // Read the published result before the transient scope is torn down.
        let result = self.kernel.store.get(result_holder).map(str::to_owned);
        let _ = self.kernel.store.leave_scope(scope);

        match result {
            Some(value) => Ok(value),
            None => {
                self.io.diag(&format!(
                    "handler '{handler}' for '{op_symbol}' published no result in '{result_holder}'"
                ));
                Ok(format!("HANDLER_NO_RESULT<{result_holder}>"))
            }
        }
    }
}
