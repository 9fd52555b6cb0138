//! Calling into logic units by name

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use caseflow_logic_api::{LogicResponse, Value};

use crate::error::DispatchError;
use crate::registry::LogicRegistry;

/// Thin front over the registry for callers that only know names
#[derive(Clone)]
pub struct LogicDispatcher {
    registry: Arc<LogicRegistry>,
}

impl LogicDispatcher {
    pub fn new(registry: Arc<LogicRegistry>) -> Self {
        Self { registry }
    }

    /// Call `function` on the unit named `name`
    ///
    /// `Ok(None)` means the unit is active but does not expose the function.
    pub fn invoke(
        &self,
        name: &str,
        function: &str,
        args: Value,
    ) -> Result<Option<Value>, DispatchError> {
        let handle = self
            .registry
            .logic(name)
            .ok_or_else(|| DispatchError::LogicNotFound {
                name: name.to_string(),
            })?;

        let result = panic::catch_unwind(AssertUnwindSafe(|| handle.call(function, args)))
            .map_err(|_| {
                tracing::error!(logic = %name, function = %function, "Logic panicked");
                DispatchError::Panicked {
                    name: name.to_string(),
                    function: function.to_string(),
                }
            })?;

        match result {
            None => Ok(None),
            Some(Ok(value)) => Ok(Some(value)),
            Some(Err(source)) => Err(DispatchError::Invocation {
                name: name.to_string(),
                function: function.to_string(),
                source,
            }),
        }
    }

    /// Offer a response to every active unit that handles responses
    ///
    /// Returns how many units accepted it. Handler failures are logged.
    pub fn dispatch_response(&self, response: &LogicResponse) -> usize {
        let mut handled = 0;

        for handle in self.registry.loaded_logics() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                handle
                    .response_handler()
                    .map(|handler| handler.on_response(response))
            }));

            match result {
                Ok(None) => {}
                Ok(Some(Ok(()))) => handled += 1,
                Ok(Some(Err(e))) => {
                    tracing::warn!(
                        logic = %handle.name(),
                        request_id = %response.request_id,
                        error = %e,
                        "Response handler failed"
                    );
                }
                Err(_) => {
                    tracing::error!(
                        logic = %handle.name(),
                        request_id = %response.request_id,
                        "Response handler panicked"
                    );
                }
            }
        }

        handled
    }
}
