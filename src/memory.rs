use crate::{
    channel::{call_pair, CallHandle, CallOptions, Channel},
    dispatcher::Dispatcher,
    error::CallError,
    server::{CallOutcome, ServiceDefinition},
    types::MethodInfo,
};
use std::sync::Arc;
use tokio::runtime::Handle;

/// A [`Channel`] connecting client stubs to a [`Dispatcher`] in the same
/// process.
///
/// Each call is dispatched on its own task of the current tokio runtime.
/// When [`CallOptions::timeout`] is set the call is cancelled once it
/// elapses.
#[derive(Clone, Debug)]
pub struct MemoryChannel {
    dispatcher: Arc<Dispatcher>,
}

impl MemoryChannel {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// A channel serving a single bound service.
    pub fn serve(definition: ServiceDefinition) -> Self {
        let mut dispatcher = Dispatcher::new();
        // A fresh dispatcher cannot hold a duplicate service.
        let _ = dispatcher.add(definition);
        Self::new(dispatcher)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl Channel for MemoryChannel {
    fn open_call(&self, method: &MethodInfo, options: &CallOptions) -> Result<CallHandle, CallError> {
        let runtime = Handle::try_current().map_err(CallError::transport)?;
        let (handle, server_call) = call_pair(options.buffer);
        let cancel = handle.cancel.clone();
        let timeout = options.timeout;
        let full_name = method.full_name().to_owned();
        let dispatch = self.dispatcher.dispatch(&full_name, server_call);

        runtime.spawn(async move {
            let outcome = match timeout {
                Some(timeout) => {
                    let mut dispatch = dispatch;
                    let finished = tokio::select! {
                        outcome = &mut dispatch => Some(outcome),
                        _ = tokio::time::sleep(timeout) => None,
                    };
                    match finished {
                        Some(outcome) => outcome,
                        None => {
                            tracing::debug!(method = %full_name, ?timeout, "deadline elapsed");
                            cancel.cancel();
                            dispatch.await
                        }
                    }
                }
                None => dispatch.await,
            };
            if let CallOutcome::Failed(err) = &outcome {
                tracing::trace!(method = %full_name, error = %err, "in-process call failed");
            }
        });
        Ok(handle)
    }
}
