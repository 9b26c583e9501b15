//! Initial element resolution
//!
//! A filterable answers [`Filterable::filter_elements`] either immediately
//! or later through its [`Completion`]. The first answer wins. A late
//! completion after an immediate answer is a protocol violation, reported on
//! the event channel without failing the caller.

use tokio::runtime::Handle;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, warn};

use crate::error::{FilterError, FilterableError, MAX_ELEMENT_SIZE};
use crate::events::Signals;
use crate::ports::outbound::{Completion, CompletionReceiver, ElementBatch, Filterable, Resolution};

/// Ask `filterable` for its initial elements and validate the answer.
pub(crate) async fn resolve_initial(
    filterable: &dyn Filterable,
    signals: &Signals,
    runtime: &Handle,
) -> Result<Vec<Vec<u8>>, FilterError> {
    let (completion, receiver) = Completion::channel();

    match filterable.filter_elements(completion) {
        Resolution::Now(batch) => {
            watch_late_completion(receiver, signals.clone(), runtime);
            validate_batch(batch)
        }
        Resolution::Deferred => match receiver.await {
            Ok(Ok(batch)) => validate_batch(batch),
            Ok(Err(error)) => Err(error.into()),
            Err(_) => Err(FilterError::CompletionDropped),
        },
    }
}

/// Every element must fit in a BIP37 `filteradd`.
pub(crate) fn validate_batch(batch: ElementBatch) -> Result<Vec<Vec<u8>>, FilterError> {
    let elements = batch.unwrap_or_default();

    if let Some((index, element)) = elements
        .iter()
        .enumerate()
        .find(|(_, element)| element.len() > MAX_ELEMENT_SIZE)
    {
        return Err(FilterError::InvalidElements {
            reason: format!("element {} is {} bytes", index, element.len()),
            max: MAX_ELEMENT_SIZE,
        });
    }

    Ok(elements)
}

fn watch_late_completion(mut receiver: CompletionReceiver, signals: Signals, runtime: &Handle) {
    match receiver.try_recv() {
        Ok(result) => report_late(result, &signals),
        Err(TryRecvError::Closed) => {}
        Err(TryRecvError::Empty) => {
            runtime.spawn(async move {
                if let Ok(result) = receiver.await {
                    report_late(result, &signals);
                }
            });
        }
    }
}

fn report_late(result: Result<ElementBatch, FilterableError>, signals: &Signals) {
    match result {
        Ok(_) => {
            warn!("Filterable answered through both channels");
            signals.error(FilterError::ProtocolViolation);
        }
        Err(error) => {
            debug!(error = %error, "Filterable reported a late failure");
            signals.error(error.into());
        }
    }
}
