use thiserror::Error;

/// Progress of a single remote operation.
///
/// Each state carries only what is meaningful in it, so an operation cannot
/// be both finished and still running.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub enum RequestState<T, E> {
    #[default]
    Idle,
    InFlight,
    Succeeded(T),
    Failed(E),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The operation is already in flight")]
pub struct AlreadyInFlightError;

impl<T, E> RequestState<T, E> {
    /// Moves to [`RequestState::InFlight`]. A finished operation may be
    /// started again; a running one may not.
    pub fn start(&mut self) -> Result<(), AlreadyInFlightError> {
        if self.is_in_flight() {
            return Err(AlreadyInFlightError);
        }
        *self = RequestState::InFlight;
        Ok(())
    }

    pub fn succeed(&mut self, value: T) {
        *self = RequestState::Succeeded(value);
    }

    pub fn fail(&mut self, error: E) {
        *self = RequestState::Failed(error);
    }

    /// Returns a running operation to [`RequestState::Idle`] when nobody will
    /// finish it. Finished states are left alone.
    pub fn abandon(&mut self) {
        if self.is_in_flight() {
            *self = RequestState::Idle;
        }
    }

    pub fn finish(&mut self, result: Result<T, E>) {
        match result {
            Ok(value) => self.succeed(value),
            Err(error) => self.fail(error),
        }
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RequestState::InFlight)
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            RequestState::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&E> {
        match self {
            RequestState::Failed(error) => Some(error),
            _ => None,
        }
    }
}
