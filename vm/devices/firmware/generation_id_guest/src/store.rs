// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared storage for the current Generation ID address.

use crate::resolver::AcpiPath;
use crate::resolver::AddressResolver;
use crate::resolver::MethodEvaluator;
use crate::resolver::PhysicalAddress;
use crate::resolver::ResolveError;
use parking_lot::Mutex;
use thiserror::Error;

/// Binding state of the Generation ID device.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DeviceState {
    /// No address has been resolved, or the device was removed.
    #[default]
    Unbound,
    /// The device is attached and its value lives at this address.
    Bound(PhysicalAddress),
}

/// An input to [`DeviceState::apply`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// `ADDR` was evaluated successfully.
    Resolved(PhysicalAddress),
    /// `ADDR` evaluation or decoding failed.
    ResolveFailed,
    /// The device was removed.
    Removed,
}

impl DeviceState {
    /// Returns the state that follows `transition`.
    ///
    /// A failed resolution never changes the state, so the last good address
    /// stays in effect.
    pub fn apply(self, transition: Transition) -> Self {
        match transition {
            Transition::Resolved(address) => DeviceState::Bound(address),
            Transition::ResolveFailed => self,
            Transition::Removed => DeviceState::Unbound,
        }
    }

    /// Returns the bound address, if any.
    pub fn address(self) -> Option<PhysicalAddress> {
        match self {
            DeviceState::Unbound => None,
            DeviceState::Bound(address) => Some(address),
        }
    }
}

/// No Generation ID address is currently bound.
#[derive(Debug, Error)]
#[error("generation ID device is not bound")]
pub struct NotBoundError;

/// Holds the most recently resolved Generation ID address.
///
/// The lock only covers copying or replacing the state. Firmware evaluation
/// and memory mapping always happen outside of it.
#[derive(Debug, Default)]
pub struct GenerationIdStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    state: DeviceState,
    /// Bumped on every bind or unbind. A resolution only lands if no other
    /// bind or unbind happened since it started.
    epoch: u64,
}

impl GenerationIdStore {
    /// Creates an unbound store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current address.
    pub fn current(&self) -> Result<PhysicalAddress, NotBoundError> {
        self.state().address().ok_or(NotBoundError)
    }

    /// Returns a snapshot of the binding state.
    pub fn state(&self) -> DeviceState {
        self.inner.lock().state
    }

    /// Re-resolves the address of `device` and stores it.
    ///
    /// On failure the previously stored address is kept. If the device is
    /// unbound or bound again while `ADDR` is being evaluated, the result is
    /// discarded and [`ResolveError::Superseded`] is returned.
    pub fn refresh<E: MethodEvaluator>(
        &self,
        resolver: &AddressResolver<E>,
        device: &AcpiPath,
    ) -> Result<PhysicalAddress, ResolveError> {
        let epoch = self.inner.lock().epoch;
        let address = match resolver.resolve(device) {
            Ok(address) => address,
            Err(err) => {
                self.apply(Transition::ResolveFailed);
                return Err(err);
            }
        };

        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return Err(ResolveError::Superseded {
                device: device.clone(),
            });
        }
        inner.bump(Transition::Resolved(address));
        Ok(address)
    }

    /// Forgets the current address.
    ///
    /// Any resolution still in flight is discarded when it completes.
    pub fn unbind(&self) {
        self.apply(Transition::Removed);
    }

    fn apply(&self, transition: Transition) {
        let mut inner = self.inner.lock();
        match transition {
            Transition::ResolveFailed => inner.state = inner.state.apply(transition),
            Transition::Resolved(_) | Transition::Removed => inner.bump(transition),
        }
    }
}

impl Inner {
    fn bump(&mut self, transition: Transition) {
        self.state = self.state.apply(transition);
        self.epoch = self.epoch.wrapping_add(1);
    }
}
