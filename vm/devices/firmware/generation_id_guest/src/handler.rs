// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Device lifecycle handling for the Generation ID device.

use crate::resolver::AcpiPath;
use crate::resolver::AddressResolver;
use crate::resolver::MethodEvaluator;
use crate::resolver::PhysicalAddress;
use crate::resolver::ResolveError;
use crate::store::GenerationIdStore;
use std::sync::Arc;

/// A lifecycle event delivered by the platform for the device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The device was attached.
    Add,
    /// The platform notified the device with the given code.
    Notify(u32),
    /// The device was detached.
    Remove,
}

/// Reacts to add, notify and remove events by updating the shared store.
///
/// Failures are logged and returned to the caller. They never leave the
/// store in a state that prevents a later event from succeeding.
#[derive(Debug)]
pub struct NotificationHandler<E> {
    store: Arc<GenerationIdStore>,
    resolver: AddressResolver<E>,
}

impl<E: MethodEvaluator> NotificationHandler<E> {
    /// Creates a handler updating `store`, using `evaluator` to run `ADDR`.
    pub fn new(store: Arc<GenerationIdStore>, evaluator: E) -> Self {
        Self {
            store,
            resolver: AddressResolver::new(evaluator),
        }
    }

    /// The store this handler updates.
    pub fn store(&self) -> &Arc<GenerationIdStore> {
        &self.store
    }

    /// Handles `event` for `device`.
    ///
    /// Returns the newly bound address for add and notify, or `None` for
    /// remove.
    pub fn dispatch(
        &self,
        device: &AcpiPath,
        event: DeviceEvent,
    ) -> Result<Option<PhysicalAddress>, ResolveError> {
        match event {
            DeviceEvent::Add => self.on_add(device).map(Some),
            DeviceEvent::Notify(code) => self.on_notify(device, code).map(Some),
            DeviceEvent::Remove => {
                self.on_remove(device);
                Ok(None)
            }
        }
    }

    /// Binds the device by resolving its address.
    ///
    /// On failure the device stays unbound.
    pub fn on_add(&self, device: &AcpiPath) -> Result<PhysicalAddress, ResolveError> {
        tracing::debug!(%device, "generation ID device added");
        self.refresh(device, "add")
    }

    /// Re-resolves the address after a notification.
    ///
    /// Every notification code is treated as a possible change of value. On
    /// failure the previous address stays in effect.
    pub fn on_notify(&self, device: &AcpiPath, code: u32) -> Result<PhysicalAddress, ResolveError> {
        tracing::debug!(%device, code, "generation ID notification");
        self.refresh(device, "notify")
    }

    /// Unbinds the device.
    pub fn on_remove(&self, device: &AcpiPath) {
        self.store.unbind();
        tracing::info!(%device, "generation ID device removed");
    }

    fn refresh(&self, device: &AcpiPath, event: &str) -> Result<PhysicalAddress, ResolveError> {
        match self.store.refresh(&self.resolver, device) {
            Ok(address) => {
                tracing::info!(%device, %address, event, "generation ID address bound");
                Ok(address)
            }
            Err(err) => {
                tracing::warn!(
                    error = &err as &dyn std::error::Error,
                    event,
                    "failed to resolve generation ID address"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::AcpiObject;
    use crate::resolver::EvaluateError;
    use crate::store::DeviceState;
    use crate::test_helpers::addr_package;
    use crate::test_helpers::FakeEvaluator;
    use test_with_tracing::test;

    fn vgen() -> AcpiPath {
        AcpiPath::new(r"\_SB_.VGEN")
    }

    fn handler(evaluator: &FakeEvaluator) -> NotificationHandler<&FakeEvaluator> {
        NotificationHandler::new(Arc::new(GenerationIdStore::new()), evaluator)
    }

    #[test]
    fn add_binds() {
        let evaluator = FakeEvaluator::new();
        evaluator.set(&vgen(), addr_package(0x7fff_f000, 0));
        let handler = handler(&evaluator);

        let address = handler.on_add(&vgen()).unwrap();
        assert_eq!(handler.store().state(), DeviceState::Bound(address));
    }

    #[test]
    fn failed_add_stays_unbound() {
        let evaluator = FakeEvaluator::new();
        let handler = handler(&evaluator);

        assert!(handler.on_add(&vgen()).is_err());
        assert_eq!(handler.store().state(), DeviceState::Unbound);

        // A later add succeeds once the method is available.
        evaluator.set(&vgen(), addr_package(0x1000, 0));
        assert!(handler.on_add(&vgen()).is_ok());
    }

    #[test]
    fn notify_replaces_address() {
        let evaluator = FakeEvaluator::new();
        evaluator.set(&vgen(), addr_package(0x1000, 0));
        let handler = handler(&evaluator);
        handler.on_add(&vgen()).unwrap();

        evaluator.set(&vgen(), addr_package(0x2000, 0x1));
        let address = handler.on_notify(&vgen(), 0x80).unwrap();
        assert_eq!(address.get(), 0x1_0000_2000);
        assert_eq!(handler.store().current().unwrap(), address);
    }

    #[test]
    fn notify_ignores_event_code() {
        let evaluator = FakeEvaluator::new();
        evaluator.set(&vgen(), addr_package(0x1000, 0));
        let handler = handler(&evaluator);

        for code in [0, 0x80, 0xffff_ffff] {
            assert!(handler.on_notify(&vgen(), code).is_ok());
        }
        assert_eq!(evaluator.calls().len(), 3);
    }

    #[test]
    fn failed_notify_keeps_address() {
        let evaluator = FakeEvaluator::new();
        evaluator.set(&vgen(), addr_package(0x1000, 0));
        let handler = handler(&evaluator);
        let address = handler.on_add(&vgen()).unwrap();

        evaluator.set(&vgen(), AcpiObject::String("bogus".into()));
        assert!(handler.on_notify(&vgen(), 0x80).is_err());
        assert_eq!(handler.store().current().unwrap(), address);
    }

    #[test]
    fn remove_unbinds_until_next_success() {
        let evaluator = FakeEvaluator::new();
        evaluator.set(&vgen(), addr_package(0x1000, 0));
        let handler = handler(&evaluator);
        handler.on_add(&vgen()).unwrap();

        handler.on_remove(&vgen());
        assert!(handler.store().current().is_err());

        evaluator.remove(&vgen());
        assert!(handler.on_notify(&vgen(), 0x80).is_err());
        assert!(handler.store().current().is_err());

        evaluator.set(&vgen(), addr_package(0x3000, 0));
        handler.on_notify(&vgen(), 0x80).unwrap();
        assert_eq!(handler.store().current().unwrap().get(), 0x3000);
    }

    /// Removes the device while `ADDR` is being evaluated.
    struct RemovedDuringEvaluation(Arc<GenerationIdStore>);

    impl MethodEvaluator for RemovedDuringEvaluation {
        fn evaluate(&self, _device: &AcpiPath, _method: &str) -> Result<AcpiObject, EvaluateError> {
            self.0.unbind();
            Ok(addr_package(0x1000, 0))
        }
    }

    #[test]
    fn remove_during_notify_wins() {
        let store = Arc::new(GenerationIdStore::new());
        let handler =
            NotificationHandler::new(store.clone(), RemovedDuringEvaluation(store.clone()));

        assert!(matches!(
            handler.on_notify(&vgen(), 0x80),
            Err(ResolveError::Superseded { .. })
        ));
        assert_eq!(store.state(), DeviceState::Unbound);
        assert!(store.current().is_err());
    }

    #[test]
    fn dispatch_routes_events() {
        let evaluator = FakeEvaluator::new();
        evaluator.set(&vgen(), addr_package(0x1000, 0));
        let handler = handler(&evaluator);

        assert!(handler
            .dispatch(&vgen(), DeviceEvent::Add)
            .unwrap()
            .is_some());
        assert!(handler
            .dispatch(&vgen(), DeviceEvent::Notify(0x80))
            .unwrap()
            .is_some());
        assert_eq!(handler.dispatch(&vgen(), DeviceEvent::Remove).unwrap(), None);
        assert_eq!(handler.store().state(), DeviceState::Unbound);
    }
}
