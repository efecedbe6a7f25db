// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Startup warm-up and ordered shutdown
//!
//! Shutdown closes every resource slot first and releases tunnels last, so
//! no pool is still talking through a forwarder that has already gone away.
//! Both phases log and continue past individual failures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::resource::{ManagedResource, Requirement, ResourceError};
use crate::domain::tunnel::TunnelBroker;

pub struct ResourceLifecycle {
    resources: Vec<Arc<dyn ManagedResource>>,
    tunnels: Arc<dyn TunnelBroker>,
    shut_down: AtomicBool,
}

impl ResourceLifecycle {
    pub fn new(resources: Vec<Arc<dyn ManagedResource>>, tunnels: Arc<dyn TunnelBroker>) -> Self {
        Self {
            resources,
            tunnels,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn resources(&self) -> &[Arc<dyn ManagedResource>] {
        &self.resources
    }

    /// Build mandatory clients now; warn about optional ones left unconfigured.
    ///
    /// With `lazy`, mandatory clients are only checked for configuration.
    pub async fn warm_up(&self, lazy: bool) -> Result<(), ResourceError> {
        for resource in &self.resources {
            match resource.requirement() {
                Requirement::Mandatory => {
                    if !resource.is_configured() {
                        return Err(ResourceError::not_configured(
                            resource.name(),
                            "required at startup",
                        ));
                    }
                    if lazy {
                        continue;
                    }
                    info!(slot = %resource.name(), kind = %resource.kind(), "Warming up");
                    resource.warm_up().await?;
                }
                Requirement::Optional => {
                    if !resource.is_configured() {
                        warn!(
                            slot = %resource.name(),
                            kind = %resource.kind(),
                            "Not configured; requests that need it will fail"
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Close resources, then release tunnels. Runs once; later calls are no-ops.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Closing {} resource slot(s)", self.resources.len());
        for resource in &self.resources {
            resource.close().await;
        }

        info!("Releasing SSH tunnels");
        self.tunnels.release_all().await;
        info!("Gateway resources released");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}
