//! Scripted executor shared by the worker integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cadence_worker::{WorkError, WorkExecutor, WorkOutput};
use futures::future::BoxFuture;
use tokio::sync::{mpsc, Semaphore};

/// Executor whose behaviour per tenant is configured up front.
///
/// Every call is appended to `calls` and announced on the `started` channel.
/// Tenants listed in `gated` block until [`ScriptedExecutor::release`] is
/// called.
#[derive(Default)]
pub struct ScriptedExecutor {
    calls: Mutex<Vec<String>>,
    fail_times: Mutex<HashMap<String, u32>>,
    gated: Mutex<Vec<String>>,
    slow: Mutex<HashMap<String, Duration>>,
    gate: Option<Arc<Semaphore>>,
    started: Option<mpsc::UnboundedSender<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor with a closed gate and a channel announcing each call start.
    pub fn gated() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let exec = Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            started: Some(tx),
            ..Self::default()
        };
        (exec, rx)
    }

    /// Fail the next `times` calls for `tenant_id`; `u32::MAX` fails forever.
    pub fn fail(self, tenant_id: &str, times: u32) -> Self {
        self.fail_times
            .lock()
            .unwrap()
            .insert(tenant_id.to_string(), times);
        self
    }

    /// Block calls for `tenant_id` until the gate is released.
    pub fn hold(self, tenant_id: &str) -> Self {
        self.gated.lock().unwrap().push(tenant_id.to_string());
        self
    }

    pub fn slow(self, tenant_id: &str, delay: Duration) -> Self {
        self.slow
            .lock()
            .unwrap()
            .insert(tenant_id.to_string(), delay);
        self
    }

    /// Open the gate for every held call, present and future.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1_000);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, tenant_id: &str) -> usize {
        self.calls().iter().filter(|c| *c == tenant_id).count()
    }
}

impl WorkExecutor for ScriptedExecutor {
    fn execute<'a>(&'a self, tenant_id: &'a str) -> BoxFuture<'a, Result<WorkOutput, WorkError>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(tenant_id.to_string());
            if let Some(tx) = &self.started {
                let _ = tx.send(tenant_id.to_string());
            }

            let held = self.gated.lock().unwrap().iter().any(|t| t == tenant_id);
            if held {
                if let Some(gate) = &self.gate {
                    let permit = gate.acquire().await.expect("gate closed");
                    permit.forget();
                }
            }

            let delay = self.slow.lock().unwrap().get(tenant_id).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let should_fail = {
                let mut fails = self.fail_times.lock().unwrap();
                match fails.get_mut(tenant_id) {
                    Some(remaining) if *remaining > 0 => {
                        if *remaining != u32::MAX {
                            *remaining -= 1;
                        }
                        true
                    }
                    _ => false,
                }
            };

            if should_fail {
                Err(WorkError::failed(format!("generation failed for {tenant_id}")))
            } else {
                Ok(WorkOutput::with_summary(format!("built {tenant_id}")))
            }
        })
    }
}
