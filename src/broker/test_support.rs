//! An in-memory stand-in for a broker, used to test the coordinator's logic
//! without making real HTTP calls. See the design notes on "Polymorphism":
//! `BrokerRpc` is the capability set tests substitute wholesale.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::client::{BrokerError, BrokerRpc};
use super::types::Element;

struct Queue {
    is_master: bool,
    items: VecDeque<Vec<u8>>,
}

pub struct FakeBroker {
    name: String,
    healthy: Mutex<bool>,
    latency: Mutex<Duration>,
    queues: Mutex<HashMap<String, Queue>>,
    pub calls: Mutex<Vec<String>>,
    fail_add_key: Mutex<bool>,
}

impl FakeBroker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            healthy: Mutex::new(true),
            latency: Mutex::new(Duration::from_millis(1)),
            queues: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_add_key: Mutex::new(false),
        }
    }

    /// Makes every subsequent `add_key` call fail, to exercise the
    /// partial-assignment path (§4.3, §8 scenario 5).
    pub fn fail_add_key(&self, fail: bool) {
        *self.fail_add_key.lock().unwrap() = fail;
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().unwrap() = latency;
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        *self.healthy.lock().unwrap() = healthy;
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.queues.lock().unwrap().contains_key(key)
    }

    pub fn is_master_of(&self, key: &str) -> Option<bool> {
        self.queues.lock().unwrap().get(key).map(|q| q.is_master)
    }

    pub fn queue_contents(&self, key: &str) -> Vec<Vec<u8>> {
        self.queues
            .lock()
            .unwrap()
            .get(key)
            .map(|q| q.items.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    fn log(&self, op: &str) {
        self.calls.lock().unwrap().push(op.to_string());
    }
}

#[async_trait]
impl BrokerRpc for FakeBroker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn healthz(&self) -> Result<Duration, BrokerError> {
        self.log("healthz");
        if *self.healthy.lock().unwrap() {
            Ok(*self.latency.lock().unwrap())
        } else {
            Err(BrokerError::Status {
                broker: self.name.clone(),
                status: 503,
            })
        }
    }

    async fn push(&self, key: &str, value: &[u8]) -> Result<(), BrokerError> {
        self.log("push");
        let mut queues = self.queues.lock().unwrap();
        let queue = queues.entry(key.to_string()).or_insert_with(|| Queue {
            is_master: false,
            items: VecDeque::new(),
        });
        queue.items.push_back(value.to_vec());
        Ok(())
    }

    async fn front(&self) -> Result<Element, BrokerError> {
        self.log("front");
        let queues = self.queues.lock().unwrap();
        for (key, queue) in queues.iter() {
            if queue.is_master {
                if let Some(value) = queue.items.front() {
                    return Ok(Element {
                        key: key.clone(),
                        value: value.clone(),
                    });
                }
            }
        }
        Ok(Element::default())
    }

    async fn remove(&self, key: &str) -> Result<(), BrokerError> {
        self.log("remove");
        if let Some(queue) = self.queues.lock().unwrap().get_mut(key) {
            queue.items.pop_front();
        }
        Ok(())
    }

    async fn add_key(&self, key: &str, is_master: bool) -> Result<(), BrokerError> {
        self.log("add_key");
        if *self.fail_add_key.lock().unwrap() {
            return Err(BrokerError::Status {
                broker: self.name.clone(),
                status: 500,
            });
        }
        self.queues.lock().unwrap().insert(
            key.to_string(),
            Queue {
                is_master,
                items: VecDeque::new(),
            },
        );
        Ok(())
    }

    async fn set_master(&self, key: &str, master_status: bool) -> Result<(), BrokerError> {
        self.log("set_master");
        let mut queues = self.queues.lock().unwrap();
        let queue = queues.entry(key.to_string()).or_insert_with(|| Queue {
            is_master: master_status,
            items: VecDeque::new(),
        });
        queue.is_master = master_status;
        Ok(())
    }

    async fn import(
        &self,
        key: &str,
        is_master: bool,
        values: &[Vec<u8>],
    ) -> Result<(), BrokerError> {
        self.log("import");
        self.queues.lock().unwrap().insert(
            key.to_string(),
            Queue {
                is_master,
                items: values.iter().cloned().collect(),
            },
        );
        Ok(())
    }

    async fn export(&self, key: &str) -> Result<Vec<Vec<u8>>, BrokerError> {
        self.log("export");
        Ok(self.queue_contents(key))
    }
}
