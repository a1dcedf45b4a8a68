//! Deterministic providers for dispatcher tests

use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use courier_dispatch::{Message, Provider, ProviderError};
use parking_lot::Mutex;
use tokio::time::Instant;

/// Provider replaying a fixed script of results.
///
/// Once the script runs out, `fallback` is returned forever. Every call is
/// timestamped so tests can check the waits between attempts.
#[derive(Debug)]
pub struct ScriptedProvider {
    name: &'static str,
    script: Mutex<VecDeque<Result<(), ProviderError>>>,
    fallback: Result<(), ProviderError>,
    latency: Duration,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedProvider {
    pub fn new(
        name: &'static str,
        script: impl IntoIterator<Item = Result<(), ProviderError>>,
        fallback: Result<(), ProviderError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn always_ok(name: &'static str) -> Arc<Self> {
        Self::new(name, [], Ok(()))
    }

    pub fn always_failing(name: &'static str) -> Arc<Self> {
        Self::new(
            name,
            [],
            Err(ProviderError::Unavailable(format!("{name} is down"))),
        )
    }

    /// Fails `failures` times, then succeeds
    pub fn flaky(name: &'static str, failures: usize) -> Arc<Self> {
        Self::new(
            name,
            (0..failures).map(|_| Err(ProviderError::Rejected("try again".to_string()))),
            Ok(()),
        )
    }

    /// Accepts every message after `latency`
    pub fn slow(name: &'static str, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(()),
            latency,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn deliver(&self, _message: &Message) -> Result<(), ProviderError> {
        self.calls.lock().push(Instant::now());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

pub fn message(body: &str) -> Message {
    Message::new("rcpt@example.com", "Greetings", body)
}

pub fn providers(list: &[&Arc<ScriptedProvider>]) -> Vec<Arc<dyn Provider>> {
    list.iter()
        .map(|provider| Arc::clone(*provider) as Arc<dyn Provider>)
        .collect()
}
