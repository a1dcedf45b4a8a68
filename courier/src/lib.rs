//! Batch dispatch front end for the courier engine
//!
//! Loads a RON configuration describing the dispatch policy and a set of
//! simulated providers, and turns it into a ready [`Dispatcher`].

pub mod config;
pub mod simulated;

use std::sync::Arc;

use courier_dispatch::{Dispatcher, Provider};

pub use config::{CourierConfig, SimulatedProviderConfig, find_config_file, load_messages};
pub use simulated::SimulatedProvider;

impl CourierConfig {
    /// Build a dispatcher over the configured simulated providers.
    ///
    /// # Errors
    /// If the provider or dispatch configuration is invalid
    pub fn into_dispatcher(self) -> anyhow::Result<Dispatcher> {
        self.validate()?;

        let providers = self
            .providers
            .iter()
            .map(|config| Arc::new(SimulatedProvider::from(config)) as Arc<dyn Provider>)
            .collect();

        Ok(Dispatcher::new(self.dispatch, providers)?)
    }
}
