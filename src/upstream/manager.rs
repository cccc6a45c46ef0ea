//! Connection manager.
//!
//! # Responsibilities
//! - Own one pooled transport per upstream origin
//! - Create transports lazily and hand out the same one for the process lifetime
//! - Allow tests to substitute fake transports

use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::upstream::error::TransportError;
use crate::upstream::origin::Origin;
use crate::upstream::transport::{PooledTransport, Transport, TransportSettings};

type TransportFactory =
    dyn Fn(&Origin) -> Result<Arc<dyn Transport>, TransportError> + Send + Sync;

/// Shared registry of per-origin transports.
pub struct ConnectionManager {
    transports: DashMap<Origin, Arc<dyn Transport>>,
    factory: Box<TransportFactory>,
}

impl ConnectionManager {
    /// Manager creating [`PooledTransport`]s with the given settings.
    pub fn new(settings: TransportSettings) -> Self {
        Self::with_factory(move |origin| {
            let transport = PooledTransport::new(origin.clone(), &settings)?;
            Ok(Arc::new(transport) as Arc<dyn Transport>)
        })
    }

    /// Manager creating transports with a custom factory.
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn(&Origin) -> Result<Arc<dyn Transport>, TransportError> + Send + Sync + 'static,
    {
        Self {
            transports: DashMap::new(),
            factory: Box::new(factory),
        }
    }

    /// Return the transport for `origin`, creating it on first use.
    pub fn acquire(&self, origin: &Origin) -> Result<Arc<dyn Transport>, TransportError> {
        if let Some(transport) = self.transports.get(origin) {
            return Ok(Arc::clone(transport.value()));
        }

        match self.transports.entry(origin.clone()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let transport = (self.factory)(origin)?;
                tracing::info!(origin = %origin, "Created pooled transport");
                entry.insert(Arc::clone(&transport));
                Ok(transport)
            }
        }
    }

    /// Number of origins with a live transport.
    pub fn len(&self) -> usize {
        self.transports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("origins", &self.transports.len())
            .finish()
    }
}
