use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use appointment_cell::{
    AppointmentBookingService, AppointmentState, AppointmentStore, BookingSettings, InMemoryAppointmentStore,
    SupabaseAppointmentStore,
};
use catalogue_cell::{Catalogue, InMemoryCatalogue, SupabaseCatalogue};
use realtime_cell::{RealtimeHub, RealtimeState};
use shared_config::{AppConfig, StorageBackend};

/// Per-cell router states sharing one catalogue and one realtime hub.
pub struct AppServices {
    pub appointments: AppointmentState,
    pub realtime: RealtimeState,
}

impl AppServices {
    pub fn build(config: Arc<AppConfig>) -> anyhow::Result<Self> {
        let (catalogue, store) = storage(&config)?;
        let hub = RealtimeHub::new(config.realtime_session_buffer);

        let booking = AppointmentBookingService::new(
            store,
            catalogue.clone(),
            Arc::new(hub.clone()),
            BookingSettings::from_config(&config),
        );

        Ok(Self {
            appointments: AppointmentState {
                config: config.clone(),
                booking: Arc::new(booking),
            },
            realtime: RealtimeState {
                config,
                hub,
                catalogue,
            },
        })
    }
}

fn storage(config: &AppConfig) -> anyhow::Result<(Arc<dyn Catalogue>, Arc<dyn AppointmentStore>)> {
    match config.storage_backend {
        StorageBackend::Supabase if config.is_supabase_configured() => {
            info!("Using Supabase storage at {}", config.supabase_url);
            Ok((
                Arc::new(SupabaseCatalogue::new(config)),
                Arc::new(SupabaseAppointmentStore::new(config)),
            ))
        }
        backend => {
            if backend == StorageBackend::Supabase {
                warn!("Supabase storage requested but not configured, falling back to memory");
            }
            let catalogue = match &config.catalogue_seed_path {
                Some(path) => InMemoryCatalogue::from_json_file(path)
                    .with_context(|| format!("failed to load catalogue seed {}", path))?,
                None => {
                    warn!("No CATALOGUE_SEED_PATH set, starting with an empty catalogue");
                    InMemoryCatalogue::new()
                }
            };
            info!("Using in-memory storage");
            Ok((Arc::new(catalogue), Arc::new(InMemoryAppointmentStore::new())))
        }
    }
}
