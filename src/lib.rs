//! Sharetea kiosk core.
//!
//! Everything behind the self-service ordering screen except the screen
//! itself: the product catalog, drink customization, the cart, pricing and
//! tax, loyalty points, and submitting orders and reviews to the Sharetea
//! backend. The presentation layer owns a [`KioskSession`] and renders the
//! values it returns.

use std::path::Path;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod api;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod customization;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod loyalty;
pub mod money;
pub mod order;
pub mod pricing;
pub mod reviews;
pub mod session;

pub use api::ApiClient;
pub use cart::CartLedger;
pub use catalog::{Catalog, CatalogSource, Ingredient, Product, Review};
pub use config::KioskConfig;
pub use customization::{CustomizationSession, CustomizedProduct, SizeTier};
pub use error::{KioskError, KioskResult};
pub use loyalty::{Customer, Settlement};
pub use order::{OrderGateway, OrderReceipt, OrderRequest, PendingSubmission};
pub use pricing::{DiscountPolicy, PricingEngine, Totals};
pub use reviews::ReviewGateway;
pub use session::{Employee, KioskSession};

/// Install structured logging: console plus, when `log_dir` is given, a
/// daily rolling file.
///
/// `RUST_LOG` wins over `default_filter`. Keep the returned guard alive for
/// as long as the process logs; dropping it flushes the file writer. Calling
/// this again after a subscriber is installed only logs a warning.
pub fn init_logging(log_dir: Option<&Path>, default_filter: &str) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let console_layer = fmt::layer().with_target(true);

    let mut guard = None;
    let file_layer = log_dir.and_then(|dir| {
        // Prune old log files before setting up the appender
        diagnostics::prune_old_logs(dir);
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("kiosk: cannot create log dir {}: {e}", dir.display());
            return None;
        }
        let file_appender = tracing_appender::rolling::daily(dir, diagnostics::LOG_FILE_PREFIX);
        let (non_blocking, g) = tracing_appender::non_blocking(file_appender);
        guard = Some(g);
        Some(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
    });

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    match installed {
        Ok(()) => info!("Starting Sharetea kiosk v{}", env!("CARGO_PKG_VERSION")),
        Err(e) => warn!("logging already initialised: {e}"),
    }
    guard
}
