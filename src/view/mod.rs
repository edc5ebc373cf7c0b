mod actor;
mod cache;
mod config;
mod counts;
mod handle;
mod optimistic;
mod reconcile;
mod state;
mod token;

pub use actor::FeedView;
pub use cache::PageWindow;
pub use config::ViewConfig;
pub use handle::ViewHandle;
pub use optimistic::DeleteAllConfirmed;
pub use reconcile::Freshness;
pub use state::ViewState;
