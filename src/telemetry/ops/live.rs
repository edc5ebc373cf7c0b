use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Live;

#[derive(Copy, Clone, Debug)]
pub enum Phase { FetchEntities, FetchStatuses, Join, Output }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::FetchEntities => "fetch_entities",
        Phase::FetchStatuses => "fetch_statuses",
        Phase::Join => "join",
        Phase::Output => "output",
    }}
    fn span(&self) -> Span { match self {
        Phase::FetchEntities => info_span!("fetch_entities"),
        Phase::FetchStatuses => info_span!("fetch_statuses"),
        Phase::Join => info_span!("join"),
        Phase::Output => info_span!("output"),
    }}
}

impl OpMarker for Live {
    const NAME: &'static str = "live";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("live") }
}
