use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Poll;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Fingerprint, FetchSnapshot, Publish }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Fingerprint => "fingerprint",
        Phase::FetchSnapshot => "fetch_snapshot",
        Phase::Publish => "publish",
    }}
    fn span(&self) -> Span { match self {
        Phase::Fingerprint => info_span!("fingerprint"),
        Phase::FetchSnapshot => info_span!("fetch_snapshot"),
        Phase::Publish => info_span!("publish"),
    }}
}

impl OpMarker for Poll {
    const NAME: &'static str = "poll";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("poll") }
}
