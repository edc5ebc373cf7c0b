use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Mutate;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Plan, Apply }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Plan => "plan", Phase::Apply => "apply" } }
    fn span(&self) -> Span { match self { Phase::Plan => info_span!("plan"), Phase::Apply => info_span!("apply") } }
}

impl OpMarker for Mutate {
    const NAME: &'static str = "mutate";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("mutate") }
}
