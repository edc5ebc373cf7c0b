use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct View;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Activate, Command, Load, Counts, Reconcile, Mutate, Join, Deactivate }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Activate => "activate",
        Phase::Command => "command",
        Phase::Load => "load",
        Phase::Counts => "counts",
        Phase::Reconcile => "reconcile",
        Phase::Mutate => "mutate",
        Phase::Join => "join",
        Phase::Deactivate => "deactivate",
    }}
    fn span(&self) -> Span { match self {
        Phase::Activate => info_span!("activate"),
        Phase::Command => info_span!("command"),
        Phase::Load => info_span!("load"),
        Phase::Counts => info_span!("counts"),
        Phase::Reconcile => info_span!("reconcile"),
        Phase::Mutate => info_span!("mutate"),
        Phase::Join => info_span!("join"),
        Phase::Deactivate => info_span!("deactivate"),
    }}
}

impl OpMarker for View {
    const NAME: &'static str = "view";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("view") }
}
